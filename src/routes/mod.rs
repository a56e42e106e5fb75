//! HTTP route handlers for the AgriHub API.
//!
//! Each sub-module handles one collection; handlers parse input, check the
//! caller's role, delegate to the model helpers and wrap the result in the
//! response envelope.
//!
//! - `auth`: registration, login and the caller's own account
//! - `users`: admin account management
//! - `suppliers`, `products`, `shops`: catalogue
//! - `orders`: order placement and fulfilment
//! - `reports`: extension-agent field reports
//! - `profiles`: farmer and agent profiles, agent assignment
//! - `docs`: endpoint catalogue
//! - `health`: liveness, readiness, metrics and version

use axum::{
    extract::{DefaultBodyLimit, Request, State},
    middleware::{from_fn_with_state, Next},
    response::Response,
    routing::{get, post, put},
    Router,
};
use serde::Serialize;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use crate::error::AppError;
use crate::middleware::{
    auth::require_auth, rate_limit::rate_limit_middleware, security_headers::security_headers_middleware,
    validation::validate_request_middleware,
};
use crate::state::AppState;
use crate::types::{ApiResponse, Page, Pagination};

pub mod auth;
pub mod docs;
pub mod health;
pub mod orders;
pub mod products;
pub mod profiles;
pub mod reports;
pub mod shops;
pub mod suppliers;
pub mod users;

/// Wraps one page of results with its pagination block.
pub(crate) fn paged<T: Serialize>((items, total): (Vec<T>, i64), page: Page) -> ApiResponse<Vec<T>> {
    ApiResponse::paginated(items, Pagination::new(page, total))
}

async fn not_found() -> AppError {
    AppError::NotFound("no such endpoint".into())
}

async fn count_requests(State(state): State<AppState>, req: Request, next: Next) -> Response {
    state.metrics.inc_requests();
    next.run(req).await
}

/// Builds the complete application router. Used by the binary and by the API tests.
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        // account
        .route("/api/auth/me", get(auth::me).put(auth::update_me))
        .route("/api/auth/change-password", post(auth::change_password))
        // admin
        .route("/api/users", get(users::list_users))
        .route("/api/users/{id}", get(users::get_user).put(users::update_user).delete(users::delete_user))
        // suppliers
        .route("/api/suppliers", get(suppliers::list_suppliers).post(suppliers::create_supplier))
        .route("/api/suppliers/active", get(suppliers::active_suppliers))
        .route("/api/suppliers/stats", get(suppliers::supplier_stats))
        .route(
            "/api/suppliers/{id}",
            get(suppliers::get_supplier).put(suppliers::update_supplier).delete(suppliers::delete_supplier),
        )
        .route("/api/suppliers/{id}/rate", post(suppliers::rate_supplier))
        .route("/api/suppliers/{id}/products", get(suppliers::supplier_products))
        // products
        .route("/api/products", get(products::list_products).post(products::create_product))
        .route(
            "/api/products/{id}",
            get(products::get_product).put(products::update_product).delete(products::delete_product),
        )
        // shops
        .route("/api/shops", get(shops::list_shops).post(shops::create_shop))
        .route("/api/shops/{id}", get(shops::get_shop).put(shops::update_shop).delete(shops::delete_shop))
        .route("/api/shops/{id}/products", get(shops::shop_products))
        // orders
        .route("/api/orders", get(orders::list_orders).post(orders::create_order))
        .route("/api/orders/stats", get(orders::order_stats))
        .route("/api/orders/{id}", get(orders::get_order))
        .route("/api/orders/{id}/status", put(orders::update_order_status))
        .route("/api/orders/{id}/payment", put(orders::update_payment_status))
        // reports
        .route("/api/reports", get(reports::list_reports).post(reports::create_report))
        .route("/api/reports/overdue", get(reports::overdue_reports))
        .route("/api/reports/stats", get(reports::report_stats))
        .route(
            "/api/reports/{id}",
            get(reports::get_report).put(reports::update_report).delete(reports::delete_report),
        )
        .route("/api/reports/{id}/complete", post(reports::complete_report))
        // profiles
        .route("/api/profiles/farmer/me", get(profiles::my_farmer_profile).put(profiles::upsert_farmer_profile))
        .route("/api/profiles/farmer/{user_id}", get(profiles::get_farmer_profile))
        .route("/api/profiles/farmer/{user_id}/agent", put(profiles::assign_agent))
        .route("/api/profiles/agent/me", get(profiles::my_agent_profile).put(profiles::upsert_agent_profile))
        .route("/api/profiles/agent/me/farmers", get(profiles::my_assigned_farmers))
        .route("/api/profiles/agents", get(profiles::list_agents))
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    let app = Router::new()
        .route("/healthz", get(health::healthz))
        .route("/readyz", get(health::readyz))
        .route("/metrics", get(health::metrics))
        .route("/metrics/prometheus", get(health::metrics_prometheus))
        .route("/version", get(health::version))
        .route("/api/docs", get(docs::api_docs))
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .merge(protected)
        .fallback(not_found)
        .with_state(state.clone())
        .layer(DefaultBodyLimit::max(state.config.server.max_body_bytes))
        .layer(from_fn_with_state(state.clone(), validate_request_middleware))
        .layer(from_fn_with_state(state.clone(), rate_limit_middleware))
        .layer(from_fn_with_state(state.clone(), count_requests))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(from_fn_with_state(state.config.clone(), security_headers_middleware));

    // CORS: permissive in debug builds for local frontends, same-origin in release
    if cfg!(debug_assertions) {
        app.layer(CorsLayer::permissive())
    } else {
        app
    }
}
