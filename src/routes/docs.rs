use axum::response::IntoResponse;
use serde::Serialize;

use crate::types::ApiResponse;

#[derive(Debug, Serialize)]
pub struct EndpointDoc {
    pub method: &'static str,
    pub path: &'static str,
    pub auth: bool,
    /// Empty means any authenticated role (or anyone, for public endpoints).
    pub roles: &'static [&'static str],
    pub description: &'static str,
}

const fn ep(
    method: &'static str,
    path: &'static str,
    auth: bool,
    roles: &'static [&'static str],
    description: &'static str,
) -> EndpointDoc {
    EndpointDoc { method, path, auth, roles, description }
}

const ANY: &[&str] = &[];
const ADMIN: &[&str] = &["admin"];
const EDITORS: &[&str] = &["admin", "shop_manager"];
const AGENT_ADMIN: &[&str] = &["agent", "admin"];

pub const ENDPOINTS: &[EndpointDoc] = &[
    ep("GET", "/healthz", false, ANY, "Liveness probe"),
    ep("GET", "/readyz", false, ANY, "Readiness probe (database reachable)"),
    ep("GET", "/metrics", false, ANY, "Counters as JSON"),
    ep("GET", "/metrics/prometheus", false, ANY, "Counters in Prometheus text format"),
    ep("GET", "/version", false, ANY, "Build name and version"),
    ep("GET", "/api/docs", false, ANY, "This catalogue"),
    ep("POST", "/api/auth/register", false, ANY, "Create an account and receive a token"),
    ep("POST", "/api/auth/login", false, ANY, "Exchange credentials for a token"),
    ep("GET", "/api/auth/me", true, ANY, "Current account with its role profile"),
    ep("PUT", "/api/auth/me", true, ANY, "Update name or phone"),
    ep("POST", "/api/auth/change-password", true, ANY, "Change password"),
    ep("GET", "/api/users", true, ADMIN, "List accounts"),
    ep("GET", "/api/users/{id}", true, ADMIN, "Get an account"),
    ep("PUT", "/api/users/{id}", true, ADMIN, "Change role or active flag"),
    ep("DELETE", "/api/users/{id}", true, ADMIN, "Delete an account"),
    ep("GET", "/api/suppliers", true, ANY, "List suppliers with filters"),
    ep("POST", "/api/suppliers", true, EDITORS, "Create a supplier"),
    ep("GET", "/api/suppliers/active", true, ANY, "Active suppliers, best rated first"),
    ep("GET", "/api/suppliers/stats", true, ANY, "Supplier counts and average rating"),
    ep("GET", "/api/suppliers/{id}", true, ANY, "Get a supplier"),
    ep("PUT", "/api/suppliers/{id}", true, EDITORS, "Update a supplier"),
    ep("DELETE", "/api/suppliers/{id}", true, ADMIN, "Delete a supplier"),
    ep("POST", "/api/suppliers/{id}/rate", true, ANY, "Rate a supplier 1-5"),
    ep("GET", "/api/suppliers/{id}/products", true, ANY, "Products from a supplier"),
    ep("GET", "/api/products", true, ANY, "List products with filters"),
    ep("POST", "/api/products", true, EDITORS, "Create a product"),
    ep("GET", "/api/products/{id}", true, ANY, "Get a product"),
    ep("PUT", "/api/products/{id}", true, EDITORS, "Update a product"),
    ep("DELETE", "/api/products/{id}", true, ADMIN, "Delete a product"),
    ep("GET", "/api/shops", true, ANY, "List shops"),
    ep("POST", "/api/shops", true, ADMIN, "Create a shop"),
    ep("GET", "/api/shops/{id}", true, ANY, "Get a shop"),
    ep("PUT", "/api/shops/{id}", true, EDITORS, "Update a shop (managers: own shop only)"),
    ep("DELETE", "/api/shops/{id}", true, ADMIN, "Delete a shop"),
    ep("GET", "/api/shops/{id}/products", true, ANY, "Products stocked by a shop"),
    ep("GET", "/api/orders", true, ANY, "Orders visible to the caller"),
    ep("POST", "/api/orders", true, &["farmer", "agent", "admin"], "Place an order"),
    ep("GET", "/api/orders/stats", true, ADMIN, "Order counts and delivered revenue"),
    ep("GET", "/api/orders/{id}", true, ANY, "Get an order"),
    ep("PUT", "/api/orders/{id}/status", true, ANY, "Advance or cancel an order"),
    ep("PUT", "/api/orders/{id}/payment", true, EDITORS, "Set payment status"),
    ep("GET", "/api/reports", true, &["farmer", "agent", "admin"], "Field reports visible to the caller"),
    ep("POST", "/api/reports", true, AGENT_ADMIN, "File a field report"),
    ep("GET", "/api/reports/overdue", true, &["farmer", "agent", "admin"], "Open reports past their due date"),
    ep("GET", "/api/reports/stats", true, &["farmer", "agent", "admin"], "Report counts by status and priority"),
    ep("GET", "/api/reports/{id}", true, &["farmer", "agent", "admin"], "Get a report"),
    ep("PUT", "/api/reports/{id}", true, AGENT_ADMIN, "Update a report (author or admin)"),
    ep("DELETE", "/api/reports/{id}", true, ADMIN, "Delete a report"),
    ep("POST", "/api/reports/{id}/complete", true, AGENT_ADMIN, "Complete a report with findings"),
    ep("GET", "/api/profiles/farmer/me", true, &["farmer"], "Own farmer profile"),
    ep("PUT", "/api/profiles/farmer/me", true, &["farmer"], "Create or replace own farmer profile"),
    ep("GET", "/api/profiles/farmer/{user_id}", true, AGENT_ADMIN, "A farmer's profile"),
    ep("PUT", "/api/profiles/farmer/{user_id}/agent", true, ADMIN, "Assign an extension agent to a farmer"),
    ep("GET", "/api/profiles/agent/me", true, &["agent"], "Own agent profile"),
    ep("PUT", "/api/profiles/agent/me", true, &["agent"], "Create or replace own agent profile"),
    ep("GET", "/api/profiles/agent/me/farmers", true, &["agent"], "Farmers assigned to the caller"),
    ep("GET", "/api/profiles/agents", true, ANY, "List agent profiles"),
];

pub async fn api_docs() -> impl IntoResponse {
    ApiResponse::ok(ENDPOINTS)
}
