use axum::extract::State;
use uuid::Uuid;

use super::paged;
use crate::error::{AppError, AppResult};
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::middleware::AuthUser;
use crate::models::order::{
    CreateOrderRequest, Order, OrderFilter, OrderScope, OrderStats, OrderStatus, UpdateOrderStatusRequest,
    UpdatePaymentStatusRequest,
};
use crate::models::shop::Shop;
use crate::models::user::UserRole;
use crate::models::validate::Validate;
use crate::state::AppState;
use crate::types::{ApiResponse, PageQuery};

async fn scope_for(state: &AppState, caller: &AuthUser) -> AppResult<OrderScope> {
    Ok(match caller.role {
        UserRole::Farmer => OrderScope::Buyer(caller.id),
        UserRole::ShopManager => OrderScope::Shops(Shop::ids_managed_by(&state.db, caller.id).await?),
        UserRole::Agent | UserRole::Admin => OrderScope::All,
    })
}

fn in_scope(order: &Order, scope: &OrderScope) -> bool {
    match scope {
        OrderScope::All => true,
        OrderScope::Buyer(id) => order.buyer_id == *id,
        OrderScope::Shops(shops) => order.shop_id.is_some_and(|s| shops.contains(&s)),
    }
}

/// Loads an order the caller may see. Orders outside the caller's scope are reported as missing.
async fn visible_order(state: &AppState, caller: &AuthUser, id: Uuid) -> AppResult<(Order, OrderScope)> {
    let scope = scope_for(state, caller).await?;
    match Order::find_by_id(&state.db, id).await? {
        Some(order) if in_scope(&order, &scope) => Ok((order, scope)),
        _ => Err(AppError::NotFound("order not found".into())),
    }
}

pub async fn create_order(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiJson(req): ApiJson<CreateOrderRequest>,
) -> AppResult<ApiResponse<Order>> {
    caller.require_role(&[UserRole::Farmer, UserRole::Agent, UserRole::Admin])?;
    req.validate()?;
    let order = Order::place(&state.db, caller.id, &req).await?;
    state.metrics.inc_orders_placed();
    tracing::info!(order = %order.order_number, buyer = %caller.id, total = order.total_amount, "order placed");
    Ok(ApiResponse::created(order).with_message("Order placed"))
}

pub async fn list_orders(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiQuery(q): ApiQuery<PageQuery>,
    ApiQuery(filter): ApiQuery<OrderFilter>,
) -> AppResult<ApiResponse<Vec<Order>>> {
    let scope = scope_for(&state, &caller).await?;
    let page = q.page(&state.config.pagination);
    Ok(paged(Order::list(&state.db, &filter, &scope, &q, page).await?, page))
}

pub async fn get_order(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<ApiResponse<Order>> {
    let (order, _) = visible_order(&state, &caller, id).await?;
    Ok(ApiResponse::ok(order))
}

pub async fn update_order_status(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdateOrderStatusRequest>,
) -> AppResult<ApiResponse<Order>> {
    let (order, scope) = visible_order(&state, &caller, id).await?;
    let manages_shop = matches!(scope, OrderScope::Shops(_));
    let allowed = match caller.role {
        UserRole::Admin => true,
        UserRole::ShopManager => manages_shop,
        _ if order.buyer_id == caller.id => {
            req.status == OrderStatus::Cancelled && order.status == OrderStatus::Pending
        }
        _ => false,
    };
    if !allowed {
        tracing::warn!(user_id = %caller.id, order = %order.order_number, to = %req.status, "order status change denied");
        return Err(AppError::Forbidden("you may not change this order's status".into()));
    }

    let updated = Order::transition(&state.db, id, req.status).await?;
    tracing::info!(order = %updated.order_number, from = %order.status, to = %updated.status, by = %caller.id, "order status changed");
    Ok(ApiResponse::ok(updated).with_message("Order status updated"))
}

pub async fn update_payment_status(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdatePaymentStatusRequest>,
) -> AppResult<ApiResponse<Order>> {
    caller.require_role(&[UserRole::Admin, UserRole::ShopManager])?;
    visible_order(&state, &caller, id).await?;
    let order = Order::set_payment_status(&state.db, id, req.payment_status).await?;
    tracing::info!(order = %order.order_number, payment = %order.payment_status, by = %caller.id, "payment status changed");
    Ok(ApiResponse::ok(order).with_message("Payment status updated"))
}

pub async fn order_stats(State(state): State<AppState>, caller: AuthUser) -> AppResult<ApiResponse<OrderStats>> {
    caller.require_role(&[UserRole::Admin])?;
    Ok(ApiResponse::ok(Order::stats(&state.db).await?))
}
