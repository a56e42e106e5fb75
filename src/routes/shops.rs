use axum::extract::State;
use uuid::Uuid;

use super::paged;
use crate::error::{AppError, AppResult, OptionExt};
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::middleware::AuthUser;
use crate::models::product::{Product, ProductFilter};
use crate::models::shop::{CreateShopRequest, Shop, ShopFilter, UpdateShopRequest};
use crate::models::user::UserRole;
use crate::models::validate::Validate;
use crate::state::AppState;
use crate::types::{ApiResponse, PageQuery};

pub async fn list_shops(
    State(state): State<AppState>,
    _caller: AuthUser,
    ApiQuery(q): ApiQuery<PageQuery>,
    ApiQuery(filter): ApiQuery<ShopFilter>,
) -> AppResult<ApiResponse<Vec<Shop>>> {
    let page = q.page(&state.config.pagination);
    Ok(paged(Shop::list(&state.db, &filter, &q, page).await?, page))
}

pub async fn get_shop(
    State(state): State<AppState>,
    _caller: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<ApiResponse<Shop>> {
    let shop = Shop::find_by_id(&state.db, id).await?.ok_or_not_found("shop")?;
    Ok(ApiResponse::ok(shop))
}

pub async fn create_shop(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiJson(req): ApiJson<CreateShopRequest>,
) -> AppResult<ApiResponse<Shop>> {
    caller.require_role(&[UserRole::Admin])?;
    req.validate()?;
    let shop = Shop::insert(&state.db, &req).await?;
    tracing::info!(shop_id = %shop.id, manager = %shop.manager_id, "shop created");
    Ok(ApiResponse::created(shop).with_message("Shop created"))
}

pub async fn update_shop(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdateShopRequest>,
) -> AppResult<ApiResponse<Shop>> {
    let shop = Shop::find_by_id(&state.db, id).await?.ok_or_not_found("shop")?;
    if !caller.is_admin() {
        if shop.manager_id != caller.id {
            return Err(AppError::Forbidden("only an admin or the shop's manager may edit this shop".into()));
        }
        // Managers run their shop but do not reassign or close it
        if req.manager_id.is_some_and(|m| m != shop.manager_id) || req.is_active.is_some() {
            return Err(AppError::Forbidden("only an admin may change a shop's manager or status".into()));
        }
    }
    let shop = Shop::update(&state.db, id, req).await?;
    Ok(ApiResponse::ok(shop).with_message("Shop updated"))
}

pub async fn delete_shop(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<ApiResponse<()>> {
    caller.require_role(&[UserRole::Admin])?;
    if !Shop::delete(&state.db, id).await? {
        return Err(AppError::NotFound("shop not found".into()));
    }
    tracing::info!(shop_id = %id, by = %caller.id, "shop deleted");
    Ok(ApiResponse::ok(()).with_message("Shop deleted"))
}

pub async fn shop_products(
    State(state): State<AppState>,
    _caller: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiQuery(q): ApiQuery<PageQuery>,
) -> AppResult<ApiResponse<Vec<Product>>> {
    Shop::find_by_id(&state.db, id).await?.ok_or_not_found("shop")?;
    let filter = ProductFilter { shop_id: Some(id), ..Default::default() };
    let page = q.page(&state.config.pagination);
    Ok(paged(Product::list(&state.db, &filter, &q, page).await?, page))
}
