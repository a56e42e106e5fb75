use axum::extract::State;
use uuid::Uuid;

use super::paged;
use crate::error::{AppError, AppResult, OptionExt};
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::middleware::AuthUser;
use crate::models::product::{CreateProductRequest, Product, ProductFilter, UpdateProductRequest};
use crate::models::shop::Shop;
use crate::models::user::UserRole;
use crate::models::validate::Validate;
use crate::state::AppState;
use crate::types::{ApiResponse, PageQuery};

/// Shop managers may only stock shops they run. Admins are unrestricted.
async fn ensure_can_stock(state: &AppState, caller: &AuthUser, shop_id: Option<Uuid>) -> AppResult<()> {
    if caller.role != UserRole::ShopManager {
        return Ok(());
    }
    let Some(shop_id) = shop_id else {
        return Ok(());
    };
    match Shop::find_by_id(&state.db, shop_id).await? {
        Some(shop) if shop.manager_id == caller.id => Ok(()),
        Some(_) => {
            tracing::warn!(user_id = %caller.id, %shop_id, "shop manager tried to stock a foreign shop");
            Err(AppError::Forbidden("you can only manage products of your own shops".into()))
        }
        None => Err(AppError::invalid_field("shop_id", "shop does not exist")),
    }
}

pub async fn list_products(
    State(state): State<AppState>,
    _caller: AuthUser,
    ApiQuery(q): ApiQuery<PageQuery>,
    ApiQuery(filter): ApiQuery<ProductFilter>,
) -> AppResult<ApiResponse<Vec<Product>>> {
    let page = q.page(&state.config.pagination);
    Ok(paged(Product::list(&state.db, &filter, &q, page).await?, page))
}

pub async fn get_product(
    State(state): State<AppState>,
    _caller: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<ApiResponse<Product>> {
    let product = Product::find_by_id(&state.db, id).await?.ok_or_not_found("product")?;
    Ok(ApiResponse::ok(product))
}

pub async fn create_product(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiJson(req): ApiJson<CreateProductRequest>,
) -> AppResult<ApiResponse<Product>> {
    caller.require_role(&[UserRole::Admin, UserRole::ShopManager])?;
    req.validate()?;
    ensure_can_stock(&state, &caller, req.shop_id).await?;
    let product = Product::insert(&state.db, &req).await?;
    tracing::info!(product_id = %product.id, by = %caller.id, "product created");
    Ok(ApiResponse::created(product).with_message("Product created"))
}

pub async fn update_product(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdateProductRequest>,
) -> AppResult<ApiResponse<Product>> {
    caller.require_role(&[UserRole::Admin, UserRole::ShopManager])?;
    let current = Product::find_by_id(&state.db, id).await?.ok_or_not_found("product")?;
    ensure_can_stock(&state, &caller, current.shop_id).await?;
    if req.shop_id.is_some() {
        ensure_can_stock(&state, &caller, req.shop_id).await?;
    }
    let product = Product::update(&state.db, id, req).await?;
    Ok(ApiResponse::ok(product).with_message("Product updated"))
}

pub async fn delete_product(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<ApiResponse<()>> {
    caller.require_role(&[UserRole::Admin])?;
    if !Product::delete(&state.db, id).await? {
        return Err(AppError::NotFound("product not found".into()));
    }
    tracing::info!(product_id = %id, by = %caller.id, "product deleted");
    Ok(ApiResponse::ok(()).with_message("Product deleted"))
}
