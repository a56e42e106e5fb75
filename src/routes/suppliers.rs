use axum::extract::State;
use uuid::Uuid;

use super::paged;
use crate::error::{AppError, AppResult, OptionExt};
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::middleware::AuthUser;
use crate::models::product::{Product, ProductFilter};
use crate::models::supplier::{
    CreateSupplierRequest, RateSupplierRequest, Supplier, SupplierFilter, SupplierStats, UpdateSupplierRequest,
};
use crate::models::user::UserRole;
use crate::models::validate::Validate;
use crate::state::AppState;
use crate::types::{ApiResponse, LimitQuery, PageQuery};

const CATALOGUE_EDITORS: &[UserRole] = &[UserRole::Admin, UserRole::ShopManager];

pub async fn list_suppliers(
    State(state): State<AppState>,
    _caller: AuthUser,
    ApiQuery(q): ApiQuery<PageQuery>,
    ApiQuery(filter): ApiQuery<SupplierFilter>,
) -> AppResult<ApiResponse<Vec<Supplier>>> {
    if let Some(r) = filter.min_rating {
        if !(0.0..=5.0).contains(&r) {
            return Err(AppError::InvalidInput("min_rating must be between 0 and 5".into()));
        }
    }
    let page = q.page(&state.config.pagination);
    Ok(paged(Supplier::list(&state.db, &filter, &q, page).await?, page))
}

pub async fn active_suppliers(
    State(state): State<AppState>,
    _caller: AuthUser,
    ApiQuery(q): ApiQuery<LimitQuery>,
) -> AppResult<ApiResponse<Vec<Supplier>>> {
    let limit = q.limit(&state.config.pagination);
    Ok(ApiResponse::ok(Supplier::find_active(&state.db, limit).await?))
}

pub async fn supplier_stats(
    State(state): State<AppState>,
    _caller: AuthUser,
) -> AppResult<ApiResponse<SupplierStats>> {
    Ok(ApiResponse::ok(Supplier::stats(&state.db).await?))
}

pub async fn get_supplier(
    State(state): State<AppState>,
    _caller: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<ApiResponse<Supplier>> {
    let supplier = Supplier::find_by_id(&state.db, id).await?.ok_or_not_found("supplier")?;
    Ok(ApiResponse::ok(supplier))
}

pub async fn create_supplier(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiJson(req): ApiJson<CreateSupplierRequest>,
) -> AppResult<ApiResponse<Supplier>> {
    caller.require_role(CATALOGUE_EDITORS)?;
    req.validate()?;
    let supplier = Supplier::insert(&state.db, &req, caller.id).await?;
    tracing::info!(supplier_id = %supplier.id, by = %caller.id, "supplier created");
    Ok(ApiResponse::created(supplier).with_message("Supplier created"))
}

pub async fn update_supplier(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdateSupplierRequest>,
) -> AppResult<ApiResponse<Supplier>> {
    caller.require_role(CATALOGUE_EDITORS)?;
    let supplier = Supplier::update(&state.db, id, req).await?;
    Ok(ApiResponse::ok(supplier).with_message("Supplier updated"))
}

pub async fn delete_supplier(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<ApiResponse<()>> {
    caller.require_role(&[UserRole::Admin])?;
    if !Supplier::delete(&state.db, id).await? {
        return Err(AppError::NotFound("supplier not found".into()));
    }
    tracing::info!(supplier_id = %id, by = %caller.id, "supplier deleted");
    Ok(ApiResponse::ok(()).with_message("Supplier deleted"))
}

pub async fn rate_supplier(
    State(state): State<AppState>,
    _caller: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<RateSupplierRequest>,
) -> AppResult<ApiResponse<Supplier>> {
    req.validate()?;
    let supplier = Supplier::rate(&state.db, id, req.rating).await?;
    Ok(ApiResponse::ok(supplier).with_message("Rating recorded"))
}

pub async fn supplier_products(
    State(state): State<AppState>,
    _caller: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiQuery(q): ApiQuery<PageQuery>,
) -> AppResult<ApiResponse<Vec<Product>>> {
    Supplier::find_by_id(&state.db, id).await?.ok_or_not_found("supplier")?;
    let filter = ProductFilter { supplier_id: Some(id), ..Default::default() };
    let page = q.page(&state.config.pagination);
    Ok(paged(Product::list(&state.db, &filter, &q, page).await?, page))
}
