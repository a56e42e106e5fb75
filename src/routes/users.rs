use axum::extract::State;
use uuid::Uuid;

use super::paged;
use crate::error::{AppError, AppResult, OptionExt};
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::middleware::AuthUser;
use crate::models::user::{AdminUpdateUserRequest, User, UserFilter, UserRole};
use crate::state::AppState;
use crate::types::{ApiResponse, PageQuery};

pub async fn list_users(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiQuery(q): ApiQuery<PageQuery>,
    ApiQuery(filter): ApiQuery<UserFilter>,
) -> AppResult<ApiResponse<Vec<User>>> {
    caller.require_role(&[UserRole::Admin])?;
    let page = q.page(&state.config.pagination);
    Ok(paged(User::list(&state.db, &filter, &q, page).await?, page))
}

pub async fn get_user(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<ApiResponse<User>> {
    caller.require_role(&[UserRole::Admin])?;
    let user = User::find_by_id(&state.db, id).await?.ok_or_not_found("user")?;
    Ok(ApiResponse::ok(user))
}

pub async fn update_user(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<AdminUpdateUserRequest>,
) -> AppResult<ApiResponse<User>> {
    caller.require_role(&[UserRole::Admin])?;
    let user = User::admin_update(&state.db, id, &req).await?;
    tracing::info!(admin = %caller.id, user_id = %id, role = %user.role, active = user.is_active, "account updated by admin");
    Ok(ApiResponse::ok(user).with_message("User updated"))
}

pub async fn delete_user(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<ApiResponse<()>> {
    caller.require_role(&[UserRole::Admin])?;
    if id == caller.id {
        return Err(AppError::BadRequest("administrators cannot delete their own account".into()));
    }
    if !User::delete(&state.db, id).await? {
        return Err(AppError::NotFound("user not found".into()));
    }
    tracing::info!(admin = %caller.id, user_id = %id, "account deleted");
    Ok(ApiResponse::ok(()).with_message("User deleted"))
}
