use axum::extract::State;
use serde::Serialize;

use crate::auth::{hash_password_blocking, verify_password_blocking};
use crate::error::{AppError, AppResult};
use crate::extract::ApiJson;
use crate::middleware::AuthUser;
use crate::models::profile::{AgentProfile, FarmerProfile};
use crate::models::user::{
    validate_password, ChangePasswordRequest, LoginRequest, RegisterRequest, UpdateMeRequest, User, UserRole,
};
use crate::models::validate::{normalize_email, Validate};
use crate::state::AppState;
use crate::types::ApiResponse;

#[derive(Debug, Serialize)]
pub struct AuthPayload {
    pub token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub user: User,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum RoleProfile {
    Farmer(FarmerProfile),
    Agent(AgentProfile),
}

#[derive(Debug, Serialize)]
pub struct MePayload {
    pub user: User,
    pub profile: Option<RoleProfile>,
}

fn auth_payload(state: &AppState, user: User) -> AppResult<AuthPayload> {
    let token = state.jwt.issue(user.id, &user.email, user.role)?;
    Ok(AuthPayload { token, token_type: "Bearer", expires_in: state.jwt.ttl_seconds(), user })
}

pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> AppResult<ApiResponse<AuthPayload>> {
    req.validate()?;
    if req.role == UserRole::Admin && !state.config.auth.allow_admin_registration {
        tracing::warn!(email = %normalize_email(&req.email), "rejected self-registration as admin");
        return Err(AppError::Forbidden("admin accounts cannot be self-registered".into()));
    }

    let hash = hash_password_blocking(req.password.clone()).await?;
    let user = User::insert(&state.db, &req, &hash).await?;
    state.metrics.inc_registrations();
    tracing::info!(user_id = %user.id, role = %user.role, "account registered");

    Ok(ApiResponse::created(auth_payload(&state, user)?).with_message("Registration successful"))
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> AppResult<ApiResponse<AuthPayload>> {
    let email = normalize_email(&req.email);
    let invalid = || AppError::Unauthorized("Invalid email or password".into());

    let Some(user) = User::find_by_email(&state.db, &email).await? else {
        state.metrics.inc_login_failures();
        tracing::warn!(%email, "login failed: unknown email");
        return Err(invalid());
    };
    if !verify_password_blocking(req.password, user.password_hash.clone()).await? {
        state.metrics.inc_login_failures();
        tracing::warn!(user_id = %user.id, "login failed: wrong password");
        return Err(invalid());
    }
    if !user.is_active {
        state.metrics.inc_login_failures();
        tracing::warn!(user_id = %user.id, "login refused: account deactivated");
        return Err(AppError::Forbidden("account is deactivated".into()));
    }

    User::touch_last_login(&state.db, user.id).await?;
    let user = User::find_by_id(&state.db, user.id).await?.ok_or_else(invalid)?;
    state.metrics.inc_logins();
    tracing::info!(user_id = %user.id, "login succeeded");

    Ok(ApiResponse::ok(auth_payload(&state, user)?).with_message("Login successful"))
}

pub async fn me(State(state): State<AppState>, caller: AuthUser) -> AppResult<ApiResponse<MePayload>> {
    let user = User::find_by_id(&state.db, caller.id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("account no longer exists".into()))?;
    let profile = match user.role {
        UserRole::Farmer => FarmerProfile::find(&state.db, user.id).await?.map(RoleProfile::Farmer),
        UserRole::Agent => AgentProfile::find(&state.db, user.id).await?.map(RoleProfile::Agent),
        UserRole::ShopManager | UserRole::Admin => None,
    };
    Ok(ApiResponse::ok(MePayload { user, profile }))
}

pub async fn update_me(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiJson(req): ApiJson<UpdateMeRequest>,
) -> AppResult<ApiResponse<User>> {
    req.validate()?;
    let user = User::update_me(&state.db, caller.id, &req).await?;
    Ok(ApiResponse::ok(user).with_message("Profile updated"))
}

pub async fn change_password(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiJson(req): ApiJson<ChangePasswordRequest>,
) -> AppResult<ApiResponse<()>> {
    validate_password(&req.new_password)
        .map_err(|_| AppError::invalid_field("new_password", "must be 8-128 characters with a letter and a digit"))?;

    let user = User::find_by_id(&state.db, caller.id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("account no longer exists".into()))?;
    if !verify_password_blocking(req.current_password, user.password_hash).await? {
        tracing::warn!(user_id = %caller.id, "password change refused: wrong current password");
        return Err(AppError::Unauthorized("current password is incorrect".into()));
    }

    let hash = hash_password_blocking(req.new_password).await?;
    User::set_password_hash(&state.db, caller.id, &hash).await?;
    tracing::info!(user_id = %caller.id, "password changed");
    Ok(ApiResponse::ok(()).with_message("Password changed"))
}
