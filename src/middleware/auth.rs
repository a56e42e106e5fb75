use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::auth::bearer_token;
use crate::error::{AppError, AppResult};
use crate::models::user::{User, UserRole};
use crate::state::AppState;

/// The caller behind a verified bearer token, attached to the request by [`require_auth`].
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: UserRole,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// Fails with 403 unless the caller holds one of `roles`.
    pub fn require_role(&self, roles: &[UserRole]) -> AppResult<()> {
        if roles.contains(&self.role) {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!("role '{}' may not perform this action", self.role)))
        }
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized("authentication required".into()))
    }
}

/// Verifies the bearer token and loads the account it names.
///
/// Tokens outlive account changes, so the user is re-read on every request: deleted
/// or deactivated accounts are rejected even while their token is still valid, and
/// role changes take effect immediately.
pub async fn require_auth(State(state): State<AppState>, mut req: Request, next: Next) -> Result<Response, AppError> {
    let header_value = req.headers().get(header::AUTHORIZATION).and_then(|h| h.to_str().ok());
    let token = bearer_token(header_value)?;
    let claims = state.jwt.verify(token)?;

    let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AppError::Unauthorized("invalid token subject".into()))?;
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("account no longer exists".into()))?;
    if !user.is_active {
        return Err(AppError::Unauthorized("account is deactivated".into()));
    }

    req.extensions_mut().insert(AuthUser { id: user.id, email: user.email, name: user.name, role: user.role });
    Ok(next.run(req).await)
}
