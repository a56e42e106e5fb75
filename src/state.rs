use std::sync::Arc;

use crate::auth::JwtKeys;
use crate::config::AppConfig;
use crate::metrics::Metrics;
use crate::middleware::{EndpointRateLimiter, RateLimiter};

/// The shared application state.
///
/// Cloned into every handler and middleware; all members are cheap handles.
#[derive(Clone)]
pub struct AppState {
    /// The database connection pool.
    pub db: sqlx::SqlitePool,
    /// The application configuration.
    pub config: Arc<AppConfig>,
    /// Request and domain counters served by `/metrics`.
    pub metrics: Metrics,
    /// Per-client limit applied to every request.
    pub global_limiter: RateLimiter,
    /// Tighter limits for the credential endpoints.
    pub rate_limiter: EndpointRateLimiter,
    /// Token signing and verification keys.
    pub jwt: Arc<JwtKeys>,
}

impl AppState {
    pub fn new(db: sqlx::SqlitePool, config: AppConfig) -> Self {
        let global_limiter = RateLimiter::from_config(&config.rate_limit);
        let rate_limiter = EndpointRateLimiter::from_config(&config.rate_limit);
        let jwt = Arc::new(JwtKeys::from_config(&config.auth));

        Self { db, config: Arc::new(config), metrics: Metrics::new(), global_limiter, rate_limiter, jwt }
    }
}
