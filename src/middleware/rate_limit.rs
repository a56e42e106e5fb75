use super::ip::client_ip;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::{
    collections::HashMap,
    net::IpAddr,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::RwLock;

use crate::config::RateLimitConfig;
use crate::error::AppError;
use crate::state::AppState;

pub const LOGIN_PATH: &str = "/api/auth/login";
pub const REGISTER_PATH: &str = "/api/auth/register";

/// A thread-safe rate limiter based on the sliding window algorithm.
#[derive(Clone)]
pub struct RateLimiter {
    requests: Arc<RwLock<HashMap<IpAddr, Vec<Instant>>>>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    /// Creates a new `RateLimiter`.
    ///
    /// * `max_requests` - The maximum number of requests allowed within the time window.
    /// * `window_seconds` - The duration of the time window in seconds.
    pub fn new(max_requests: usize, window_seconds: u64) -> Self {
        Self {
            requests: Arc::new(RwLock::new(HashMap::new())),
            max_requests,
            window: Duration::from_secs(window_seconds),
        }
    }

    pub fn from_config(cfg: &RateLimitConfig) -> Self {
        Self::new(cfg.max_requests, cfg.window_seconds)
    }

    /// Records a request from `ip`, or returns `RateLimited` with the wait until the
    /// oldest request in the window expires.
    pub async fn check_rate_limit(&self, ip: IpAddr) -> Result<(), AppError> {
        let now = Instant::now();
        let mut requests = self.requests.write().await;
        let timestamps = requests.entry(ip).or_default();

        // On clock skew keep the timestamp rather than let requests through
        timestamps.retain(|&t| now.checked_duration_since(t).map(|d| d < self.window).unwrap_or(true));

        if timestamps.len() >= self.max_requests {
            let oldest = timestamps.first().copied().unwrap_or(now);
            let retry_after = match now.checked_duration_since(oldest) {
                Some(elapsed) => self.window.saturating_sub(elapsed),
                None => Duration::from_secs(1),
            };
            return Err(AppError::RateLimited { retry_after_seconds: retry_after.as_secs().max(1) });
        }

        timestamps.push(now);
        Ok(())
    }

    /// Drops clients with no requests left inside the window.
    pub async fn cleanup_old_entries(&self) {
        let now = Instant::now();
        let mut requests = self.requests.write().await;
        requests.retain(|_, timestamps| {
            timestamps.retain(|&t| now.checked_duration_since(t).map(|d| d < self.window).unwrap_or(true));
            !timestamps.is_empty()
        });
    }
}

/// Per-path limiters layered on top of the global one.
#[derive(Clone, Default)]
pub struct EndpointRateLimiter {
    limiters: Arc<HashMap<String, RateLimiter>>,
}

impl EndpointRateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Each tuple is `(path, max_requests, window_seconds)`. Later entries replace earlier ones.
    pub fn with_limits(self, limits: Vec<(&str, usize, u64)>) -> Self {
        let mut map: HashMap<String, RateLimiter> = self.limiters.as_ref().clone();
        for (endpoint, max_requests, window_seconds) in limits {
            map.insert(endpoint.to_string(), RateLimiter::new(max_requests, window_seconds));
        }
        Self { limiters: Arc::new(map) }
    }

    /// Brute-force protection for the credential endpoints.
    pub fn from_config(cfg: &RateLimitConfig) -> Self {
        Self::new().with_limits(vec![
            (LOGIN_PATH, cfg.login_per_minute, 60),
            (REGISTER_PATH, cfg.register_per_minute, 60),
        ])
    }

    pub async fn check_endpoint_limit(&self, endpoint: &str, ip: IpAddr) -> Result<(), AppError> {
        match self.limiters.get(endpoint) {
            Some(limiter) => limiter.check_rate_limit(ip).await,
            None => Ok(()),
        }
    }

    pub async fn cleanup_all(&self) {
        for limiter in self.limiters.values() {
            limiter.cleanup_old_entries().await;
        }
    }
}

/// Applies the global per-client limit, then any limit registered for the request path.
pub async fn rate_limit_middleware(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let ip = client_ip(&req);

    if let Err(e) = state.global_limiter.check_rate_limit(ip).await {
        tracing::warn!(%ip, "global rate limit exceeded");
        return e.into_response();
    }
    if let Err(e) = state.rate_limiter.check_endpoint_limit(req.uri().path(), ip).await {
        tracing::warn!(%ip, path = %req.uri().path(), "endpoint rate limit exceeded");
        return e.into_response();
    }

    next.run(req).await
}

/// Periodically prunes both limiters so idle clients do not accumulate.
pub async fn cleanup_task(global: RateLimiter, endpoints: EndpointRateLimiter, every: Duration) {
    let mut interval = tokio::time::interval(every);
    loop {
        interval.tick().await;
        global.cleanup_old_entries().await;
        endpoints.cleanup_all().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rate_limiter() {
        let limiter = RateLimiter::new(3, 1);
        let ip = IpAddr::from([127, 0, 0, 1]);

        assert!(limiter.check_rate_limit(ip).await.is_ok());
        assert!(limiter.check_rate_limit(ip).await.is_ok());
        assert!(limiter.check_rate_limit(ip).await.is_ok());

        match limiter.check_rate_limit(ip).await {
            Err(AppError::RateLimited { retry_after_seconds }) => assert!(retry_after_seconds >= 1),
            other => panic!("expected RateLimited, got {:?}", other.err()),
        }

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert!(limiter.check_rate_limit(ip).await.is_ok());
    }

    #[tokio::test]
    async fn test_different_ips() {
        let limiter = RateLimiter::new(1, 1);
        let ip1 = IpAddr::from([127, 0, 0, 1]);
        let ip2 = IpAddr::from([127, 0, 0, 2]);

        assert!(limiter.check_rate_limit(ip1).await.is_ok());
        assert!(limiter.check_rate_limit(ip2).await.is_ok());
        assert!(limiter.check_rate_limit(ip1).await.is_err());
        assert!(limiter.check_rate_limit(ip2).await.is_err());
    }

    #[tokio::test]
    async fn test_endpoint_limits_only_apply_to_registered_paths() {
        let limiter = EndpointRateLimiter::new().with_limits(vec![(LOGIN_PATH, 1, 60)]);
        let ip = IpAddr::from([10, 0, 0, 1]);

        assert!(limiter.check_endpoint_limit(LOGIN_PATH, ip).await.is_ok());
        assert!(limiter.check_endpoint_limit(LOGIN_PATH, ip).await.is_err());
        for _ in 0..5 {
            assert!(limiter.check_endpoint_limit("/api/suppliers", ip).await.is_ok());
        }
    }

    #[tokio::test]
    async fn test_cleanup_drops_expired_clients() {
        let limiter = RateLimiter::new(5, 1);
        limiter.check_rate_limit(IpAddr::from([10, 0, 0, 9])).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1100)).await;
        limiter.cleanup_old_entries().await;
        assert!(limiter.requests.read().await.is_empty());
    }
}
