use axum::{
    extract::{Request, State},
    http::{header, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::AppError;
use crate::state::AppState;

/// Rejects requests that are malformed before they reach a handler:
/// traversal sequences in the path, bodies over `server.max_body_bytes`, and
/// non-JSON bodies on write methods.
pub async fn validate_request_middleware(State(state): State<AppState>, req: Request, next: Next) -> Response {
    match check_request(&req, state.config.server.max_body_bytes) {
        Ok(()) => next.run(req).await,
        Err(e) => e.into_response(),
    }
}

fn check_request(req: &Request, max_body_bytes: usize) -> Result<(), AppError> {
    let path = req.uri().path();
    if contains_path_traversal(path) {
        tracing::warn!(path, "rejected request with traversal sequence");
        return Err(AppError::BadRequest("Path traversal detected in request".into()));
    }

    if let Some(ua) = req.headers().get(header::USER_AGENT).and_then(|v| v.to_str().ok()) {
        if is_suspicious_user_agent(ua) {
            tracing::warn!("Suspicious user agent detected: {}", ua);
        }
    }

    if !matches!(*req.method(), Method::POST | Method::PUT | Method::PATCH) {
        return Ok(());
    }

    let length = req
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if let Some(length) = length {
        if length > max_body_bytes {
            return Err(AppError::PayloadTooLarge(format!(
                "Request body exceeds maximum size of {} bytes",
                max_body_bytes
            )));
        }
    }

    // Bodiless writes (e.g. POST /complete with no payload) need no content type.
    if length.unwrap_or(0) > 0 {
        let is_json = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.trim_start().to_ascii_lowercase().starts_with("application/json"));
        if !is_json {
            return Err(AppError::UnsupportedMediaType("Expected 'Content-Type: application/json'".into()));
        }
    }
    Ok(())
}

fn contains_path_traversal(path: &str) -> bool {
    let lower = path.to_lowercase();
    if path.contains("/..") || path.contains("\\..") || path.starts_with("..") || path.contains("/./") {
        return true;
    }
    const ENCODED: [&str; 6] = ["%2e%2e", "%252e%252e", "%2e/", "/%2e", "%2f%2e", "%00"];
    ENCODED.iter().any(|p| lower.contains(p)) || path.contains('\0')
}

fn is_suspicious_user_agent(ua: &str) -> bool {
    let ua = ua.to_lowercase();
    ["sqlmap", "nikto", "havij", "acunetix", "masscan"].iter().any(|s| ua.contains(s))
}
