//! Middleware components for HTTP request processing.
//!
//! Cross-cutting concerns layered onto the router: bearer authentication,
//! per-client rate limiting, request validation, security headers and client
//! identification.

pub mod auth;
pub mod ip;
pub mod rate_limit;
pub mod security_headers;
pub mod validation;

pub use auth::AuthUser;
pub use rate_limit::{EndpointRateLimiter, RateLimiter};
