//! # AgriHub Backend Library
//!
//! REST backend for agricultural-sector management: farmers, extension agents,
//! input suppliers, agro-dealer shops, product catalogue, orders and field reports.
//!
//! ## Architecture
//!
//! The application is built using:
//! - **Axum**: HTTP server, routing and extractors
//! - **SQLx**: Asynchronous persistence on SQLite
//! - **Tokio**: Async runtime
//! - **Serde**: JSON request and response bodies
//! - **jsonwebtoken / argon2**: Bearer tokens and password hashing
//!
//! ## Core Components
//!
//! - [`auth`]: Token issuing/verification and password hashing
//! - [`config`]: Application configuration management
//! - [`db`]: Database schema initialization
//! - [`error`]: Centralized error handling and HTTP error responses
//! - [`extract`]: JSON/query/path extractors that reject with the API error envelope
//! - [`metrics`]: Request and domain counters
//! - [`middleware`]: Authentication, rate limiting, request validation and security headers
//! - [`models`]: Typed records, field rules and per-collection queries
//! - [`routes`]: HTTP API endpoint handlers
//! - [`state`]: Shared application state
//! - [`types`]: Response envelope and pagination

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod state;
pub mod types;

#[cfg(test)]
mod tests;
