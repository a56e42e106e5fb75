//! Integration and unit tests for the AgriHub backend.
//!
//! The API tests drive the full router (auth, rate limiting, validation and
//! security-header layers included) against an in-memory SQLite database.
//!
//! ## Test Modules
//!
//! - **api_tests**: envelope, fallback, docs catalogue and request validation
//! - **health_api_tests**: liveness, readiness, metrics and version endpoints
//! - **auth_tests**: registration, login, tokens and account management
//! - **catalogue_tests**: suppliers, shops and products
//! - **order_tests**: placement, stock accounting, visibility and status flow
//! - **report_tests**: field reports, scoping and completion
//! - **profile_tests**: farmer/agent profiles and agent assignment
//! - **error_tests**: error mapping and response bodies
//! - **config_tests**: configuration loading and validation
//! - **db_tests**: schema initialization and constraints

pub mod catalogue_tests;
pub mod db_tests;
pub mod order_tests;
pub mod profile_tests;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use tower::ServiceExt;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::state::AppState;

pub const PASSWORD: &str = "s3cretpass";

pub async fn test_pool() -> sqlx::SqlitePool {
    // A single connection that never expires keeps the in-memory database alive
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    crate::db::init_db(&pool).await.unwrap();
    pool
}

/// File-backed pool with several connections, for tests that race writers against each other.
pub async fn shared_pool(dir: &tempfile::TempDir, connections: u32) -> sqlx::SqlitePool {
    let options = SqliteConnectOptions::new()
        .filename(dir.path().join("agrihub.db"))
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(std::time::Duration::from_secs(10));
    let pool = SqlitePoolOptions::new().max_connections(connections).connect_with(options).await.unwrap();
    crate::db::init_db(&pool).await.unwrap();
    pool
}

pub fn test_config() -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.database.url = "sqlite::memory:".to_string();
    cfg.auth.allow_admin_registration = true;
    cfg.rate_limit.max_requests = 10_000;
    cfg.rate_limit.login_per_minute = 1_000;
    cfg.rate_limit.register_per_minute = 1_000;
    cfg
}

pub struct TestApp {
    pub app: Router,
    pub state: AppState,
}

/// A registered account and its bearer token.
pub struct Account {
    pub id: Uuid,
    pub token: String,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(test_config()).await
    }

    pub async fn with_config(cfg: AppConfig) -> Self {
        let state = AppState::new(test_pool().await, cfg);
        let app = crate::routes::router(state.clone());
        Self { app, state }
    }

    /// Sends a request through the full router. Non-JSON bodies come back as a JSON string.
    pub async fn send(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(t) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", t));
        }
        let req = match body {
            Some(v) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(v.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let res = self.app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        let value = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
        (status, value)
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.send(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, Some(token), Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::PUT, uri, Some(token), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.send(Method::DELETE, uri, Some(token), None).await
    }

    pub async fn register(&self, name: &str, email: &str, role: &str) -> Account {
        let (status, body) = self
            .send(
                Method::POST,
                "/api/auth/register",
                None,
                Some(json!({ "name": name, "email": email, "password": PASSWORD, "role": role })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register {} failed: {}", email, body);
        Account {
            id: body["data"]["user"]["id"].as_str().unwrap().parse().unwrap(),
            token: body["data"]["token"].as_str().unwrap().to_string(),
        }
    }

    pub async fn admin(&self) -> Account {
        self.register("Ada Admin", "admin@agrihub.test", "admin").await
    }

    pub async fn supplier(&self, token: &str, email: &str) -> Uuid {
        let (status, body) = self
            .post(
                "/api/suppliers",
                token,
                json!({
                    "name": "Green Inputs Ltd",
                    "email": email,
                    "phone": "+254700111222",
                    "address": { "city": "Nakuru", "region": "Rift Valley" },
                    "categories": ["seeds", "fertilizers"]
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create supplier failed: {}", body);
        body["data"]["id"].as_str().unwrap().parse().unwrap()
    }

    pub async fn shop(&self, admin_token: &str, manager_id: Uuid) -> Uuid {
        let (status, body) = self
            .post(
                "/api/shops",
                admin_token,
                json!({
                    "name": "Molo Agrovet",
                    "manager_id": manager_id,
                    "district": "Molo",
                    "region": "Rift Valley",
                    "phone": "+254711000111"
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create shop failed: {}", body);
        body["data"]["id"].as_str().unwrap().parse().unwrap()
    }

    pub async fn product(&self, token: &str, supplier_id: Uuid, shop_id: Uuid, price: f64, stock: i64) -> Uuid {
        let (status, body) = self
            .post(
                "/api/products",
                token,
                json!({
                    "name": "Hybrid maize seed",
                    "category": "seeds",
                    "unit": "bag",
                    "price": price,
                    "stock_quantity": stock,
                    "supplier_id": supplier_id,
                    "shop_id": shop_id
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create product failed: {}", body);
        body["data"]["id"].as_str().unwrap().parse().unwrap()
    }
}
