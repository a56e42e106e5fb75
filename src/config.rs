use std::path::Path;

use serde::Deserialize;

/// Placeholder secret shipped in `config/default.toml`.
pub const DEFAULT_JWT_SECRET: &str = "agrihub-development-secret-change-me-now";

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_body_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    pub issuer: String,
    pub allow_admin_registration: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaginationConfig {
    pub default_limit: i64,
    pub max_limit: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub max_requests: usize,
    pub window_seconds: u64,
    pub login_per_minute: usize,
    pub register_per_minute: usize,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SecurityConfig {
    pub enable_hsts: Option<bool>,
    pub hsts_max_age: Option<u64>,
    pub hsts_include_subdomains: Option<bool>,
    pub csp: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub pagination: PaginationConfig,
    pub rate_limit: RateLimitConfig,
    pub security: Option<SecurityConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        // Fallback: parse the embedded default TOML
        let defaults: &str = include_str!("../config/default.toml");
        match ::config::Config::builder()
            .add_source(::config::File::from_str(defaults, ::config::FileFormat::Toml))
            .build()
        {
            Ok(cfg) => match cfg.try_deserialize() {
                Ok(app_cfg) => app_cfg,
                Err(e) => {
                    eprintln!("FATAL: Failed to deserialize default config: {}", e);
                    panic!("Failed to deserialize default config: {}", e);
                }
            },
            Err(e) => {
                eprintln!("FATAL: Failed to parse default config: {}", e);
                panic!("Failed to parse default config: {}", e);
            }
        }
    }
}

pub fn load() -> anyhow::Result<AppConfig> {
    // Load .env first (optional)
    let _ = dotenvy::dotenv();

    let defaults: &str = include_str!("../config/default.toml");
    let mut builder = ::config::Config::builder()
        .add_source(::config::File::from_str(defaults, ::config::FileFormat::Toml))
        // Optional local file: agrihub.toml (in CWD)
        .add_source(::config::File::with_name("agrihub").required(false));

    if let Ok(custom_path) = std::env::var("AGRIHUB_CONFIG") {
        builder = builder.add_source(::config::File::with_name(&custom_path).required(false));
    }
    // Environment variables last to have highest precedence
    builder = builder.add_source(::config::Environment::with_prefix("AGRIHUB").separator("__"));

    let cfg = builder.build()?;
    let app_cfg: AppConfig = cfg.try_deserialize()?;
    validate(&app_cfg)?;
    Ok(app_cfg)
}

/// Loads defaults overlaid with a single TOML file. Used for explicit config files and tests.
pub fn load_from_file(path: &Path) -> anyhow::Result<AppConfig> {
    let defaults: &str = include_str!("../config/default.toml");
    let cfg = ::config::Config::builder()
        .add_source(::config::File::from_str(defaults, ::config::FileFormat::Toml))
        .add_source(::config::File::from(path).format(::config::FileFormat::Toml))
        .build()?;
    let app_cfg: AppConfig = cfg.try_deserialize()?;
    validate(&app_cfg)?;
    Ok(app_cfg)
}

pub fn validate(cfg: &AppConfig) -> anyhow::Result<()> {
    // Server
    if cfg.server.port == 0 {
        return Err(anyhow::anyhow!("invalid server.port: {}", cfg.server.port));
    }
    #[cfg(unix)]
    if cfg.server.port < 1024 {
        tracing::warn!("Using privileged port {} - may require elevated permissions", cfg.server.port);
    }
    if cfg.server.max_body_bytes < 1024 {
        return Err(anyhow::anyhow!("server.max_body_bytes must be >= 1024"));
    }

    // Database
    if cfg.database.url.trim().is_empty() {
        return Err(anyhow::anyhow!("database.url must not be empty"));
    }
    if cfg.database.max_connections == 0 {
        return Err(anyhow::anyhow!("database.max_connections must be > 0"));
    }

    // Auth
    if cfg.auth.jwt_secret.len() < 32 {
        return Err(anyhow::anyhow!("auth.jwt_secret must be at least 32 bytes"));
    }
    if cfg.auth.jwt_secret == DEFAULT_JWT_SECRET {
        tracing::warn!("auth.jwt_secret is the shipped placeholder; set AGRIHUB__AUTH__JWT_SECRET");
    }
    if !(1..=720).contains(&cfg.auth.token_ttl_hours) {
        return Err(anyhow::anyhow!("auth.token_ttl_hours must be in 1..=720"));
    }

    // Pagination
    if cfg.pagination.max_limit < 1 || cfg.pagination.max_limit > 1000 {
        return Err(anyhow::anyhow!("pagination.max_limit must be in 1..=1000"));
    }
    if cfg.pagination.default_limit < 1 || cfg.pagination.default_limit > cfg.pagination.max_limit {
        return Err(anyhow::anyhow!("pagination.default_limit must be in 1..=max_limit"));
    }

    // Rate limiting
    if cfg.rate_limit.max_requests == 0 || cfg.rate_limit.window_seconds == 0 {
        return Err(anyhow::anyhow!("rate_limit.max_requests and window_seconds must be > 0"));
    }
    if cfg.rate_limit.login_per_minute == 0 || cfg.rate_limit.register_per_minute == 0 {
        return Err(anyhow::anyhow!("rate_limit per-endpoint limits must be > 0"));
    }

    Ok(())
}

pub fn ensure_sqlite_parent_dir(url: &str) -> anyhow::Result<()> {
    if let Some(path) = url.strip_prefix("sqlite://") {
        // In-memory URLs have no parent directory
        if path.starts_with(":memory:") {
            return Ok(());
        }
        let path = path.split('?').next().unwrap_or(path);
        let p = Path::new(path);
        if let Some(parent) = p.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
    }
    Ok(())
}
