use std::net::IpAddr;
use std::path::PathBuf;

use serde::Deserialize;

/// Hard upper bound for any page size, regardless of configuration.
pub const MAX_PAGE_LIMIT: i64 = 100;

const DEFAULTS: &str = include_str!("../config/default.toml");
const DEV_JWT_SECRET: &str = "xonler-dev-secret-change-me";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AppEnv {
    #[default]
    Development,
    Test,
    Production,
}

impl AppEnv {
    /// Parses `NODE_ENV`-style values. Unknown values are treated as development.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => AppEnv::Production,
            "test" => AppEnv::Test,
            _ => AppEnv::Development,
        }
    }

    pub fn is_production(self) -> bool {
        self == AppEnv::Production
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AppEnv::Development => "development",
            AppEnv::Test => "test",
            AppEnv::Production => "production",
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub environment: AppEnv,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub body_limit_bytes: usize,
    pub static_dir: Option<PathBuf>,
    /// Peers whose `X-Forwarded-For`/`X-Real-IP` headers are believed.
    #[serde(default)]
    pub trusted_proxies: Vec<IpAddr>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub auto_migrate: bool,
    pub ssl_ca: Option<PathBuf>,
    pub ssl_cert: Option<PathBuf>,
    pub ssl_key: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PaginationConfig {
    pub default_limit: i64,
    pub max_limit: i64,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self { default_limit: 20, max_limit: MAX_PAGE_LIMIT }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_ttl_secs: i64,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub max_requests: usize,
    pub window_seconds: u64,
    pub login_max_requests: usize,
    pub login_window_seconds: u64,
    pub cleanup_interval_secs: u64,
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
    #[serde(default)]
    pub app: RuntimeConfig,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub pagination: PaginationConfig,
    pub auth: AuthConfig,
    pub rate_limit: RateLimitConfig,
    pub security: Option<SecurityConfig>,
}

impl AppConfig {
    pub fn environment(&self) -> AppEnv {
        self.app.environment
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        // Fallback: parse the embedded default TOML
        match from_toml_str(DEFAULTS) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("FATAL: Failed to parse default config: {}", e);
                panic!("Failed to parse default config: {}", e);
            }
        }
    }
}

/// Parses a complete configuration from a TOML document layered on top of the
/// embedded defaults. Does not consult files or the environment.
pub fn from_toml_str(toml: &str) -> anyhow::Result<AppConfig> {
    let cfg = ::config::Config::builder()
        .add_source(::config::File::from_str(DEFAULTS, ::config::FileFormat::Toml))
        .add_source(::config::File::from_str(toml, ::config::FileFormat::Toml))
        .build()?;
    Ok(cfg.try_deserialize()?)
}

pub fn load() -> anyhow::Result<AppConfig> {
    // Load .env first (optional)
    let _ = dotenvy::dotenv();

    let mut builder = ::config::Config::builder()
        .add_source(::config::File::from_str(DEFAULTS, ::config::FileFormat::Toml))
        // Optional local file: biblioteca.toml (in CWD)
        .add_source(::config::File::with_name("biblioteca").required(false));

    if let Ok(custom_path) = std::env::var("XONLER_CONFIG") {
        builder = builder.add_source(::config::File::with_name(&custom_path).required(false));
    }
    builder = builder.add_source(::config::Environment::with_prefix("XONLER").separator("__"));

    let cfg = builder.build()?;
    let mut app_cfg: AppConfig = cfg.try_deserialize()?;
    // Klassische Variablen (DB_*, NODE_ENV, PORT) haben höchste Priorität
    apply_legacy_env(&mut app_cfg, |key| std::env::var(key).ok());
    validate(&app_cfg)?;
    Ok(app_cfg)
}

/// Applies the flat variables used by existing deployments (`DB_HOST`,
/// `NODE_ENV`, ...). `lookup` abstracts the environment so tests can feed
/// values without touching the process environment.
pub fn apply_legacy_env<F>(cfg: &mut AppConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    if let Some(env) = get("NODE_ENV") {
        cfg.app.environment = AppEnv::parse(&env);
    }
    if let Some(v) = get("PORT") {
        match v.parse::<u16>() {
            Ok(port) => cfg.server.port = port,
            Err(_) => tracing::warn!("Ignoring invalid PORT value: {}", v),
        }
    }
    if let Some(v) = get("DB_HOST") {
        cfg.database.host = v;
    }
    if let Some(v) = get("DB_PORT") {
        match v.parse::<u16>() {
            Ok(port) => cfg.database.port = port,
            Err(_) => tracing::warn!("Ignoring invalid DB_PORT value: {}", v),
        }
    }
    if let Some(v) = get("DB_USER") {
        cfg.database.user = v;
    }
    if let Some(v) = lookup("DB_PASSWORD") {
        cfg.database.password = v;
    }
    if let Some(v) = get("DB_NAME") {
        cfg.database.name = v;
    }
    if let Some(v) = get("DB_SSL_CA") {
        cfg.database.ssl_ca = Some(PathBuf::from(v));
    }
    if let Some(v) = get("DB_SSL_CERT") {
        cfg.database.ssl_cert = Some(PathBuf::from(v));
    }
    if let Some(v) = get("DB_SSL_KEY") {
        cfg.database.ssl_key = Some(PathBuf::from(v));
    }
    if let Some(v) = get("JWT_SECRET") {
        cfg.auth.jwt_secret = v;
    }
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
    if cfg.server.body_limit_bytes < 1024 {
        return Err(anyhow::anyhow!("server.body_limit_bytes must be >= 1024"));
    }

    // Database
    if cfg.database.host.trim().is_empty() {
        return Err(anyhow::anyhow!("database.host must not be empty"));
    }
    if cfg.database.name.trim().is_empty() {
        return Err(anyhow::anyhow!("database.name must not be empty"));
    }
    if cfg.database.max_connections == 0 || cfg.database.max_connections > 200 {
        return Err(anyhow::anyhow!("database.max_connections must be in 1..=200"));
    }
    if cfg.database.acquire_timeout_secs == 0 {
        return Err(anyhow::anyhow!("database.acquire_timeout_secs must be > 0"));
    }

    // Pagination
    let p = cfg.pagination;
    if p.max_limit < 1 || p.max_limit > MAX_PAGE_LIMIT {
        return Err(anyhow::anyhow!("pagination.max_limit must be in 1..={}", MAX_PAGE_LIMIT));
    }
    if p.default_limit < 1 || p.default_limit > p.max_limit {
        return Err(anyhow::anyhow!("pagination.default_limit must be in 1..=max_limit"));
    }

    // Auth
    if cfg.auth.token_ttl_secs <= 0 {
        return Err(anyhow::anyhow!("auth.token_ttl_secs must be > 0"));
    }
    if cfg.environment().is_production() {
        if cfg.auth.jwt_secret == DEV_JWT_SECRET {
            return Err(anyhow::anyhow!("auth.jwt_secret must be changed in production"));
        }
        if cfg.auth.jwt_secret.len() < 32 {
            return Err(anyhow::anyhow!("auth.jwt_secret must be at least 32 bytes in production"));
        }
    }

    // Rate limits
    if cfg.rate_limit.max_requests == 0 || cfg.rate_limit.login_max_requests == 0 {
        return Err(anyhow::anyhow!("rate_limit max requests must be > 0"));
    }
    if cfg.rate_limit.window_seconds == 0 || cfg.rate_limit.login_window_seconds == 0 {
        return Err(anyhow::anyhow!("rate_limit windows must be > 0"));
    }

    Ok(())
}
