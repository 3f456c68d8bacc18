//! Process-wide Postgres pool.
//!
//! [`Database::connect`] is called exactly once from `main`; the resulting
//! handle is shared through [`crate::state::AppState`] and closed with
//! [`Database::close`] after the HTTP server has drained.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgSslMode};
use sqlx::Postgres;

use super::error::DbError;
use super::executor::{PoolStats, QueryExecutor, SqlParam};
use crate::config::{AppEnv, DatabaseConfig};

/// Reasons the pool refuses to be built.
#[derive(Debug, thiserror::Error)]
pub enum PoolConfigError {
    #[error("production mode requires TLS material, missing: {}", .0.join(", "))]
    MissingTlsMaterial(Vec<&'static str>),
    #[error("TLS file for {name} is not readable: {path}")]
    UnreadableTlsFile { name: &'static str, path: PathBuf },
    #[error("failed to connect to database: {0}")]
    Connect(#[source] sqlx::Error),
}

/// Resolved TLS file set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsMaterial {
    pub ca: PathBuf,
    pub cert: Option<PathBuf>,
    pub key: Option<PathBuf>,
}

/// Decides which TLS material to use.
///
/// Production requires CA, client certificate and client key, all readable.
/// Other environments use whatever is configured: a CA alone enables server
/// verification; nothing configured means no TLS material.
pub fn resolve_tls(cfg: &DatabaseConfig, env: AppEnv) -> Result<Option<TlsMaterial>, PoolConfigError> {
    let entries: [(&'static str, &Option<PathBuf>); 3] =
        [("DB_SSL_CA", &cfg.ssl_ca), ("DB_SSL_CERT", &cfg.ssl_cert), ("DB_SSL_KEY", &cfg.ssl_key)];

    if env.is_production() {
        let missing: Vec<&'static str> = entries
            .iter()
            .filter(|(_, p)| !matches!(p, Some(path) if !path.as_os_str().is_empty()))
            .map(|(name, _)| *name)
            .collect();
        if !missing.is_empty() {
            return Err(PoolConfigError::MissingTlsMaterial(missing));
        }
    }

    for (name, path) in entries {
        if let Some(p) = path {
            if !is_readable_file(p) {
                return Err(PoolConfigError::UnreadableTlsFile { name, path: p.clone() });
            }
        }
    }

    Ok(cfg.ssl_ca.clone().map(|ca| TlsMaterial { ca, cert: cfg.ssl_cert.clone(), key: cfg.ssl_key.clone() }))
}

fn is_readable_file(path: &Path) -> bool {
    std::fs::File::open(path).map(|_| path.is_file()).unwrap_or(false)
}

/// Builds connection options, validating TLS material for the environment.
pub fn connect_options(cfg: &DatabaseConfig, env: AppEnv) -> Result<PgConnectOptions, PoolConfigError> {
    let mut opts = PgConnectOptions::new()
        .host(&cfg.host)
        .port(cfg.port)
        .username(&cfg.user)
        .password(&cfg.password)
        .database(&cfg.name)
        .application_name(env!("CARGO_PKG_NAME"));

    opts = match resolve_tls(cfg, env)? {
        Some(tls) => {
            let mut o = opts.ssl_mode(PgSslMode::VerifyFull).ssl_root_cert(&tls.ca);
            if let Some(cert) = &tls.cert {
                o = o.ssl_client_cert(cert);
            }
            if let Some(key) = &tls.key {
                o = o.ssl_client_key(key);
            }
            o
        }
        None => opts.ssl_mode(PgSslMode::Prefer),
    };
    Ok(opts)
}

/// Shared pool handle. Cloning is cheap and refers to the same pool.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
    waiting: Arc<AtomicUsize>,
}

impl Database {
    pub async fn connect(cfg: &DatabaseConfig, env: AppEnv) -> Result<Self, PoolConfigError> {
        let opts = connect_options(cfg, env)?;
        let pool = PgPoolOptions::new()
            .max_connections(cfg.max_connections)
            .acquire_timeout(Duration::from_secs(cfg.acquire_timeout_secs))
            .idle_timeout(Duration::from_secs(cfg.idle_timeout_secs))
            .connect_with(opts)
            .await
            .map_err(PoolConfigError::Connect)?;
        let db = Self::from_pool(pool);
        tracing::info!(
            host = %cfg.host,
            database = %cfg.name,
            max_connections = cfg.max_connections,
            environment = env.as_str(),
            "Database pool ready"
        );
        Ok(db)
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool, waiting: Arc::new(AtomicUsize::new(0)) }
    }

    /// Returns `true` when a `SELECT 1` round trip succeeds.
    pub async fn test_connection(&self) -> bool {
        match self.ping().await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("Database connection test failed: {}", e);
                false
            }
        }
    }

    pub async fn close(&self) {
        tracing::info!("Closing database pool");
        self.pool.close().await;
    }

    async fn acquire(&self) -> Result<PoolConnection<Postgres>, DbError> {
        let _waiting = WaitGuard::enter(&self.waiting);
        self.pool.acquire().await.map_err(DbError::from)
    }
}

/// Counts a task as waiting for a connection until dropped, so cancelled
/// acquires (timeouts, `try_join!` losers, client disconnects) are released
/// as well.
struct WaitGuard<'a>(&'a AtomicUsize);

impl<'a> WaitGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::Relaxed);
        Self(counter)
    }
}

impl Drop for WaitGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

macro_rules! bind_params {
    ($query:expr, $params:expr) => {{
        let mut q = $query;
        for p in $params {
            q = match p {
                SqlParam::Text(v) => q.bind(v.clone()),
                SqlParam::Int(v) => q.bind(*v),
                SqlParam::Bool(v) => q.bind(*v),
                SqlParam::Date(v) => q.bind(*v),
            };
        }
        q
    }};
}

#[async_trait]
impl QueryExecutor for Database {
    async fn fetch_rows(&self, sql: &str, params: &[SqlParam]) -> Result<Vec<Value>, DbError> {
        tracing::debug!(sql, params = params.len(), "fetch_rows");
        let mut conn = self.acquire().await?;
        let q = bind_params!(sqlx::query_scalar::<Postgres, Value>(sql), params);
        Ok(q.fetch_all(&mut *conn).await?)
    }

    async fn fetch_count(&self, sql: &str, params: &[SqlParam]) -> Result<i64, DbError> {
        tracing::debug!(sql, params = params.len(), "fetch_count");
        let mut conn = self.acquire().await?;
        let q = bind_params!(sqlx::query_scalar::<Postgres, i64>(sql), params);
        Ok(q.fetch_one(&mut *conn).await?)
    }

    async fn execute(&self, sql: &str, params: &[SqlParam]) -> Result<u64, DbError> {
        tracing::debug!(sql, params = params.len(), "execute");
        let mut conn = self.acquire().await?;
        let q = bind_params!(sqlx::query(sql), params);
        Ok(q.execute(&mut *conn).await?.rows_affected())
    }

    async fn ping(&self) -> Result<(), DbError> {
        let mut conn = self.acquire().await?;
        sqlx::query("SELECT 1").execute(&mut *conn).await?;
        Ok(())
    }

    fn stats(&self) -> PoolStats {
        PoolStats {
            size: self.pool.size(),
            idle: self.pool.num_idle(),
            waiting: self.waiting.load(Ordering::Relaxed),
        }
    }
}
