use std::sync::Arc;

use crate::auth::JwtManager;
use crate::config::AppConfig;
use crate::db::QueryExecutor;
use crate::metrics::Metrics;
use crate::middleware::rate_limit::RateLimiter;
use crate::middleware::EndpointRateLimiter;

/// Per-endpoint limiter key for the login route.
pub const LOGIN_ENDPOINT: &str = "/auth/login";

/// The shared application state.
///
/// Cloned into every handler by Axum; all fields are cheap handles onto
/// shared data.
#[derive(Clone)]
pub struct AppState {
    /// The query executor, backed by the single process-wide pool.
    ///
    /// Injected at startup so tests can substitute a recording fake.
    pub db: Arc<dyn QueryExecutor>,
    /// The application configuration.
    pub config: Arc<AppConfig>,
    pub metrics: Metrics,
    /// Token signing and verification.
    pub jwt: Arc<JwtManager>,
    /// Global per-IP limiter applied to every request.
    pub rate_limiter: RateLimiter,
    /// Stricter limits for individual endpoints (login).
    pub endpoint_limiter: EndpointRateLimiter,
}

impl AppState {
    /// Creates a new `AppState` from an executor and the validated config.
    ///
    /// Rate limits come from `[rate_limit]`: a global per-IP window and a
    /// separate, stricter window for `/auth/login`.
    pub fn new(db: Arc<dyn QueryExecutor>, config: AppConfig) -> Self {
        let rl = &config.rate_limit;
        let rate_limiter = RateLimiter::new(rl.max_requests, rl.window_seconds);
        let endpoint_limiter = EndpointRateLimiter::new().with_limits(vec![(
            LOGIN_ENDPOINT,
            rl.login_max_requests,
            rl.login_window_seconds,
        )]);
        let jwt = JwtManager::new(&config.auth.jwt_secret, config.auth.token_ttl_secs);

        Self {
            db,
            config: Arc::new(config),
            metrics: Metrics::new(),
            jwt: Arc::new(jwt),
            rate_limiter,
            endpoint_limiter,
        }
    }
}
