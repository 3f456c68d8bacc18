use super::ip::client_ip;
use axum::{
    extract::{connect_info::ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::{
    collections::HashMap,
    net::{IpAddr, SocketAddr},
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::RwLock;

use crate::error::AppError;
use crate::state::AppState;

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
    /// # Arguments
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

    /// Records a request from `ip` if it fits in the window.
    ///
    /// Returns `AppError::RateLimited` with the seconds until the oldest
    /// request leaves the window otherwise.
    pub async fn check_rate_limit(&self, ip: IpAddr) -> Result<(), AppError> {
        let now = Instant::now();
        let mut requests = self.requests.write().await;

        let timestamps = requests.entry(ip).or_default();

        // On clock skew keep the timestamp (conservative)
        timestamps.retain(|&t| now.checked_duration_since(t).map(|d| d < self.window).unwrap_or(true));

        if timestamps.len() >= self.max_requests {
            let oldest = timestamps.first().copied().unwrap_or(now);
            let retry_after = match now.checked_duration_since(oldest) {
                Some(elapsed) => self.window.saturating_sub(elapsed),
                None => Duration::from_secs(1),
            };
            // round up so clients never retry too early
            let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
            return Err(AppError::RateLimited { retry_after_seconds: secs.max(1) });
        }

        timestamps.push(now);
        Ok(())
    }

    /// Drops timestamps outside the window and forgets idle IPs.
    pub async fn cleanup_old_entries(&self) {
        let now = Instant::now();
        let mut requests = self.requests.write().await;

        requests.retain(|_, timestamps| {
            timestamps.retain(|&t| now.checked_duration_since(t).map(|d| d < self.window).unwrap_or(true));
            !timestamps.is_empty()
        });
    }

    pub async fn tracked_ips(&self) -> usize {
        self.requests.read().await.len()
    }
}

/// Global per-IP rate limiting.
///
/// The client is the socket peer, or the forwarded address when the peer is
/// a configured trusted proxy.
pub async fn rate_limit_middleware(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let peer = req.extensions().get::<ConnectInfo<SocketAddr>>().map(|info| info.0.ip());
    let ip = client_ip(req.headers(), peer, &state.config.server.trusted_proxies);

    match state.rate_limiter.check_rate_limit(ip).await {
        Ok(()) => next.run(req).await,
        Err(e) => {
            tracing::warn!(%ip, "Rate limit exceeded");
            e.into_response()
        }
    }
}

/// A manager for per-endpoint rate limiters.
#[derive(Clone)]
pub struct EndpointRateLimiter {
    limiters: Arc<RwLock<HashMap<String, RateLimiter>>>,
}

impl Default for EndpointRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl EndpointRateLimiter {
    pub fn new() -> Self {
        Self { limiters: Arc::new(RwLock::new(HashMap::new())) }
    }

    /// Adds or replaces endpoint-specific limits.
    ///
    /// # Arguments
    ///
    /// * `limits` - `(endpoint, max_requests, window_seconds)` tuples.
    pub fn with_limits(self, limits: Vec<(&str, usize, u64)>) -> Self {
        let mut limiters_map = match Arc::try_unwrap(self.limiters) {
            Ok(rwlock) => rwlock.into_inner(),
            Err(arc) => arc.try_read().map(|guard| guard.clone()).unwrap_or_default(),
        };

        for (endpoint, max_requests, window_seconds) in limits {
            limiters_map.insert(endpoint.to_string(), RateLimiter::new(max_requests, window_seconds));
        }

        Self { limiters: Arc::new(RwLock::new(limiters_map)) }
    }

    /// Checks the limit registered for `endpoint`; unknown endpoints pass.
    pub async fn check_endpoint_limit(&self, endpoint: &str, ip: IpAddr) -> Result<(), AppError> {
        let limiter = {
            let limiters = self.limiters.read().await;
            limiters.get(endpoint).cloned()
        };
        match limiter {
            Some(l) => l.check_rate_limit(ip).await,
            None => Ok(()),
        }
    }

    pub async fn cleanup_all(&self) {
        // Snapshot first so the read lock is not held across awaits.
        let snapshot: Vec<RateLimiter> = {
            let limiters = self.limiters.read().await;
            limiters.values().cloned().collect()
        };
        futures::future::join_all(snapshot.iter().map(RateLimiter::cleanup_old_entries)).await;
    }
}

/// Periodically purges stale entries from the global and per-endpoint limiters.
pub fn spawn_cleanup(state: &AppState, interval_secs: u64) -> tokio::task::JoinHandle<()> {
    let global = state.rate_limiter.clone();
    let endpoints = state.endpoint_limiter.clone();
    let every = Duration::from_secs(interval_secs.clamp(10, 3600));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            global.cleanup_old_entries().await;
            endpoints.cleanup_all().await;
        }
    })
}
