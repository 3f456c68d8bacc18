use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

/// Request and auth counters for monitoring
#[derive(Clone)]
pub struct Metrics {
    pub http_requests: Arc<AtomicU64>,
    pub http_client_errors: Arc<AtomicU64>,
    pub http_server_errors: Arc<AtomicU64>,
    pub logins_succeeded: Arc<AtomicU64>,
    pub logins_failed: Arc<AtomicU64>,
    pub rate_limited: Arc<AtomicU64>,
    pub start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            http_requests: Arc::new(AtomicU64::new(0)),
            http_client_errors: Arc::new(AtomicU64::new(0)),
            http_server_errors: Arc::new(AtomicU64::new(0)),
            logins_succeeded: Arc::new(AtomicU64::new(0)),
            logins_failed: Arc::new(AtomicU64::new(0)),
            rate_limited: Arc::new(AtomicU64::new(0)),
            start_time: Instant::now(),
        }
    }

    pub fn record_status(&self, status: u16) {
        self.http_requests.fetch_add(1, Ordering::Relaxed);
        match status {
            429 => {
                self.rate_limited.fetch_add(1, Ordering::Relaxed);
                self.http_client_errors.fetch_add(1, Ordering::Relaxed);
            }
            400..=499 => {
                self.http_client_errors.fetch_add(1, Ordering::Relaxed);
            }
            500..=599 => {
                self.http_server_errors.fetch_add(1, Ordering::Relaxed);
            }
            _ => {}
        }
    }

    pub fn inc_login(&self, ok: bool) {
        if ok {
            self.logins_succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.logins_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn get_snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            http_requests: self.http_requests.load(Ordering::Relaxed),
            http_client_errors: self.http_client_errors.load(Ordering::Relaxed),
            http_server_errors: self.http_server_errors.load(Ordering::Relaxed),
            logins_succeeded: self.logins_succeeded.load(Ordering::Relaxed),
            logins_failed: self.logins_failed.load(Ordering::Relaxed),
            rate_limited: self.rate_limited.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub http_requests: u64,
    pub http_client_errors: u64,
    pub http_server_errors: u64,
    pub logins_succeeded: u64,
    pub logins_failed: u64,
    pub rate_limited: u64,
    pub uptime_seconds: u64,
}

impl MetricsSnapshot {
    /// Prometheus text exposition format (version 0.0.4).
    pub fn to_prometheus(&self) -> String {
        let rows: [(&str, &str, &str, u64); 7] = [
            ("http_requests_total", "counter", "HTTP requests handled", self.http_requests),
            ("http_client_errors_total", "counter", "Responses with 4xx status", self.http_client_errors),
            ("http_server_errors_total", "counter", "Responses with 5xx status", self.http_server_errors),
            ("logins_succeeded_total", "counter", "Successful logins", self.logins_succeeded),
            ("logins_failed_total", "counter", "Rejected logins", self.logins_failed),
            ("rate_limited_total", "counter", "Requests rejected by rate limiting", self.rate_limited),
            ("uptime_seconds", "gauge", "Uptime seconds", self.uptime_seconds),
        ];
        let mut out = String::new();
        for (name, kind, help, value) in rows {
            out.push_str(&format!(
                "# HELP xonler_{name} {help}\n# TYPE xonler_{name} {kind}\nxonler_{name} {value}\n"
            ));
        }
        out
    }
}

/// Counts every response by status class.
pub async fn track_requests(State(metrics): State<Metrics>, req: Request, next: Next) -> Response {
    let res = next.run(req).await;
    metrics.record_status(res.status().as_u16());
    res
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classes_are_counted() {
        let m = Metrics::new();
        m.record_status(200);
        m.record_status(404);
        m.record_status(429);
        m.record_status(500);
        let s = m.get_snapshot();
        assert_eq!(s.http_requests, 4);
        assert_eq!(s.http_client_errors, 2);
        assert_eq!(s.rate_limited, 1);
        assert_eq!(s.http_server_errors, 1);
    }

    #[test]
    fn prometheus_text_has_help_and_type() {
        let m = Metrics::new();
        m.inc_login(true);
        m.inc_login(false);
        let text = m.get_snapshot().to_prometheus();
        assert!(text.contains("# TYPE xonler_logins_succeeded_total counter\nxonler_logins_succeeded_total 1\n"));
        assert!(text.contains("xonler_logins_failed_total 1\n"));
        assert!(text.contains("# TYPE xonler_uptime_seconds gauge"));
    }
}
