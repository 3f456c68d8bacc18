use crate::state::AppState;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::json;

// Liveness probe, no DB access
pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

// Readiness probe: DB ping bounded by a timeout, plus pool stats
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let ping = state.db.ping();
    match tokio::time::timeout(std::time::Duration::from_secs(5), ping).await {
        Ok(Ok(())) => (StatusCode::OK, Json(json!({ "status": "ready", "pool": state.db.stats() }))).into_response(),
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "Readiness check failed");
            (StatusCode::SERVICE_UNAVAILABLE, Json(json!({ "status": "not_ready" }))).into_response()
        }
        Err(_) => {
            tracing::warn!("Readiness check timed out");
            (StatusCode::SERVICE_UNAVAILABLE, Json(json!({ "status": "not_ready", "reason": "timeout" })))
                .into_response()
        }
    }
}

// Metrics endpoint: returns JSON snapshot
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.metrics.get_snapshot())
}

// Prometheus-compatible text exposition format
pub async fn metrics_prometheus(State(state): State<AppState>) -> impl IntoResponse {
    let body = state.metrics.get_snapshot().to_prometheus();
    ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body)
}

// Version/Build info endpoint (JSON)
pub async fn version(State(state): State<AppState>) -> impl IntoResponse {
    let body = json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "package": {
            "description": env!("CARGO_PKG_DESCRIPTION"),
            "license": env!("CARGO_PKG_LICENSE"),
        },
        "environment": state.config.environment().as_str(),
        "build": {
            "profile": if cfg!(debug_assertions) { "debug" } else { "release" },
            "os": std::env::consts::OS,
            "arch": std::env::consts::ARCH,
        }
    });
    (StatusCode::OK, Json(body))
}
