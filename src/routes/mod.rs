//! HTTP route handlers for the Biblioteca Xonler API.
//!
//! - `auth`: login, current user and the startup admin bootstrap
//! - `bibliotecas`, `libros`, `prestamos`, `usuarios`: entity CRUD
//! - `health`: liveness, readiness, metrics and version endpoints
//! - `extract`: extractors producing the uniform error body
//! - `listing`: shared paged-listing and single-row plumbing

pub mod auth;
pub mod bibliotecas;
pub mod extract;
pub mod health;
pub mod libros;
pub mod listing;
pub mod prestamos;
pub mod usuarios;

use axum::{
    extract::DefaultBodyLimit,
    handler::HandlerWithoutStateExt,
    middleware::{from_fn, from_fn_with_state},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::{
    error::{AppError, MSG_ROUTE_NOT_FOUND},
    metrics::track_requests,
    middleware::{
        auth::{admin_for_writes, require_admin, require_auth},
        rate_limit::rate_limit_middleware,
        security_headers::security_headers_middleware,
    },
    state::AppState,
};

/// Unknown routes.
pub async fn not_found() -> impl IntoResponse {
    AppError::NotFound(MSG_ROUTE_NOT_FOUND.to_string())
}

/// Builds the complete application router with all middleware applied.
///
/// Layers, outermost first: security headers, tracing, compression,
/// request metrics, per-IP rate limiting, body limit. Entity routes add the
/// bearer-token check and the role check on top of that.
pub fn router(state: AppState) -> Router {
    let cfg = state.config.clone();

    let public = Router::new()
        .route("/healthz", get(health::healthz))
        .route("/readyz", get(health::readyz))
        .route("/metrics", get(health::metrics))
        .route("/metrics/prometheus", get(health::metrics_prometheus))
        .route("/version", get(health::version))
        .route("/auth/login", post(auth::login));

    // Any authenticated user reads; writes need admin.
    let catalog = Router::new()
        .route("/auth/me", get(auth::me))
        .route("/bibliotecas", get(bibliotecas::list_bibliotecas).post(bibliotecas::create_biblioteca))
        .route(
            "/bibliotecas/{id}",
            get(bibliotecas::get_biblioteca).put(bibliotecas::update_biblioteca).delete(bibliotecas::delete_biblioteca),
        )
        .route("/libros", get(libros::list_libros).post(libros::create_libro))
        .route("/libros/{id}", get(libros::get_libro).put(libros::update_libro).delete(libros::delete_libro))
        .route("/prestamos", get(prestamos::list_prestamos).post(prestamos::create_prestamo))
        .route(
            "/prestamos/{id}",
            get(prestamos::get_prestamo).put(prestamos::update_prestamo).delete(prestamos::delete_prestamo),
        )
        .route("/prestamos/{id}/devolver", post(prestamos::devolver_prestamo))
        .route_layer(from_fn(admin_for_writes))
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    let admin = Router::new()
        .route("/usuarios", get(usuarios::list_usuarios).post(usuarios::create_usuario))
        .route(
            "/usuarios/{id}",
            get(usuarios::get_usuario).put(usuarios::update_usuario).delete(usuarios::delete_usuario),
        )
        .route_layer(from_fn(require_admin))
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    let app = public.merge(catalog).merge(admin);

    // Optional frontend bundle; misses fall through to the JSON 404.
    let app = match cfg.server.static_dir.as_ref() {
        Some(dir) => app.fallback_service(
            ServeDir::new(dir)
                .append_index_html_on_directories(true)
                .call_fallback_on_method_not_allowed(true)
                .not_found_service(not_found.into_service()),
        ),
        None => app.fallback(not_found),
    };

    let body_limit = cfg.server.body_limit_bytes;
    let app = app.with_state(state.clone()).layer(
        ServiceBuilder::new()
            .layer(from_fn_with_state(cfg, security_headers_middleware))
            .layer(TraceLayer::new_for_http())
            .layer(CompressionLayer::new())
            .layer(from_fn_with_state(state.metrics.clone(), track_requests))
            .layer(from_fn_with_state(state, rate_limit_middleware))
            .layer(DefaultBodyLimit::max(body_limit)),
    );

    // CORS: permissive in debug builds for a separately served frontend
    if cfg!(debug_assertions) {
        app.layer(CorsLayer::permissive())
    } else {
        app
    }
}
