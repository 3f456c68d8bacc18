use axum::{
    extract::{Request, State},
    http::{header, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::auth::{AuthUser, Rol};
use crate::db::SqlParam;
use crate::error::AppError;
use crate::state::AppState;

/// Current role of an active user; no row once the account is deleted or
/// deactivated.
pub const SELECT_SESSION: &str = "SELECT to_jsonb(u.rol) FROM usuarios u WHERE u.id = $1 AND u.activo";

/// Requires a valid `Authorization: Bearer <token>` header.
///
/// The token must still belong to an active user, and the role is taken
/// from the user's row rather than the token, so deletions, deactivations
/// and demotions apply immediately. On success the caller is stored as an
/// [`AuthUser`] request extension for the role checks and handlers further
/// down.
pub async fn require_auth(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());

    let Some(token) = token else {
        return AppError::Unauthorized("Token de acceso requerido".to_string()).into_response();
    };

    let claims = match state.jwt.verify(token) {
        Ok(claims) => claims,
        Err(e) => return e.into_response(),
    };

    let row = match state.db.fetch_optional(SELECT_SESSION, &[SqlParam::from(claims.sub)]).await {
        Ok(row) => row,
        Err(e) => return AppError::from_db(e, "Error verificando la sesión").into_response(),
    };
    let Some(rol) = row.as_ref().and_then(|v| v.as_str()).and_then(Rol::parse) else {
        tracing::warn!(user_id = claims.sub, "Token for missing or inactive user");
        return AppError::Unauthorized("Token inválido o expirado".to_string()).into_response();
    };

    let mut user = AuthUser::from(claims);
    user.rol = rol;
    req.extensions_mut().insert(user);
    next.run(req).await
}

/// Lets any authenticated user read; writes need the admin role.
pub async fn admin_for_writes(req: Request, next: Next) -> Response {
    let read_only = matches!(*req.method(), Method::GET | Method::HEAD | Method::OPTIONS);
    if read_only {
        return next.run(req).await;
    }
    require_admin(req, next).await
}

/// Admin-only access.
pub async fn require_admin(req: Request, next: Next) -> Response {
    match req.extensions().get::<AuthUser>() {
        Some(user) if user.is_admin() => next.run(req).await,
        Some(user) => {
            tracing::warn!(user_id = user.id, method = %req.method(), path = %req.uri().path(), "Forbidden for role");
            AppError::Forbidden("Permisos insuficientes".to_string()).into_response()
        }
        None => AppError::Unauthorized("Token de acceso requerido".to_string()).into_response(),
    }
}
