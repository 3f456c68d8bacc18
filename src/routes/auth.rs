use axum::{extract::State, Extension, Json};
use lazy_static::lazy_static;
use serde_json::Value;

use crate::{
    auth::{hash_password, hash_password_blocking, verify_password_blocking, AuthUser, Rol},
    config::AuthConfig,
    db::{DbError, QueryExecutor, SqlParam},
    error::{validation, AppError, AppResult},
    middleware::ip::ClientIp,
    routes::extract::JsonBody,
    state::{AppState, LOGIN_ENDPOINT},
    types::{LoginRequest, LoginResponse},
};

const BAD_CREDENTIALS: &str = "Credenciales inválidas";

const SELECT_BY_EMAIL: &str = "SELECT to_jsonb(u) FROM usuarios u WHERE u.email = $1";
const SELECT_ME: &str = "SELECT to_jsonb(u) - 'password_hash' FROM usuarios u WHERE u.id = $1 AND u.activo";

lazy_static! {
    // Verified against when the email is unknown, so both paths cost one Argon2 run.
    static ref DUMMY_HASH: String = hash_password("xonler-unknown-user").unwrap_or_default();
}

pub async fn login(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    JsonBody(req): JsonBody<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    if let Err(e) = state.endpoint_limiter.check_endpoint_limit(LOGIN_ENDPOINT, ip).await {
        tracing::warn!(%ip, "Login rate limit exceeded");
        return Err(e);
    }

    let email = req.email.trim().to_lowercase();
    if email.is_empty() {
        return Err(AppError::validation("email", "El campo 'email' es obligatorio"));
    }
    if req.password.is_empty() {
        return Err(AppError::validation("password", "El campo 'password' es obligatorio"));
    }

    let row = state
        .db
        .fetch_optional(SELECT_BY_EMAIL, &[SqlParam::from(email.as_str())])
        .await
        .map_err(|e| AppError::from_db(e, "Error iniciando sesión"))?;

    let (stored_hash, usuario) = match row {
        Some(mut user) => {
            let hash = user
                .as_object_mut()
                .and_then(|o| o.remove("password_hash"))
                .and_then(|h| h.as_str().map(str::to_string));
            (hash, Some(user))
        }
        None => (None, None),
    };

    let password_ok = verify_password_blocking(req.password, stored_hash.unwrap_or_else(|| DUMMY_HASH.clone())).await;
    let usuario = usuario.filter(|u| password_ok && u["activo"].as_bool() == Some(true));
    let Some(usuario) = usuario else {
        state.metrics.inc_login(false);
        tracing::warn!(%ip, "Failed login attempt");
        return Err(AppError::Unauthorized(BAD_CREDENTIALS.to_string()));
    };

    let (id, rol) = match (usuario["id"].as_i64(), usuario["rol"].as_str().and_then(Rol::parse)) {
        (Some(id), Some(rol)) => (id, rol),
        _ => {
            tracing::error!("Usuario row without id or valid rol");
            return Err(AppError::Failure("Error iniciando sesión".to_string()));
        }
    };

    let token = state.jwt.issue(id, &email, rol)?;
    state.metrics.inc_login(true);
    tracing::info!(user_id = id, rol = rol.as_str(), "Login");

    Ok(Json(LoginResponse { token, token_type: "Bearer", expires_in: state.jwt.lifetime_secs(), usuario }))
}

/// The caller's current user record.
pub async fn me(State(state): State<AppState>, Extension(user): Extension<AuthUser>) -> AppResult<Json<Value>> {
    let row = state
        .db
        .fetch_optional(SELECT_ME, &[SqlParam::from(user.id)])
        .await
        .map_err(|e| AppError::from_db(e, "Error obteniendo usuario"))?;
    // Deleted or deactivated since the token was issued.
    row.map(Json).ok_or_else(|| AppError::Unauthorized("Token inválido o expirado".to_string()))
}

/// Creates the configured admin account when the user table is empty.
///
/// Returns whether an account was created. Nothing happens unless both
/// `auth.admin_email` and `auth.admin_password` are set.
pub async fn bootstrap_admin(db: &dyn QueryExecutor, cfg: &AuthConfig) -> anyhow::Result<bool> {
    let (Some(email), Some(password)) = (cfg.admin_email.as_deref(), cfg.admin_password.as_deref()) else {
        return Ok(false);
    };

    let existing = db.fetch_count("SELECT COUNT(*) FROM usuarios", &[]).await.map_err(db_context)?;
    if existing > 0 {
        tracing::debug!(existing, "Users present, skipping admin bootstrap");
        return Ok(false);
    }

    let email = validation::email("admin_email", email).map_err(|e| anyhow::anyhow!("{}", e))?;
    validation::password("admin_password", password).map_err(|e| anyhow::anyhow!("{}", e))?;
    let hash = hash_password_blocking(password.to_string()).await.map_err(|e| anyhow::anyhow!("{}", e))?;

    db.execute(
        "INSERT INTO usuarios (nombre, email, password_hash, rol, activo) VALUES ($1, $2, $3, $4, TRUE)",
        &[SqlParam::from("Administrador"), SqlParam::from(email.as_str()), SqlParam::from(hash), Rol::Admin.as_str().into()],
    )
    .await
    .map_err(db_context)?;

    tracing::info!(%email, "Bootstrap admin created");
    Ok(true)
}

fn db_context(e: DbError) -> anyhow::Error {
    anyhow::Error::new(e).context("admin bootstrap failed")
}
