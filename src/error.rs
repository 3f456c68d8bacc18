use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::error::Error;
use std::fmt;

use crate::db::{DbError, DbErrorKind};

pub const MSG_DUPLICATE: &str = "Ya existe un registro con esos datos";
pub const MSG_INVALID_REFERENCE: &str = "Referencia inválida a un registro relacionado";
pub const MSG_INVALID_DATA: &str = "Datos inválidos";
pub const MSG_INVALID_JSON: &str = "JSON inválido";
pub const MSG_ROUTE_NOT_FOUND: &str = "Ruta no encontrada";

/// The primary error type for the application.
///
/// Every handler returns this type; its [`IntoResponse`] impl produces the
/// uniform `{ "error": ..., "code": ... }` body.
#[derive(Debug)]
pub enum AppError {
    /// Unexpected failures. Logged with a generated id, body stays generic.
    Internal(anyhow::Error),
    /// A backend failure whose cause has already been logged. Carries the
    /// fixed, operation-specific message shown to the client.
    Failure(String),
    BadRequest(String),
    /// A write referenced a row that does not exist.
    InvalidReference(String),
    NotFound(String),
    Conflict(String),
    ServiceUnavailable(String),
    /// Missing, malformed or expired credentials.
    Unauthorized(String),
    /// Authenticated, but the role does not allow the operation.
    Forbidden(String),
    RateLimited {
        retry_after_seconds: u64,
    },
    ValidationError {
        field: String,
        message: String,
    },
}

impl AppError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::ValidationError { field: field.into(), message: message.into() }
    }

    /// Maps a classified database failure to the response taxonomy.
    ///
    /// `failure` is the fixed message used when the failure is not a known
    /// constraint violation, e.g. `"Error listando bibliotecas"`.
    pub fn from_db(err: DbError, failure: &str) -> Self {
        match err.kind {
            DbErrorKind::UniqueViolation => {
                tracing::warn!(error = %err, "{}: duplicate", failure);
                AppError::Conflict(MSG_DUPLICATE.to_string())
            }
            DbErrorKind::ForeignKeyViolation => {
                tracing::warn!(error = %err, "{}: invalid reference", failure);
                AppError::InvalidReference(MSG_INVALID_REFERENCE.to_string())
            }
            DbErrorKind::InvalidData => {
                tracing::warn!(error = %err, "{}: invalid data", failure);
                AppError::BadRequest(MSG_INVALID_DATA.to_string())
            }
            DbErrorKind::Other => {
                tracing::error!(error = %err, "{}", failure);
                AppError::Failure(failure.to_string())
            }
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Internal(_) | AppError::Failure(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BadRequest(_) | AppError::InvalidReference(_) | AppError::ValidationError { .. } => {
                StatusCode::BAD_REQUEST
            }
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Internal(e) => write!(f, "Internal error: {}", e),
            AppError::Failure(msg) => write!(f, "Failure: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::InvalidReference(msg) => write!(f, "Invalid reference: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            AppError::ServiceUnavailable(msg) => write!(f, "Service unavailable: {}", msg),
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AppError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            AppError::RateLimited { retry_after_seconds } => {
                write!(f, "Rate limited. Retry after {} seconds", retry_after_seconds)
            }
            AppError::ValidationError { field, message } => {
                write!(f, "Validation error on field '{}': {}", field, message)
            }
        }
    }
}

impl Error for AppError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            AppError::Internal(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (code, message, extra) = match self {
            AppError::Internal(e) => {
                let error_id = uuid::Uuid::new_v4();
                tracing::error!(%error_id, "Internal error: {:?}", e);
                (
                    "INTERNAL_ERROR",
                    "Error interno del servidor".to_string(),
                    Some(("error_id", json!(error_id.to_string()))),
                )
            }
            AppError::Failure(msg) => ("SERVER_ERROR", msg, None),
            AppError::BadRequest(msg) => ("BAD_REQUEST", msg, None),
            AppError::InvalidReference(msg) => ("INVALID_REFERENCE", msg, None),
            AppError::NotFound(msg) => ("NOT_FOUND", msg, None),
            AppError::Conflict(msg) => ("CONFLICT", msg, None),
            AppError::ServiceUnavailable(msg) => ("SERVICE_UNAVAILABLE", msg, None),
            AppError::Unauthorized(msg) => ("UNAUTHORIZED", msg, None),
            AppError::Forbidden(msg) => ("FORBIDDEN", msg, None),
            AppError::RateLimited { retry_after_seconds } => (
                "RATE_LIMITED",
                format!("Demasiadas solicitudes. Reintente en {} segundos", retry_after_seconds),
                Some(("retry_after_seconds", json!(retry_after_seconds))),
            ),
            AppError::ValidationError { field, message } => {
                ("VALIDATION_ERROR", message, Some(("field", json!(field))))
            }
        };

        let mut body = json!({
            "error": message,
            "code": code,
        });
        if let Some((key, value)) = extra {
            body[key] = value;
        }

        (status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err)
    }
}

/// A type alias for `Result<T, AppError>`, used throughout the application.
pub type AppResult<T> = Result<T, AppError>;

/// Converts a missing row into a `NotFound` error with a fixed message.
pub trait OptionExt<T> {
    fn ok_or_not_found(self, message: &str) -> AppResult<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_not_found(self, message: &str) -> AppResult<T> {
        self.ok_or_else(|| AppError::NotFound(message.to_string()))
    }
}

/// Field checks for request bodies.
pub mod validation {
    use super::*;

    pub const MAX_TEXT_LEN: usize = 255;

    /// Trims `value` and rejects blank or overlong text.
    pub fn required_text(field: &str, value: &str) -> AppResult<String> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(AppError::validation(field, format!("El campo '{}' es obligatorio", field)));
        }
        if trimmed.chars().count() > MAX_TEXT_LEN {
            return Err(AppError::validation(
                field,
                format!("El campo '{}' supera {} caracteres", field, MAX_TEXT_LEN),
            ));
        }
        if trimmed.contains('\0') {
            return Err(AppError::validation(field, format!("El campo '{}' contiene caracteres inválidos", field)));
        }
        Ok(trimmed.to_string())
    }

    /// Like [`required_text`] but for optional fields. Blank becomes `None`.
    pub fn optional_text(field: &str, value: Option<&str>) -> AppResult<Option<String>> {
        match value.map(str::trim) {
            None | Some("") => Ok(None),
            Some(v) => required_text(field, v).map(Some),
        }
    }

    pub fn positive_id(field: &str, value: i64) -> AppResult<i64> {
        if value <= 0 {
            return Err(AppError::validation(field, format!("El campo '{}' debe ser un entero positivo", field)));
        }
        Ok(value)
    }

    pub fn email(field: &str, value: &str) -> AppResult<String> {
        let v = required_text(field, value)?.to_lowercase();
        let valid = match v.split_once('@') {
            Some((local, domain)) => {
                !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
            }
            None => false,
        };
        if !valid || v.contains(char::is_whitespace) {
            return Err(AppError::validation(field, "Correo electrónico inválido"));
        }
        Ok(v)
    }

    pub fn password(field: &str, value: &str) -> AppResult<()> {
        let len = value.chars().count();
        if len < 8 {
            return Err(AppError::validation(field, "La contraseña debe tener al menos 8 caracteres"));
        }
        if len > 128 {
            return Err(AppError::validation(field, "La contraseña es demasiado larga"));
        }
        Ok(())
    }
}
