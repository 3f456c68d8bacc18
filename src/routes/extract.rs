//! Request extractors that reject with the application's JSON error shape.

use axum::{
    extract::{rejection::JsonRejection, FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;

use crate::error::{AppError, AppResult, MSG_INVALID_JSON};

/// `Json<T>` whose rejections (bad syntax, wrong types, missing
/// content type) become a 400 with the standard error body.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(JsonBody(value)),
            Err(rejection) => {
                tracing::debug!("Rejected request body: {}", rejection.body_text());
                Err(match rejection {
                    JsonRejection::MissingJsonContentType(_) => {
                        AppError::BadRequest("Se esperaba Content-Type: application/json".to_string())
                    }
                    _ => AppError::BadRequest(MSG_INVALID_JSON.to_string()),
                })
            }
        }
    }
}

/// Parses a path id, rejecting anything but a positive integer.
pub fn parse_id(raw: &str) -> AppResult<i64> {
    match raw.trim().parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(AppError::validation("id", "El identificador debe ser un entero positivo")),
    }
}
