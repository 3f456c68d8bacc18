#[cfg(test)]
mod tests {
    use crate::db::{DbError, DbErrorKind};
    use crate::error::{validation, AppError, AppResult, OptionExt};
    use crate::tests::support::body_json;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;

    #[test]
    fn test_app_error_display() {
        let error = AppError::BadRequest("Entrada inválida".to_string());
        assert_eq!(format!("{}", error), "Bad request: Entrada inválida");

        let error = AppError::NotFound("Libro no encontrado".to_string());
        assert_eq!(format!("{}", error), "Not found: Libro no encontrado");

        let error = AppError::RateLimited { retry_after_seconds: 60 };
        assert_eq!(format!("{}", error), "Rate limited. Retry after 60 seconds");
    }

    #[test]
    fn test_app_error_status_codes() {
        let cases = [
            (AppError::BadRequest("x".into()), StatusCode::BAD_REQUEST),
            (AppError::InvalidReference("x".into()), StatusCode::BAD_REQUEST),
            (AppError::validation("f", "x"), StatusCode::BAD_REQUEST),
            (AppError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED),
            (AppError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (AppError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (AppError::Conflict("x".into()), StatusCode::CONFLICT),
            (AppError::RateLimited { retry_after_seconds: 30 }, StatusCode::TOO_MANY_REQUESTS),
            (AppError::Failure("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (AppError::ServiceUnavailable("x".into()), StatusCode::SERVICE_UNAVAILABLE),
        ];
        for (error, status) in cases {
            assert_eq!(error.into_response().status(), status);
        }
    }

    #[test]
    fn test_db_errors_map_to_taxonomy() {
        let failure = "Error creando libro";

        match AppError::from_db(DbError::new(DbErrorKind::UniqueViolation, "dup"), failure) {
            AppError::Conflict(msg) => assert_eq!(msg, "Ya existe un registro con esos datos"),
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            AppError::from_db(DbError::new(DbErrorKind::ForeignKeyViolation, "fk"), failure),
            AppError::InvalidReference(_)
        ));
        match AppError::from_db(DbError::new(DbErrorKind::InvalidData, "check"), failure) {
            AppError::BadRequest(msg) => assert_eq!(msg, "Datos inválidos"),
            other => panic!("unexpected {:?}", other),
        }
        match AppError::from_db(DbError::other("pool timed out"), failure) {
            AppError::Failure(msg) => assert_eq!(msg, failure),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_sqlstate_classification() {
        assert_eq!(DbErrorKind::from_sqlstate("23505"), DbErrorKind::UniqueViolation);
        assert_eq!(DbErrorKind::from_sqlstate("23503"), DbErrorKind::ForeignKeyViolation);
        assert_eq!(DbErrorKind::from_sqlstate("23514"), DbErrorKind::InvalidData);
        assert_eq!(DbErrorKind::from_sqlstate("22P02"), DbErrorKind::InvalidData);
        assert_eq!(DbErrorKind::from_sqlstate("40001"), DbErrorKind::Other);
    }

    #[tokio::test]
    async fn test_error_body_shape() {
        let body = body_json(AppError::validation("email", "Correo electrónico inválido").into_response()).await;
        assert_eq!(body["error"], "Correo electrónico inválido");
        assert_eq!(body["code"], "VALIDATION_ERROR");
        assert_eq!(body["field"], "email");

        let body = body_json(AppError::RateLimited { retry_after_seconds: 12 }.into_response()).await;
        assert_eq!(body["code"], "RATE_LIMITED");
        assert_eq!(body["retry_after_seconds"], 12);
    }

    #[tokio::test]
    async fn test_internal_error_hides_cause() {
        let error = AppError::from(anyhow::anyhow!("password=hunter2 leaked"));
        let body = body_json(error.into_response()).await;
        assert_eq!(body["code"], "INTERNAL_ERROR");
        assert!(body["error_id"].as_str().is_some());
        assert!(!body.to_string().contains("hunter2"));
    }

    #[test]
    fn test_option_ext() {
        let found: AppResult<i32> = Some(42).ok_or_not_found("Libro no encontrado");
        assert_eq!(found.unwrap(), 42);

        let missing: AppResult<i32> = None.ok_or_not_found("Libro no encontrado");
        match missing.unwrap_err() {
            AppError::NotFound(msg) => assert_eq!(msg, "Libro no encontrado"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_required_text() {
        assert_eq!(validation::required_text("nombre", "  Central  ").unwrap(), "Central");
        assert!(validation::required_text("nombre", "   ").is_err());
        assert!(validation::required_text("nombre", &"a".repeat(256)).is_err());
        assert!(validation::required_text("nombre", "a\0b").is_err());
        assert_eq!(validation::optional_text("direccion", Some(" ")).unwrap(), None);
    }

    #[test]
    fn test_email_and_password() {
        assert_eq!(validation::email("email", "Ada@Xonler.Test").unwrap(), "ada@xonler.test");
        assert!(validation::email("email", "sin-arroba").is_err());
        assert!(validation::email("email", "a@dominio").is_err());
        assert!(validation::email("email", "a b@x.io").is_err());

        assert!(validation::password("password", "1234567").is_err());
        assert!(validation::password("password", "12345678").is_ok());
        assert!(validation::password("password", &"x".repeat(129)).is_err());
    }

    #[test]
    fn test_positive_id() {
        match validation::positive_id("libro_id", 0).unwrap_err() {
            AppError::ValidationError { field, .. } => assert_eq!(field, "libro_id"),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(validation::positive_id("libro_id", 3).unwrap(), 3);
    }
}
