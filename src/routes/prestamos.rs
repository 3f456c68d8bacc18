use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::Value;

use crate::{
    db::SqlParam,
    error::{validation, AppError, AppResult, OptionExt},
    query::{param, Filter, FilterBuilder},
    routes::extract::{parse_id, JsonBody},
    routes::listing::{self, ListQuery},
    state::AppState,
    types::{CreatePrestamo, Page, UpdatePrestamo},
};

const NOT_FOUND: &str = "Préstamo no encontrado";
const NOT_AVAILABLE: &str = "El libro no está disponible para préstamo";

const LIST: ListQuery = ListQuery {
    projection: "to_jsonb(p) || jsonb_build_object('libro_titulo', l.titulo, 'usuario_nombre', u.nombre)",
    from: "FROM prestamos p JOIN libros l ON l.id = p.libro_id JOIN usuarios u ON u.id = p.usuario_id",
    order_by: "p.fecha_prestamo DESC, p.id DESC",
};

const SELECT_ONE: &str = "SELECT to_jsonb(p) || jsonb_build_object('libro_titulo', l.titulo, 'usuario_nombre', u.nombre) \
     FROM prestamos p JOIN libros l ON l.id = p.libro_id JOIN usuarios u ON u.id = p.usuario_id \
     WHERE p.id = $1";

// Claiming the book and inserting the loan is one statement: no row comes
// back when the book is missing or already lent.
const INSERT: &str = "WITH libro AS ( \
         UPDATE libros SET disponible = FALSE WHERE id = $1 AND disponible RETURNING id \
     ) \
     INSERT INTO prestamos (libro_id, usuario_id, fecha_prestamo) \
     SELECT libro.id, $2, COALESCE($3, CURRENT_DATE) FROM libro \
     RETURNING to_jsonb(prestamos)";

// Setting a return date releases the book unless another active loan holds it.
const UPDATE: &str = "WITH upd AS ( \
         UPDATE prestamos SET \
             fecha_prestamo = COALESCE($2, fecha_prestamo), \
             fecha_devolucion = COALESCE($3, fecha_devolucion) \
         WHERE id = $1 RETURNING * \
     ), libro AS ( \
         UPDATE libros SET disponible = TRUE \
         WHERE $3::date IS NOT NULL \
           AND id IN (SELECT libro_id FROM upd) \
           AND NOT EXISTS ( \
               SELECT 1 FROM prestamos o \
               WHERE o.libro_id = libros.id AND o.fecha_devolucion IS NULL AND o.id <> $1 \
           ) \
     ) \
     SELECT to_jsonb(upd) FROM upd";

const RETURN: &str = "WITH devuelto AS ( \
         UPDATE prestamos SET fecha_devolucion = CURRENT_DATE \
         WHERE id = $1 AND fecha_devolucion IS NULL RETURNING * \
     ), libro AS ( \
         UPDATE libros SET disponible = TRUE WHERE id IN (SELECT libro_id FROM devuelto) \
     ) \
     SELECT to_jsonb(devuelto) FROM devuelto";

// Deleting an active loan frees its book.
const DELETE: &str = "WITH borrado AS ( \
         DELETE FROM prestamos WHERE id = $1 RETURNING * \
     ), libro AS ( \
         UPDATE libros SET disponible = TRUE \
         WHERE id IN (SELECT libro_id FROM borrado WHERE fecha_devolucion IS NULL) \
     ) \
     SELECT to_jsonb(borrado) FROM borrado";

/// Loan listing filters. `activo=true` selects loans without a return date;
/// `fecha_desde`/`fecha_hasta` bound the loan date inclusively.
pub fn build_filter(params: &HashMap<String, String>) -> AppResult<Filter> {
    let mut fb = FilterBuilder::new();
    fb.search(param(params, "q"), &["l.titulo", "u.nombre"]);
    fb.integer("libro_id", param(params, "libro_id"), "p.libro_id")?;
    fb.integer("usuario_id", param(params, "usuario_id"), "p.usuario_id")?;
    fb.null_flag("activo", param(params, "activo"), "p.fecha_devolucion")?;
    fb.date_range(
        ("fecha_desde", param(params, "fecha_desde")),
        ("fecha_hasta", param(params, "fecha_hasta")),
        "p.fecha_prestamo",
    )?;
    Ok(fb.build())
}

pub async fn list_prestamos(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> AppResult<Json<Page>> {
    let filter = build_filter(&params)?;
    listing::list(&state, &LIST, filter, &params, "Error listando prestamos").await
}

pub async fn get_prestamo(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<Json<Value>> {
    let id = parse_id(&id)?;
    let row = listing::fetch_one(&state, SELECT_ONE, &[id.into()], "Error obteniendo préstamo").await?;
    Ok(Json(row.ok_or_not_found(NOT_FOUND)?))
}

pub async fn create_prestamo(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<CreatePrestamo>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let libro_id = validation::positive_id("libro_id", req.libro_id)?;
    let params: [SqlParam; 3] =
        [libro_id.into(), validation::positive_id("usuario_id", req.usuario_id)?.into(), req.fecha_prestamo.into()];

    let row = listing::fetch_one(&state, INSERT, &params, "Error creando préstamo").await?.ok_or_else(|| {
        tracing::info!(libro_id, "Loan refused, book unavailable");
        AppError::Conflict(NOT_AVAILABLE.to_string())
    })?;
    tracing::info!(id = %row["id"], libro_id, "Préstamo creado");
    Ok((StatusCode::CREATED, Json(row)))
}

pub async fn update_prestamo(
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<UpdatePrestamo>,
) -> AppResult<Json<Value>> {
    let id = parse_id(&id)?;
    if let (Some(desde), Some(hasta)) = (req.fecha_prestamo, req.fecha_devolucion) {
        if hasta < desde {
            return Err(AppError::validation(
                "fecha_devolucion",
                "La fecha de devolución no puede ser anterior a la del préstamo",
            ));
        }
    }
    let params: [SqlParam; 3] = [id.into(), req.fecha_prestamo.into(), req.fecha_devolucion.into()];

    let row = listing::fetch_one(&state, UPDATE, &params, "Error actualizando préstamo").await?;
    Ok(Json(row.ok_or_not_found(NOT_FOUND)?))
}

/// Marks an active loan as returned today and frees the book.
pub async fn devolver_prestamo(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<Json<Value>> {
    let id = parse_id(&id)?;
    let row = listing::fetch_one(&state, RETURN, &[id.into()], "Error registrando devolución").await?;
    let row = row.ok_or_not_found("Préstamo no encontrado o ya devuelto")?;
    tracing::info!(id, "Préstamo devuelto");
    Ok(Json(row))
}

pub async fn delete_prestamo(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<StatusCode> {
    let id = parse_id(&id)?;
    listing::fetch_one(&state, DELETE, &[id.into()], "Error eliminando préstamo").await?.ok_or_not_found(NOT_FOUND)?;
    tracing::info!(id, "Préstamo eliminado");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn q(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn returned_loans_filter() {
        let filter = build_filter(&q(&[("activo", "false")])).unwrap();
        assert_eq!(filter.where_clause(), "WHERE p.fecha_devolucion IS NOT NULL");
        assert!(filter.params().is_empty());
    }

    #[test]
    fn date_window_on_loan_date() {
        let filter = build_filter(&q(&[("fecha_desde", "2024-01-01"), ("fecha_hasta", "2024-01-31")])).unwrap();
        assert_eq!(filter.where_clause(), "WHERE p.fecha_prestamo >= $1 AND p.fecha_prestamo <= $2");
        assert_eq!(filter.params()[0], SqlParam::from(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()));
    }

    #[test]
    fn search_spans_book_and_borrower() {
        let filter = build_filter(&q(&[("q", "ana"), ("usuario_id", "3")])).unwrap();
        assert_eq!(filter.where_clause(), "WHERE (l.titulo ILIKE $1 OR u.nombre ILIKE $1) AND p.usuario_id = $2");
    }

    #[test]
    fn bad_flag_names_the_field() {
        match build_filter(&q(&[("activo", "quizas")])) {
            Err(AppError::ValidationError { field, .. }) => assert_eq!(field, "activo"),
            other => panic!("unexpected {:?}", other.map(|f| f.where_clause())),
        }
    }
}
