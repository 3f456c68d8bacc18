use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{Datelike, Utc};
use serde_json::Value;

use crate::{
    db::SqlParam,
    error::{validation, AppError, AppResult, OptionExt},
    query::{param, Filter, FilterBuilder},
    routes::extract::{parse_id, JsonBody},
    routes::listing::{self, ListQuery},
    state::AppState,
    types::{CreateLibro, Page, UpdateLibro},
};

const NOT_FOUND: &str = "Libro no encontrado";
const ON_LOAN: &str = "El libro tiene un préstamo activo";

// Rows carry the owning library's name for display.
const LIST: ListQuery = ListQuery {
    projection: "to_jsonb(l) || jsonb_build_object('biblioteca_nombre', b.nombre)",
    from: "FROM libros l LEFT JOIN bibliotecas b ON b.id = l.biblioteca_id",
    order_by: "l.titulo, l.id",
};

const SELECT_ONE: &str = "SELECT to_jsonb(l) || jsonb_build_object('biblioteca_nombre', b.nombre) \
     FROM libros l LEFT JOIN bibliotecas b ON b.id = l.biblioteca_id WHERE l.id = $1";

const INSERT: &str = "INSERT INTO libros (titulo, autor, isbn, anio_publicacion, biblioteca_id, disponible) \
     VALUES ($1, $2, $3, $4, $5, COALESCE($6, TRUE)) RETURNING to_jsonb(libros)";

const UPDATE: &str = "UPDATE libros SET \
     titulo = COALESCE($2, titulo), \
     autor = COALESCE($3, autor), \
     isbn = COALESCE($4, isbn), \
     anio_publicacion = COALESCE($5, anio_publicacion), \
     biblioteca_id = COALESCE($6, biblioteca_id), \
     disponible = COALESCE($7, disponible) \
     WHERE id = $1 \
       AND ($7 IS NOT TRUE OR NOT EXISTS ( \
           SELECT 1 FROM prestamos p WHERE p.libro_id = libros.id AND p.fecha_devolucion IS NULL \
       )) \
     RETURNING to_jsonb(libros)";

const EXISTS: &str = "SELECT COUNT(*) FROM libros WHERE id = $1";

const DELETE: &str = "DELETE FROM libros WHERE id = $1";

/// `q` searches title, author and ISBN; `biblioteca_id` and `disponible`
/// match exactly.
pub fn build_filter(params: &HashMap<String, String>) -> AppResult<Filter> {
    let mut fb = FilterBuilder::new();
    fb.search(param(params, "q"), &["l.titulo", "l.autor", "l.isbn"]);
    fb.integer("biblioteca_id", param(params, "biblioteca_id"), "l.biblioteca_id")?;
    fb.boolean("disponible", param(params, "disponible"), "l.disponible")?;
    Ok(fb.build())
}

/// ISBN-10 or ISBN-13; hyphens and spaces are dropped, a trailing `X` is
/// allowed for ISBN-10.
fn isbn(value: Option<&str>) -> AppResult<Option<String>> {
    let Some(raw) = validation::optional_text("isbn", value)? else {
        return Ok(None);
    };
    let compact: String = raw.chars().filter(|c| !matches!(c, '-' | ' ')).collect::<String>().to_uppercase();
    let valid = compact.is_ascii()
        && match compact.len() {
            10 => {
                compact[..9].chars().all(|c| c.is_ascii_digit())
                    && compact[9..].chars().all(|c| c.is_ascii_digit() || c == 'X')
            }
            13 => compact.chars().all(|c| c.is_ascii_digit()),
            _ => false,
        };
    if !valid {
        return Err(AppError::validation("isbn", "ISBN inválido"));
    }
    Ok(Some(compact))
}

fn anio(value: Option<i64>) -> AppResult<Option<i64>> {
    let max = i64::from(Utc::now().year()) + 1;
    match value {
        Some(y) if !(1..=max).contains(&y) => {
            Err(AppError::validation("anio_publicacion", format!("El año debe estar entre 1 y {}", max)))
        }
        other => Ok(other),
    }
}

pub async fn list_libros(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> AppResult<Json<Page>> {
    let filter = build_filter(&params)?;
    listing::list(&state, &LIST, filter, &params, "Error listando libros").await
}

pub async fn get_libro(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<Json<Value>> {
    let id = parse_id(&id)?;
    let row = listing::fetch_one(&state, SELECT_ONE, &[id.into()], "Error obteniendo libro").await?;
    Ok(Json(row.ok_or_not_found(NOT_FOUND)?))
}

pub async fn create_libro(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<CreateLibro>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let params: [SqlParam; 6] = [
        validation::required_text("titulo", &req.titulo)?.into(),
        validation::optional_text("autor", req.autor.as_deref())?.into(),
        isbn(req.isbn.as_deref())?.into(),
        anio(req.anio_publicacion)?.into(),
        validation::positive_id("biblioteca_id", req.biblioteca_id)?.into(),
        req.disponible.into(),
    ];

    let failure = "Error creando libro";
    let row = listing::fetch_one(&state, INSERT, &params, failure)
        .await?
        .ok_or_else(|| AppError::Failure(failure.to_string()))?;
    tracing::info!(id = %row["id"], "Libro creado");
    Ok((StatusCode::CREATED, Json(row)))
}

pub async fn update_libro(
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<UpdateLibro>,
) -> AppResult<Json<Value>> {
    let id = parse_id(&id)?;
    let params: [SqlParam; 7] = [
        id.into(),
        req.titulo.as_deref().map(|v| validation::required_text("titulo", v)).transpose()?.into(),
        validation::optional_text("autor", req.autor.as_deref())?.into(),
        isbn(req.isbn.as_deref())?.into(),
        anio(req.anio_publicacion)?.into(),
        req.biblioteca_id.map(|v| validation::positive_id("biblioteca_id", v)).transpose()?.into(),
        req.disponible.into(),
    ];

    if let Some(row) = listing::fetch_one(&state, UPDATE, &params, "Error actualizando libro").await? {
        return Ok(Json(row));
    }

    // No row: either the book is gone or it was being marked available
    // while an active loan still holds it.
    let exists = state
        .db
        .fetch_count(EXISTS, &[SqlParam::from(id)])
        .await
        .map_err(|e| AppError::from_db(e, "Error actualizando libro"))?;
    if exists > 0 {
        Err(AppError::Conflict(ON_LOAN.to_string()))
    } else {
        Err(AppError::NotFound(NOT_FOUND.to_string()))
    }
}

pub async fn delete_libro(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<StatusCode> {
    let id = parse_id(&id)?;
    listing::delete_one(&state, DELETE, id, NOT_FOUND, "Error eliminando libro").await?;
    tracing::info!(id, "Libro eliminado");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_combines_search_and_flags() {
        let params: HashMap<String, String> = [("q", "borges"), ("biblioteca_id", "2"), ("disponible", "no")]
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let filter = build_filter(&params).unwrap();
        assert_eq!(
            filter.where_clause(),
            "WHERE (l.titulo ILIKE $1 OR l.autor ILIKE $1 OR l.isbn ILIKE $1) \
             AND l.biblioteca_id = $2 AND l.disponible = $3"
        );
        assert_eq!(filter.params()[2], SqlParam::from(false));
    }

    #[test]
    fn isbn_normalisation() {
        assert_eq!(isbn(Some("978-84-376-0494-7")).unwrap().as_deref(), Some("9788437604947"));
        assert_eq!(isbn(Some("0-306-40615-x")).unwrap().as_deref(), Some("030640615X"));
        assert_eq!(isbn(Some("  ")).unwrap(), None);
        assert!(isbn(Some("12345")).is_err());
        assert!(isbn(Some("97884X7604947")).is_err());
    }

    #[test]
    fn year_bounds() {
        assert_eq!(anio(Some(1605)).unwrap(), Some(1605));
        assert!(anio(Some(0)).is_err());
        assert!(anio(Some(99_999)).is_err());
        assert_eq!(anio(None).unwrap(), None);
    }
}
