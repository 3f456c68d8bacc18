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
    types::{CreateBiblioteca, Page, UpdateBiblioteca},
};

const NOT_FOUND: &str = "Biblioteca no encontrada";

const LIST: ListQuery = ListQuery { projection: "to_jsonb(b)", from: "FROM bibliotecas b", order_by: "b.nombre, b.id" };

const SELECT_ONE: &str = "SELECT to_jsonb(b) FROM bibliotecas b WHERE b.id = $1";

const INSERT: &str = "INSERT INTO bibliotecas (nombre, direccion, telefono, colegio_id) \
     VALUES ($1, $2, $3, $4) RETURNING to_jsonb(bibliotecas)";

const UPDATE: &str = "UPDATE bibliotecas SET \
     nombre = COALESCE($2, nombre), \
     direccion = COALESCE($3, direccion), \
     telefono = COALESCE($4, telefono), \
     colegio_id = COALESCE($5, colegio_id) \
     WHERE id = $1 RETURNING to_jsonb(bibliotecas)";

const DELETE: &str = "DELETE FROM bibliotecas WHERE id = $1";

/// `q` searches name and address; `colegio_id` matches exactly.
pub fn build_filter(params: &HashMap<String, String>) -> AppResult<Filter> {
    let mut fb = FilterBuilder::new();
    fb.search(param(params, "q"), &["b.nombre", "b.direccion"]);
    fb.integer("colegio_id", param(params, "colegio_id"), "b.colegio_id")?;
    Ok(fb.build())
}

pub async fn list_bibliotecas(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> AppResult<Json<Page>> {
    let filter = build_filter(&params)?;
    listing::list(&state, &LIST, filter, &params, "Error listando bibliotecas").await
}

pub async fn get_biblioteca(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<Json<Value>> {
    let id = parse_id(&id)?;
    let row = listing::fetch_one(&state, SELECT_ONE, &[id.into()], "Error obteniendo biblioteca").await?;
    Ok(Json(row.ok_or_not_found(NOT_FOUND)?))
}

pub async fn create_biblioteca(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<CreateBiblioteca>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let params: [SqlParam; 4] = [
        validation::required_text("nombre", &req.nombre)?.into(),
        validation::optional_text("direccion", req.direccion.as_deref())?.into(),
        validation::optional_text("telefono", req.telefono.as_deref())?.into(),
        req.colegio_id.map(|v| validation::positive_id("colegio_id", v)).transpose()?.into(),
    ];

    let failure = "Error creando biblioteca";
    let row = listing::fetch_one(&state, INSERT, &params, failure)
        .await?
        .ok_or_else(|| AppError::Failure(failure.to_string()))?;
    tracing::info!(id = %row["id"], "Biblioteca creada");
    Ok((StatusCode::CREATED, Json(row)))
}

pub async fn update_biblioteca(
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<UpdateBiblioteca>,
) -> AppResult<Json<Value>> {
    let id = parse_id(&id)?;
    let params: [SqlParam; 5] = [
        id.into(),
        req.nombre.as_deref().map(|v| validation::required_text("nombre", v)).transpose()?.into(),
        validation::optional_text("direccion", req.direccion.as_deref())?.into(),
        validation::optional_text("telefono", req.telefono.as_deref())?.into(),
        req.colegio_id.map(|v| validation::positive_id("colegio_id", v)).transpose()?.into(),
    ];

    let row = listing::fetch_one(&state, UPDATE, &params, "Error actualizando biblioteca").await?;
    Ok(Json(row.ok_or_not_found(NOT_FOUND)?))
}

pub async fn delete_biblioteca(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<StatusCode> {
    let id = parse_id(&id)?;
    listing::delete_one(&state, DELETE, id, NOT_FOUND, "Error eliminando biblioteca").await?;
    tracing::info!(id, "Biblioteca eliminada");
    Ok(StatusCode::NO_CONTENT)
}
