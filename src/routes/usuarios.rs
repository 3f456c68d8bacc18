//! User administration. Every route here sits behind the admin check, and no
//! response ever includes `password_hash`.

use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde_json::Value;

use crate::{
    auth::{hash_password_blocking, AuthUser, Rol},
    db::SqlParam,
    error::{validation, AppError, AppResult, OptionExt},
    query::{param, Filter, FilterBuilder},
    routes::extract::{parse_id, JsonBody},
    routes::listing::{self, ListQuery},
    state::AppState,
    types::{CreateUsuario, Page, UpdateUsuario},
};

const NOT_FOUND: &str = "Usuario no encontrado";

const LIST: ListQuery =
    ListQuery { projection: "to_jsonb(u) - 'password_hash'", from: "FROM usuarios u", order_by: "u.nombre, u.id" };

const SELECT_ONE: &str = "SELECT to_jsonb(u) - 'password_hash' FROM usuarios u WHERE u.id = $1";

const INSERT: &str = "INSERT INTO usuarios (nombre, email, password_hash, rol, activo) \
     VALUES ($1, $2, $3, $4, COALESCE($5, TRUE)) RETURNING to_jsonb(usuarios) - 'password_hash'";

const UPDATE: &str = "UPDATE usuarios SET \
     nombre = COALESCE($2, nombre), \
     email = COALESCE($3, email), \
     password_hash = COALESCE($4, password_hash), \
     rol = COALESCE($5, rol), \
     activo = COALESCE($6, activo) \
     WHERE id = $1 RETURNING to_jsonb(usuarios) - 'password_hash'";

const DELETE: &str = "DELETE FROM usuarios WHERE id = $1";

/// `q` searches name and email; `rol` and `activo` match exactly.
pub fn build_filter(params: &HashMap<String, String>) -> AppResult<Filter> {
    let mut fb = FilterBuilder::new();
    fb.search(param(params, "q"), &["u.nombre", "u.email"]);
    fb.one_of("rol", param(params, "rol"), "u.rol", Rol::ALL)?;
    fb.boolean("activo", param(params, "activo"), "u.activo")?;
    Ok(fb.build())
}

pub async fn list_usuarios(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> AppResult<Json<Page>> {
    let filter = build_filter(&params)?;
    listing::list(&state, &LIST, filter, &params, "Error listando usuarios").await
}

pub async fn get_usuario(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<Json<Value>> {
    let id = parse_id(&id)?;
    let row = listing::fetch_one(&state, SELECT_ONE, &[id.into()], "Error obteniendo usuario").await?;
    Ok(Json(row.ok_or_not_found(NOT_FOUND)?))
}

pub async fn create_usuario(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<CreateUsuario>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let nombre = validation::required_text("nombre", &req.nombre)?;
    let email = validation::email("email", &req.email)?;
    validation::password("password", &req.password)?;
    let hash = hash_password_blocking(req.password).await?;
    let rol = req.rol.unwrap_or(Rol::Invitado);

    let params: [SqlParam; 5] = [nombre.into(), email.into(), hash.into(), rol.as_str().into(), req.activo.into()];
    let failure = "Error creando usuario";
    let row = listing::fetch_one(&state, INSERT, &params, failure)
        .await?
        .ok_or_else(|| AppError::Failure(failure.to_string()))?;
    tracing::info!(id = %row["id"], rol = rol.as_str(), "Usuario creado");
    Ok((StatusCode::CREATED, Json(row)))
}

pub async fn update_usuario(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<UpdateUsuario>,
) -> AppResult<Json<Value>> {
    let id = parse_id(&id)?;
    if id == caller.id && (req.rol == Some(Rol::Invitado) || req.activo == Some(false)) {
        return Err(AppError::Conflict("No puede retirarse sus propios permisos".to_string()));
    }

    let nombre = req.nombre.as_deref().map(|v| validation::required_text("nombre", v)).transpose()?;
    let email = req.email.as_deref().map(|v| validation::email("email", v)).transpose()?;
    let hash = match req.password {
        Some(pw) => {
            validation::password("password", &pw)?;
            Some(hash_password_blocking(pw).await?)
        }
        None => None,
    };

    let params: [SqlParam; 6] = [
        id.into(),
        nombre.into(),
        email.into(),
        hash.into(),
        req.rol.map(|r| r.as_str().to_string()).into(),
        req.activo.into(),
    ];
    let row = listing::fetch_one(&state, UPDATE, &params, "Error actualizando usuario").await?;
    Ok(Json(row.ok_or_not_found(NOT_FOUND)?))
}

pub async fn delete_usuario(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    let id = parse_id(&id)?;
    if id == caller.id {
        return Err(AppError::Conflict("No puede eliminar su propio usuario".to_string()));
    }
    listing::delete_one(&state, DELETE, id, NOT_FOUND, "Error eliminando usuario").await?;
    tracing::info!(id, by = caller.id, "Usuario eliminado");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_filter_is_restricted() {
        let params: HashMap<String, String> = [("rol".to_string(), "superuser".to_string())].into();
        assert!(build_filter(&params).is_err());

        let params: HashMap<String, String> =
            [("rol".to_string(), "invitado".to_string()), ("activo".to_string(), "sí".to_string())].into();
        let filter = build_filter(&params).unwrap();
        assert_eq!(filter.where_clause(), "WHERE u.rol = $1 AND u.activo = $2");
        assert_eq!(filter.params(), &[SqlParam::from("invitado"), SqlParam::from(true)]);
    }

    #[test]
    fn projection_strips_the_hash() {
        assert!(LIST.projection.contains("- 'password_hash'"));
        assert!(INSERT.ends_with("- 'password_hash'"));
        assert!(UPDATE.ends_with("- 'password_hash'"));
    }
}
