use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::auth::Rol;
use crate::query::Paginacion;

/// Listing response: the current page plus pagination metadata.
#[derive(Debug, Clone, Serialize)]
pub struct Page {
    pub data: Vec<Value>,
    pub paginacion: Paginacion,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateBiblioteca {
    pub nombre: String,
    pub direccion: Option<String>,
    pub telefono: Option<String>,
    pub colegio_id: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateBiblioteca {
    pub nombre: Option<String>,
    pub direccion: Option<String>,
    pub telefono: Option<String>,
    pub colegio_id: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateLibro {
    pub titulo: String,
    pub autor: Option<String>,
    pub isbn: Option<String>,
    pub anio_publicacion: Option<i64>,
    pub biblioteca_id: i64,
    pub disponible: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateLibro {
    pub titulo: Option<String>,
    pub autor: Option<String>,
    pub isbn: Option<String>,
    pub anio_publicacion: Option<i64>,
    pub biblioteca_id: Option<i64>,
    pub disponible: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePrestamo {
    pub libro_id: i64,
    pub usuario_id: i64,
    pub fecha_prestamo: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePrestamo {
    pub fecha_prestamo: Option<NaiveDate>,
    pub fecha_devolucion: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateUsuario {
    pub nombre: String,
    pub email: String,
    pub password: String,
    pub rol: Option<Rol>,
    pub activo: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateUsuario {
    pub nombre: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub rol: Option<Rol>,
    pub activo: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub usuario: Value,
}
