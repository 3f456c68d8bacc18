//! Shared fixtures: a recording query executor and request helpers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request},
    response::Response,
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};

use crate::auth::Rol;
use crate::config::AppConfig;
use crate::db::{DbError, DbErrorKind, PoolStats, QueryExecutor, SqlParam};
use crate::middleware::auth::SELECT_SESSION;
use crate::routes;
use crate::state::AppState;

/// Records every statement with its bound values and answers from canned
/// data. Fails every call with `fail` when set.
///
/// Session lookups made by the auth middleware are answered from `users`
/// (active user id → role) and are neither recorded nor failed, so tests see
/// only the statements issued by the handler under test.
pub struct MockExecutor {
    calls: Mutex<Vec<(String, Vec<SqlParam>)>>,
    users: HashMap<i64, Rol>,
    rows: Vec<Value>,
    total: i64,
    affected: u64,
    fail: Option<DbErrorKind>,
}

impl Default for MockExecutor {
    fn default() -> Self {
        Self {
            calls: Mutex::default(),
            users: [(ADMIN_ID, Rol::Admin), (GUEST_ID, Rol::Invitado)].into_iter().collect(),
            rows: Vec::new(),
            total: 0,
            affected: 0,
            fail: None,
        }
    }
}

/// User ids [`token`] issues for each role.
pub const ADMIN_ID: i64 = 1;
pub const GUEST_ID: i64 = 2;

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the stored role of user `id`; `None` removes the user as if it
    /// had been deleted or deactivated.
    pub fn with_user(mut self, id: i64, rol: Option<Rol>) -> Self {
        match rol {
            Some(rol) => self.users.insert(id, rol),
            None => self.users.remove(&id),
        };
        self
    }

    pub fn with_rows(mut self, rows: Vec<Value>) -> Self {
        self.rows = rows;
        self
    }

    pub fn with_total(mut self, total: i64) -> Self {
        self.total = total;
        self
    }

    pub fn with_affected(mut self, affected: u64) -> Self {
        self.affected = affected;
        self
    }

    pub fn failing(mut self, kind: DbErrorKind) -> Self {
        self.fail = Some(kind);
        self
    }

    pub fn calls(&self) -> Vec<(String, Vec<SqlParam>)> {
        self.calls.lock().unwrap().clone()
    }

    /// The recorded call whose SQL starts with `prefix`.
    pub fn call_starting_with(&self, prefix: &str) -> (String, Vec<SqlParam>) {
        self.calls()
            .into_iter()
            .find(|(sql, _)| sql.starts_with(prefix))
            .unwrap_or_else(|| panic!("no call starting with {:?} in {:?}", prefix, self.calls()))
    }

    fn record(&self, sql: &str, params: &[SqlParam]) -> Result<(), DbError> {
        self.calls.lock().unwrap().push((sql.to_string(), params.to_vec()));
        match self.fail {
            Some(kind) => Err(DbError::new(kind, "relation \"secret_table\" exploded")),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl QueryExecutor for MockExecutor {
    async fn fetch_rows(&self, sql: &str, params: &[SqlParam]) -> Result<Vec<Value>, DbError> {
        if sql == SELECT_SESSION {
            let rol = match params {
                [SqlParam::Int(Some(id))] => self.users.get(id),
                _ => None,
            };
            return Ok(rol.map(|r| json!(r.as_str())).into_iter().collect());
        }
        self.record(sql, params)?;
        Ok(self.rows.clone())
    }

    async fn fetch_count(&self, sql: &str, params: &[SqlParam]) -> Result<i64, DbError> {
        self.record(sql, params)?;
        Ok(self.total)
    }

    async fn execute(&self, sql: &str, params: &[SqlParam]) -> Result<u64, DbError> {
        self.record(sql, params)?;
        Ok(self.affected)
    }

    async fn ping(&self) -> Result<(), DbError> {
        match self.fail {
            Some(kind) => Err(DbError::new(kind, "connection refused")),
            None => Ok(()),
        }
    }

    fn stats(&self) -> PoolStats {
        PoolStats { size: 2, idle: 1, waiting: 0 }
    }
}

pub fn app_with_config(db: Arc<MockExecutor>, config: AppConfig) -> (Router, AppState) {
    let state = AppState::new(db, config);
    (routes::router(state.clone()), state)
}

pub fn app(db: Arc<MockExecutor>) -> (Router, AppState) {
    app_with_config(db, AppConfig::default())
}

/// A token for the default admin (id 1) or guest (id 2).
pub fn token(state: &AppState, rol: Rol) -> String {
    let id = match rol {
        Rol::Admin => ADMIN_ID,
        Rol::Invitado => GUEST_ID,
    };
    state.jwt.issue(id, "admin@xonler.test", rol).unwrap()
}

/// A token claiming `rol` for an arbitrary user id.
pub fn token_for(state: &AppState, id: i64, rol: Rol) -> String {
    state.jwt.issue(id, "usuario@xonler.test", rol).unwrap()
}

pub fn request(method: Method, uri: &str, token: Option<&str>, body: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(t) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", t));
    }
    match body {
        Some(b) => builder.header(header::CONTENT_TYPE, "application/json").body(Body::from(b.to_string())).unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    request(Method::GET, uri, token, None)
}

pub async fn body_json(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_text(response: Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}
