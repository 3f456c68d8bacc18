use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;

use super::error::DbError;

/// A value bound to a `$n` placeholder.
///
/// Every variant carries an `Option` so that SQL `NULL` is still sent with a
/// concrete Postgres type (an untyped text `NULL` would not coerce into an
/// integer or date column).
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Text(Option<String>),
    Int(Option<i64>),
    Bool(Option<bool>),
    Date(Option<NaiveDate>),
}

impl From<&str> for SqlParam {
    fn from(v: &str) -> Self {
        SqlParam::Text(Some(v.to_string()))
    }
}

impl From<String> for SqlParam {
    fn from(v: String) -> Self {
        SqlParam::Text(Some(v))
    }
}

impl From<Option<String>> for SqlParam {
    fn from(v: Option<String>) -> Self {
        SqlParam::Text(v)
    }
}

impl From<i64> for SqlParam {
    fn from(v: i64) -> Self {
        SqlParam::Int(Some(v))
    }
}

impl From<Option<i64>> for SqlParam {
    fn from(v: Option<i64>) -> Self {
        SqlParam::Int(v)
    }
}

impl From<bool> for SqlParam {
    fn from(v: bool) -> Self {
        SqlParam::Bool(Some(v))
    }
}

impl From<Option<bool>> for SqlParam {
    fn from(v: Option<bool>) -> Self {
        SqlParam::Bool(v)
    }
}

impl From<NaiveDate> for SqlParam {
    fn from(v: NaiveDate) -> Self {
        SqlParam::Date(Some(v))
    }
}

impl From<Option<NaiveDate>> for SqlParam {
    fn from(v: Option<NaiveDate>) -> Self {
        SqlParam::Date(v)
    }
}

/// Connection pool occupancy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    /// Open connections, idle or in use.
    pub size: u32,
    pub idle: usize,
    /// Tasks currently blocked waiting for a connection.
    pub waiting: usize,
}

/// Query capability shared by all handlers.
///
/// Row-returning statements must yield exactly one `jsonb` column per row
/// (e.g. `SELECT to_jsonb(b) FROM bibliotecas b` or
/// `... RETURNING to_jsonb(libros)`), which keeps handlers independent from
/// per-table row types.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Runs a row-returning statement.
    async fn fetch_rows(&self, sql: &str, params: &[SqlParam]) -> Result<Vec<Value>, DbError>;

    /// Runs a statement whose single row holds a single `bigint` (`COUNT(*)`).
    async fn fetch_count(&self, sql: &str, params: &[SqlParam]) -> Result<i64, DbError>;

    /// Runs a statement without result rows, returning the affected row count.
    async fn execute(&self, sql: &str, params: &[SqlParam]) -> Result<u64, DbError>;

    /// Cheap round trip to check connectivity.
    async fn ping(&self) -> Result<(), DbError>;

    fn stats(&self) -> PoolStats;

    async fn fetch_optional(&self, sql: &str, params: &[SqlParam]) -> Result<Option<Value>, DbError> {
        Ok(self.fetch_rows(sql, params).await?.into_iter().next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversions_keep_types_for_nulls() {
        assert_eq!(SqlParam::from(None::<i64>), SqlParam::Int(None));
        assert_eq!(SqlParam::from(None::<String>), SqlParam::Text(None));
        assert_eq!(SqlParam::from("x"), SqlParam::Text(Some("x".into())));
        assert_eq!(SqlParam::from(7_i64), SqlParam::Int(Some(7)));
        assert_eq!(SqlParam::from(true), SqlParam::Bool(Some(true)));
    }
}
