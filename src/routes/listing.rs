//! Shared plumbing for entity handlers: paged listing and single-row fetches.

use std::collections::HashMap;

use axum::Json;
use serde_json::Value;

use crate::db::{DbError, QueryExecutor, SqlParam};
use crate::error::{AppError, AppResult};
use crate::query::{Filter, Paginacion, Pagination};
use crate::state::AppState;
use crate::types::Page;

/// Static shape of a listing query. Only the filter varies per request.
#[derive(Debug, Clone, Copy)]
pub struct ListQuery {
    /// Expression producing one `jsonb` value per row.
    pub projection: &'static str,
    /// `FROM` clause including joins.
    pub from: &'static str,
    pub order_by: &'static str,
}

impl ListQuery {
    /// Page query. LIMIT/OFFSET take the two placeholders after the filter's.
    pub fn data_sql(&self, filter: &Filter) -> String {
        let n = filter.next_placeholder();
        join_sql(&[
            &format!("SELECT {}", self.projection),
            self.from,
            &filter.where_clause(),
            &format!("ORDER BY {}", self.order_by),
            &format!("LIMIT ${} OFFSET ${}", n, n + 1),
        ])
    }

    /// Total query over the same filtered set.
    pub fn count_sql(&self, filter: &Filter) -> String {
        join_sql(&["SELECT COUNT(*)", self.from, &filter.where_clause()])
    }
}

fn join_sql(parts: &[&str]) -> String {
    parts.iter().filter(|p| !p.is_empty()).copied().collect::<Vec<_>>().join(" ")
}

/// Runs the page and count queries concurrently.
///
/// Both receive the same WHERE clause and the same filter values; the page
/// query additionally binds limit and offset.
pub async fn fetch_page(
    db: &dyn QueryExecutor,
    query: &ListQuery,
    filter: &Filter,
    page: Pagination,
) -> Result<Page, DbError> {
    let data_sql = query.data_sql(filter);
    let count_sql = query.count_sql(filter);

    let mut data_params = filter.params().to_vec();
    data_params.push(SqlParam::from(page.limit));
    data_params.push(SqlParam::from(page.offset));

    let (rows, total) =
        tokio::try_join!(db.fetch_rows(&data_sql, &data_params), db.fetch_count(&count_sql, filter.params()))?;

    Ok(Page { data: rows, paginacion: Paginacion { total, limit: page.limit, offset: page.offset } })
}

/// Listing handler body: clamps pagination, fetches, maps failures.
pub async fn list(
    state: &AppState,
    query: &ListQuery,
    filter: Filter,
    params: &HashMap<String, String>,
    failure: &str,
) -> AppResult<Json<Page>> {
    let page = Pagination::from_query(params, &state.config.pagination);
    fetch_page(state.db.as_ref(), query, &filter, page)
        .await
        .map(Json)
        .map_err(|e| AppError::from_db(e, failure))
}

/// Fetches at most one row, mapping failures with `failure`.
pub async fn fetch_one(
    state: &AppState,
    sql: &str,
    params: &[SqlParam],
    failure: &str,
) -> AppResult<Option<Value>> {
    state.db.fetch_optional(sql, params).await.map_err(|e| AppError::from_db(e, failure))
}

/// Runs a DELETE-like statement; zero affected rows means not found.
pub async fn delete_one(state: &AppState, sql: &str, id: i64, not_found: &str, failure: &str) -> AppResult<()> {
    let affected = state.db.execute(sql, &[SqlParam::from(id)]).await.map_err(|e| AppError::from_db(e, failure))?;
    if affected == 0 {
        return Err(AppError::NotFound(not_found.to_string()));
    }
    Ok(())
}
