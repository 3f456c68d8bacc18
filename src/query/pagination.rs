use std::collections::HashMap;

use serde::Serialize;

use crate::config::{PaginationConfig, MAX_PAGE_LIMIT};

/// Sanitized `LIMIT`/`OFFSET` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub limit: i64,
    pub offset: i64,
}

impl Pagination {
    /// Clamps raw request values.
    ///
    /// - missing, non-numeric, zero or negative `limit` → configured default
    /// - `limit` above the maximum → the maximum (never above 100)
    /// - missing, non-numeric or negative `offset` → 0
    pub fn clamp(raw_limit: Option<&str>, raw_offset: Option<&str>, cfg: &PaginationConfig) -> Self {
        let max = cfg.max_limit.clamp(1, MAX_PAGE_LIMIT);
        let default = cfg.default_limit.clamp(1, max);

        let limit = match raw_limit.map(str::trim) {
            Some(v) => match v.parse::<i64>() {
                Ok(n) if n > 0 => n.min(max),
                // too large for i64, still a request for "more than the maximum"
                Err(_) if !v.is_empty() && v.bytes().all(|b| b.is_ascii_digit()) => max,
                _ => default,
            },
            None => default,
        };
        let offset = match raw_offset.and_then(|v| v.trim().parse::<i64>().ok()) {
            Some(v) if v >= 0 => v,
            _ => 0,
        };
        Self { limit, offset }
    }

    pub fn from_query(params: &HashMap<String, String>, cfg: &PaginationConfig) -> Self {
        Self::clamp(
            params.get("limit").map(String::as_str),
            params.get("offset").map(String::as_str),
            cfg,
        )
    }
}

/// Pagination metadata returned with every listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Paginacion {
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}
