//! Conjunctive WHERE-clause assembly from request parameters.
//!
//! A [`FilterBuilder`] accumulates `(fragment, value)` pairs. Each fragment's
//! placeholder number is rendered from the length of the bound-value list at
//! the moment the value is pushed, so `$k` always refers to `params[k - 1]`.
//! Raw request text only ever travels as a bound value; column names and
//! operators come from the caller's static strings.

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::db::SqlParam;
use crate::error::{AppError, AppResult};

/// Which side of a date range a parameter bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateBound {
    /// `col >= value`
    From,
    /// `col <= value`
    To,
}

/// The rendered filter: a WHERE clause (possibly empty) and its values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    clauses: Vec<String>,
    params: Vec<SqlParam>,
}

impl Filter {
    /// `""` when no predicate exists, otherwise `"WHERE a AND b ..."`.
    pub fn where_clause(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", self.clauses.join(" AND "))
        }
    }

    pub fn params(&self) -> &[SqlParam] {
        &self.params
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Placeholder number for the next value appended after the filter's
    /// own values (e.g. LIMIT/OFFSET).
    pub fn next_placeholder(&self) -> usize {
        self.params.len() + 1
    }
}

#[derive(Debug, Default)]
pub struct FilterBuilder {
    filter: Filter,
}

impl FilterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn bind(&mut self, value: SqlParam) -> usize {
        self.filter.params.push(value);
        self.filter.params.len()
    }

    fn push(&mut self, clause: String) {
        self.filter.clauses.push(clause);
    }

    /// Case-insensitive substring match over one or more columns.
    ///
    /// All columns share a single placeholder: `(a ILIKE $n OR b ILIKE $n)`.
    pub fn search(&mut self, raw: Option<&str>, columns: &[&str]) -> &mut Self {
        let Some(term) = non_blank(raw) else {
            return self;
        };
        if columns.is_empty() {
            return self;
        }
        let n = self.bind(SqlParam::from(format!("%{}%", escape_like(term))));
        let ors: Vec<String> = columns.iter().map(|c| format!("{} ILIKE ${}", c, n)).collect();
        let clause = if ors.len() == 1 { ors.join("") } else { format!("({})", ors.join(" OR ")) };
        self.push(clause);
        self
    }

    /// Exact integer match. Malformed input is a validation error.
    pub fn integer(&mut self, field: &str, raw: Option<&str>, column: &str) -> AppResult<&mut Self> {
        if let Some(v) = non_blank(raw) {
            let id = parse_integer(field, v)?;
            let n = self.bind(SqlParam::from(id));
            self.push(format!("{} = ${}", column, n));
        }
        Ok(self)
    }

    /// Exact boolean match (`col = $n`).
    pub fn boolean(&mut self, field: &str, raw: Option<&str>, column: &str) -> AppResult<&mut Self> {
        if let Some(v) = non_blank(raw) {
            let flag = parse_bool(field, v)?;
            let n = self.bind(SqlParam::from(flag));
            self.push(format!("{} = ${}", column, n));
        }
        Ok(self)
    }

    /// Flag expressed through a nullable column: `true` ⇔ `col IS NULL`,
    /// `false` ⇔ `col IS NOT NULL`. Binds nothing.
    pub fn null_flag(&mut self, field: &str, raw: Option<&str>, column: &str) -> AppResult<&mut Self> {
        if let Some(v) = non_blank(raw) {
            let clause = if parse_bool(field, v)? {
                format!("{} IS NULL", column)
            } else {
                format!("{} IS NOT NULL", column)
            };
            self.push(clause);
        }
        Ok(self)
    }

    /// One side of a date range. Both sides may be present at once.
    pub fn date(&mut self, field: &str, raw: Option<&str>, column: &str, bound: DateBound) -> AppResult<&mut Self> {
        if let Some(v) = non_blank(raw) {
            let date = parse_date(field, v)?;
            let n = self.bind(SqlParam::from(date));
            let op = match bound {
                DateBound::From => ">=",
                DateBound::To => "<=",
            };
            self.push(format!("{} {} ${}", column, op, n));
        }
        Ok(self)
    }

    /// Inclusive `[from, to]` range over one column. Either side may be
    /// absent; an inverted range is rejected before anything is bound.
    pub fn date_range(
        &mut self,
        (from_field, from_raw): (&str, Option<&str>),
        (to_field, to_raw): (&str, Option<&str>),
        column: &str,
    ) -> AppResult<&mut Self> {
        let from = non_blank(from_raw).map(|v| parse_date(from_field, v)).transpose()?;
        let to = non_blank(to_raw).map(|v| parse_date(to_field, v)).transpose()?;
        if let (Some(f), Some(t)) = (from, to) {
            if f > t {
                return Err(AppError::validation(
                    from_field,
                    format!("'{}' no puede ser posterior a '{}'", from_field, to_field),
                ));
            }
        }
        self.date(from_field, from_raw, column, DateBound::From)?;
        self.date(to_field, to_raw, column, DateBound::To)
    }

    /// Exact text match restricted to an allowed set of values.
    pub fn one_of(&mut self, field: &str, raw: Option<&str>, column: &str, allowed: &[&str]) -> AppResult<&mut Self> {
        if let Some(v) = non_blank(raw) {
            let v = v.to_lowercase();
            if !allowed.contains(&v.as_str()) {
                return Err(AppError::validation(
                    field,
                    format!("El parámetro '{}' debe ser uno de: {}", field, allowed.join(", ")),
                ));
            }
            let n = self.bind(SqlParam::from(v));
            self.push(format!("{} = ${}", column, n));
        }
        Ok(self)
    }

    pub fn build(self) -> Filter {
        self.filter
    }
}

/// Convenience accessor for query maps.
pub fn param<'a>(params: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    params.get(key).map(String::as_str)
}

fn non_blank(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|v| !v.is_empty())
}

/// Escapes LIKE metacharacters so they match literally (Postgres' default
/// escape character is the backslash).
pub fn escape_like(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

pub fn parse_integer(field: &str, raw: &str) -> AppResult<i64> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| AppError::validation(field, format!("El parámetro '{}' debe ser un número entero", field)))
}

pub fn parse_bool(field: &str, raw: &str) -> AppResult<bool> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "si" | "sí" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(AppError::validation(field, format!("El parámetro '{}' debe ser true o false", field))),
    }
}

pub fn parse_date(field: &str, raw: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| {
        AppError::validation(field, format!("El parámetro '{}' debe ser una fecha YYYY-MM-DD", field))
    })
}
