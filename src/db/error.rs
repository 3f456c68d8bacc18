/// Local classification of backend failures.
///
/// Response shaping only ever looks at this enum, never at driver error
/// objects, so swapping the driver only touches [`DbErrorKind::from_sqlstate`]
/// and the `From<sqlx::Error>` conversion below.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbErrorKind {
    /// SQLSTATE 23505
    UniqueViolation,
    /// SQLSTATE 23503
    ForeignKeyViolation,
    /// Check / not-null violations and unparsable literals.
    InvalidData,
    Other,
}

impl DbErrorKind {
    pub fn from_sqlstate(code: &str) -> Self {
        match code {
            "23505" => DbErrorKind::UniqueViolation,
            "23503" => DbErrorKind::ForeignKeyViolation,
            "23514" | "23502" | "22P02" | "22007" | "22008" => DbErrorKind::InvalidData,
            _ => DbErrorKind::Other,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DbErrorKind::UniqueViolation => "unique_violation",
            DbErrorKind::ForeignKeyViolation => "foreign_key_violation",
            DbErrorKind::InvalidData => "invalid_data",
            DbErrorKind::Other => "other",
        }
    }
}

/// A database failure with its classified kind and the original message.
/// The message is for logs only.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} ({})", .kind.as_str())]
pub struct DbError {
    pub kind: DbErrorKind,
    pub message: String,
}

impl DbError {
    pub fn new(kind: DbErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(DbErrorKind::Other, message)
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                let kind = db_err.code().map(|c| DbErrorKind::from_sqlstate(&c)).unwrap_or(DbErrorKind::Other);
                let constraint = db_err.constraint().map(|c| format!(" [{}]", c)).unwrap_or_default();
                DbError::new(kind, format!("{}{}", db_err.message(), constraint))
            }
            sqlx::Error::PoolTimedOut => DbError::other("timed out acquiring a database connection"),
            sqlx::Error::PoolClosed => DbError::other("database pool is closed"),
            other => DbError::other(other.to_string()),
        }
    }
}
