//! Database access: the Postgres pool, the executor seam handlers use, error
//! classification and schema bootstrap.

pub mod error;
pub mod executor;
pub mod pool;
pub mod schema;

pub use error::{DbError, DbErrorKind};
pub use executor::{PoolStats, QueryExecutor, SqlParam};
pub use pool::{Database, PoolConfigError};
