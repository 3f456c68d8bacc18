//! Listing query construction: request parameters to parameterized SQL.

pub mod filter;
pub mod pagination;

pub use filter::{param, DateBound, Filter, FilterBuilder};
pub use pagination::{Paginacion, Pagination};
