//! API-level and cross-module tests for the Biblioteca Xonler backend.
//!
//! The router is driven in-process with `tower::ServiceExt::oneshot`
//! against [`support::MockExecutor`], a query executor that records every
//! statement and its bound values, so no Postgres instance is needed.
//!
//! ## Test Modules
//!
//! - **api_tests**: listing, filters, pagination, writes, roles and login
//! - **config_tests**: configuration layering and validation
//! - **db_tests**: schema bootstrap, paged fetch and admin bootstrap
//! - **error_tests**: error taxonomy and body shape
//! - **health_api_tests**: health, readiness, metrics and version endpoints

pub mod support;

pub mod db_tests;
pub mod error_tests;
