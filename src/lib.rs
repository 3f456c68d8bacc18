//! # Biblioteca Xonler Backend Library
//!
//! Core library for Biblioteca Xonler, a library-management REST backend:
//! libraries, books, loans and users, with bearer-token authentication and
//! admin/guest roles.
//!
//! ## Architecture
//!
//! - **Axum**: HTTP server, routing and middleware
//! - **SQLx**: Postgres pool, optionally over verified TLS
//! - **Tokio**: async runtime
//! - **Serde**: JSON request and response bodies
//!
//! ## Core Components
//!
//! - [`config`]: layered configuration (embedded defaults, files, environment)
//! - [`db`]: pool provider, query executor seam, schema and error mapping
//! - [`query`]: filter builder and pagination clamp for listing endpoints
//! - [`auth`]: password hashing and token issuing
//! - [`error`]: centralized error type and HTTP error responses
//! - [`metrics`]: request and login counters
//! - [`middleware`]: authentication, rate limiting and security headers
//! - [`routes`]: HTTP API endpoint handlers and the router builder
//! - [`state`]: shared application state
//! - [`types`]: request and response bodies

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod query;
pub mod routes;
pub mod state;
pub mod types;

#[cfg(test)]
mod tests;
