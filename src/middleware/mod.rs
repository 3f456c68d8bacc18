//! Middleware components for HTTP request processing.
//!
//! Cross-cutting concerns layered onto the router: authentication and role
//! checks, per-IP rate limiting, security headers and client identification.

pub mod auth;
pub mod ip;
pub mod rate_limit;
pub mod security_headers;

pub use rate_limit::EndpointRateLimiter;
