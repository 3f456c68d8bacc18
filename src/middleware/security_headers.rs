//! Security headers middleware for HTTP responses.
//!
//! Every response, including errors and the static frontend, gets the fixed
//! header set below. HSTS and CSP are opt-in through `[security]`. Caching is
//! decided by content type: API JSON is never stored by browsers or proxies,
//! hashed frontend assets are cached for a year.

use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE, PRAGMA, WWW_AUTHENTICATE};
use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use crate::config::{AppConfig, SecurityConfig};

const HSTS_DEFAULT_MAX_AGE: u64 = 31_536_000;

/// Headers sent unconditionally.
const FIXED: &[(&str, &str)] = &[
    ("x-content-type-options", "nosniff"),
    ("x-frame-options", "SAMEORIGIN"),
    ("referrer-policy", "no-referrer"),
    ("permissions-policy", "geolocation=(), microphone=(), camera=()"),
    ("cross-origin-opener-policy", "same-origin"),
    ("cross-origin-resource-policy", "same-origin"),
];

/// Adds the security header set and the caching policy to a response.
///
/// A 401 also carries `WWW-Authenticate: Bearer`.
pub async fn security_headers_middleware(
    State(cfg): State<Arc<AppConfig>>,
    req: Request,
    next: Next,
) -> Response {
    let mut res = next.run(req).await;
    let unauthorized = res.status() == StatusCode::UNAUTHORIZED;
    let headers = res.headers_mut();

    for &(name, value) in FIXED {
        headers.insert(HeaderName::from_static(name), HeaderValue::from_static(value));
    }
    if let Some(sec) = cfg.security.as_ref() {
        apply_optional(headers, sec);
    }
    if unauthorized && !headers.contains_key(WWW_AUTHENTICATE) {
        headers.insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
    }
    apply_cache_policy(headers);

    res
}

/// `Strict-Transport-Security` value, when enabled.
fn hsts_value(sec: &SecurityConfig) -> Option<String> {
    if !sec.enable_hsts.unwrap_or(false) {
        return None;
    }
    let max_age = sec.hsts_max_age.unwrap_or(HSTS_DEFAULT_MAX_AGE);
    let include_sub = if sec.hsts_include_subdomains.unwrap_or(false) { "; includeSubDomains" } else { "" };
    Some(format!("max-age={}{}", max_age, include_sub))
}

fn apply_optional(headers: &mut HeaderMap, sec: &SecurityConfig) {
    if let Some(value) = hsts_value(sec).and_then(|v| HeaderValue::from_str(&v).ok()) {
        headers.insert(HeaderName::from_static("strict-transport-security"), value);
    }
    let csp = sec.csp.as_deref().map(str::trim).filter(|c| !c.is_empty());
    match csp.map(HeaderValue::from_str) {
        Some(Ok(value)) => {
            headers.insert(HeaderName::from_static("content-security-policy"), value);
        }
        Some(Err(e)) => tracing::warn!("Ignoring invalid security.csp value: {}", e),
        None => {}
    }
}

fn apply_cache_policy(headers: &mut HeaderMap) {
    let content_type = headers.get(CONTENT_TYPE).and_then(|ct| ct.to_str().ok()).unwrap_or_default();
    let json = content_type.starts_with("application/json");
    let asset = ["text/css", "application/javascript", "text/javascript"]
        .iter()
        .any(|prefix| content_type.starts_with(prefix));

    if json {
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
        headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
    } else if asset {
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("public, max-age=31536000, immutable"));
        headers.remove(PRAGMA);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hsts_is_opt_in() {
        assert_eq!(hsts_value(&SecurityConfig::default()), None);

        let sec = SecurityConfig { enable_hsts: Some(true), ..Default::default() };
        assert_eq!(hsts_value(&sec).as_deref(), Some("max-age=31536000"));

        let sec = SecurityConfig {
            enable_hsts: Some(true),
            hsts_max_age: Some(600),
            hsts_include_subdomains: Some(true),
            ..Default::default()
        };
        assert_eq!(hsts_value(&sec).as_deref(), Some("max-age=600; includeSubDomains"));
    }

    #[test]
    fn blank_csp_is_skipped() {
        let mut headers = HeaderMap::new();
        apply_optional(&mut headers, &SecurityConfig { csp: Some("  ".to_string()), ..Default::default() });
        assert!(headers.get("content-security-policy").is_none());

        apply_optional(&mut headers, &SecurityConfig { csp: Some("default-src 'self'".to_string()), ..Default::default() });
        assert_eq!(headers.get("content-security-policy").unwrap(), "default-src 'self'");
    }

    #[test]
    fn assets_are_cached_json_is_not() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/css; charset=utf-8"));
        apply_cache_policy(&mut headers);
        assert_eq!(headers.get(CACHE_CONTROL).unwrap(), "public, max-age=31536000, immutable");

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        apply_cache_policy(&mut headers);
        assert_eq!(headers.get(CACHE_CONTROL).unwrap(), "no-store");
        assert_eq!(headers.get(PRAGMA).unwrap(), "no-cache");
    }
}
