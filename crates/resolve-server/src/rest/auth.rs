//! API-key gate for the REST/SSE surface (`spec.md` §6: "a minimal auth gate,
//! not full identity management").
//!
//! `EnrichmentConfig::api_keys` (empty by default, meaning disabled) is the
//! only source of truth for which keys are valid; this module just enforces
//! it at the router edge, exempting the probe routes
//! [`routes::PROBE_PATHS`](crate::rest::routes::PROBE_PATHS) registers so a
//! load balancer's health checks never need a key.

use std::collections::HashSet;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

use crate::rest::routes::PROBE_PATHS;

/// Authentication configuration derived from [`EnrichmentConfig`](resolve_config::EnrichmentConfig).
#[derive(Clone, Debug)]
pub struct AuthConfig {
    /// Whether authentication is enabled. Disabled when `api_keys` is empty
    /// (development mode per `spec.md` §6).
    pub enabled: bool,
    /// Valid API keys.
    pub api_keys: HashSet<String>,
    /// Paths that don't require authentication, e.g. health checks.
    pub exempt_paths: HashSet<String>,
}

fn default_exempt_paths() -> HashSet<String> {
    PROBE_PATHS.iter().map(|path| path.to_string()).collect()
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_keys: HashSet::new(),
            exempt_paths: default_exempt_paths(),
        }
    }
}

impl AuthConfig {
    /// Enables API-key authentication for every route except the probe
    /// routes in [`PROBE_PATHS`].
    pub fn with_api_keys(api_keys: Vec<String>) -> Self {
        Self {
            enabled: true,
            api_keys: api_keys.into_iter().collect(),
            exempt_paths: default_exempt_paths(),
        }
    }

    /// Adds further exempt paths on top of the probe routes.
    pub fn with_exempt_paths(mut self, paths: Vec<String>) -> Self {
        self.exempt_paths.extend(paths);
        self
    }
}

/// Rejects requests without a recognised API key, per `spec.md` §6's
/// `Authorization: Bearer <key>` / `X-API-Key: <key>` contract.
pub async fn auth_middleware(
    axum::Extension(config): axum::Extension<AuthConfig>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !config.enabled {
        return next.run(request).await;
    }

    let path = request.uri().path();
    if config.exempt_paths.contains(path) {
        return next.run(request).await;
    }

    match extract_api_key(&request) {
        Some(key) if config.api_keys.contains(&key) => next.run(request).await,
        Some(_) => {
            warn!(path, "rejected request with an unrecognised API key");
            (StatusCode::UNAUTHORIZED, "invalid API key".to_string()).into_response()
        }
        None => {
            warn!(path, "rejected request with no API key");
            (
                StatusCode::UNAUTHORIZED,
                "API key required via 'Authorization: Bearer <key>' or 'X-API-Key'".to_string(),
            )
                .into_response()
        }
    }
}

fn extract_api_key(request: &Request<Body>) -> Option<String> {
    if let Some(auth_header) = request.headers().get(header::AUTHORIZATION) {
        if let Ok(auth_str) = auth_header.to_str() {
            if let Some(key) = auth_str.strip_prefix("Bearer ") {
                return Some(key.to_string());
            }
        }
    }

    if let Some(api_key_header) = request.headers().get("X-API-Key") {
        if let Ok(key) = api_key_header.to_str() {
            return Some(key.to_string());
        }
    }

    None
}
