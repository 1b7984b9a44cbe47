//! Bearer API-key authentication.
//!
//! When a key is configured, every route except the health check and the
//! chat webhook requires `Authorization: Bearer <key>`.

use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

/// Paths reachable without a key.
pub const EXEMPT_PATHS: &[&str] = &["/health", "/slack/events"];

#[derive(Clone)]
pub struct ApiKeyConfig {
    key_bytes: Vec<u8>,
}

impl ApiKeyConfig {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key_bytes: key.into().into_bytes(),
        }
    }

    /// Compare in time independent of where the first mismatch is.
    fn verify(&self, provided: &[u8]) -> bool {
        self.key_bytes.len() == provided.len()
            && self
                .key_bytes
                .iter()
                .zip(provided)
                .fold(0u8, |acc, (a, b)| acc | (a ^ b))
                == 0
    }
}

impl std::fmt::Debug for ApiKeyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiKeyConfig(***)")
    }
}

#[derive(Debug, Serialize)]
struct AuthError {
    error: &'static str,
    code: &'static str,
}

fn unauthorized(error: &'static str, code: &'static str) -> Response {
    (StatusCode::UNAUTHORIZED, Json(AuthError { error, code })).into_response()
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

pub fn is_exempt(path: &str) -> bool {
    EXEMPT_PATHS.contains(&path)
}

/// Middleware enforcing [`AppState::api_key`] when one is set.
pub async fn require_api_key(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let Some(api_key) = &state.api_key else {
        return next.run(request).await;
    };
    if is_exempt(request.uri().path()) {
        return next.run(request).await;
    }

    let verified = bearer_token(request.headers()).map(|token| api_key.verify(token.as_bytes()));
    match verified {
        Some(true) => next.run(request).await,
        Some(false) => {
            warn!(path = %request.uri().path(), "Invalid API key");
            unauthorized("Invalid API key", "INVALID_API_KEY")
        }
        None => {
            warn!(path = %request.uri().path(), "Missing Authorization header");
            unauthorized(
                "Missing or invalid Authorization header. Use: Authorization: Bearer <key>",
                "MISSING_API_KEY",
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify() {
        let config = ApiKeyConfig::new("test-key-123");
        assert!(config.verify(b"test-key-123"));
        assert!(!config.verify(b"test-key-124"));
        assert!(!config.verify(b""));
        assert!(!config.verify(b"test-key-123-and-more"));
    }

    #[test]
    fn test_bearer_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert("authorization", "Basic dXNlcjpwYXNz".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);

        headers.insert("authorization", "Bearer my-secret-key".parse().unwrap());
        assert_eq!(bearer_token(&headers), Some("my-secret-key"));
    }

    #[test]
    fn test_exempt_paths() {
        assert!(is_exempt("/health"));
        assert!(is_exempt("/slack/events"));
        assert!(!is_exempt("/run"));
        assert!(!is_exempt("/api/v1/drafts/approve"));
    }

    #[test]
    fn test_debug_hides_key() {
        assert_eq!(format!("{:?}", ApiKeyConfig::new("secret")), "ApiKeyConfig(***)");
    }
}
