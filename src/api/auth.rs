//! API key authentication middleware.

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, Ordering};

use super::state::ApiState;
use crate::proxy::ErrorBody;

/// Header names accepted for the API key, in lookup order.
pub const API_KEY_HEADERS: &[&str] = &["X-API-Key", "apikey"];

fn provided_key(headers: &HeaderMap) -> Option<&str> {
    API_KEY_HEADERS
        .iter()
        .find_map(|name| headers.get(*name))
        .and_then(|v| v.to_str().ok())
}

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
        .into_response()
}

/// Reject proxy calls without a valid API key.
///
/// With no key hash configured every request passes (development mode).
pub async fn require_api_key(
    State(state): State<ApiState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let Some(ref expected_hash) = state.api_key_hash else {
        return next.run(request).await;
    };

    match provided_key(request.headers()) {
        Some(key) if hash_api_key(key) == *expected_hash => next.run(request).await,
        Some(_) => unauthorized("Invalid API key"),
        None => unauthorized("Missing apikey or X-API-Key header"),
    }
}

/// Hash an API key using SHA-256.
pub fn hash_api_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}

static KEY_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a random API key (32 hex chars).
pub fn generate_api_key() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};

    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();

    let mut hasher = Sha256::new();
    hasher.update(timestamp.to_le_bytes());
    hasher.update(std::process::id().to_le_bytes());
    hasher.update(KEY_COUNTER.fetch_add(1, Ordering::Relaxed).to_le_bytes());
    // Stack address varies per run under ASLR
    let marker = 0u8;
    hasher.update((&marker as *const u8 as usize).to_le_bytes());

    hex::encode(&hasher.finalize()[..16])
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_hash_api_key() {
        let hash = hash_api_key("test-key-12345");
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, hash_api_key("test-key-12345"));
        assert_ne!(hash, hash_api_key("different-key"));
    }

    #[test]
    fn test_generate_api_key() {
        let key1 = generate_api_key();
        let key2 = generate_api_key();
        assert_eq!(key1.len(), 32);
        assert_ne!(key1, key2);
    }

    #[test]
    fn test_provided_key_headers() {
        let mut headers = HeaderMap::new();
        assert!(provided_key(&headers).is_none());

        headers.insert("apikey", HeaderValue::from_static("anon"));
        assert_eq!(provided_key(&headers), Some("anon"));

        headers.insert("x-api-key", HeaderValue::from_static("primary"));
        assert_eq!(provided_key(&headers), Some("primary"));
    }
}
