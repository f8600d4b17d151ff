//! API request handlers.
//!
//! Bodies are taken as raw bytes and decoded here so that malformed JSON is
//! reported with the same `{ "error": ... }` shape as every other failure.

use axum::{
    body::Bytes,
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{value::RawValue, Map, Value};
use utoipa::ToSchema;

use super::state::ApiState;
use crate::language;
use crate::proxy::{ErrorBody, ProxyError};

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Always "ok" if server is responding
    pub status: String,
    /// Server version
    pub version: String,
}

/// Identification request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct IdentifyRequest {
    /// Base64 images or `data:` URLs
    pub images: Vec<String>,
}

/// Translation request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct TranslateRequest {
    /// Herb record to translate
    #[schema(value_type = Object)]
    pub herb: Box<RawValue>,
    /// Target language code, e.g. "hi"
    #[serde(rename = "targetLanguage")]
    pub target_language: String,
}

fn decode<'a, T: Deserialize<'a>>(body: &'a [u8]) -> Result<T, ProxyError> {
    serde_json::from_slice(body).map_err(|e| ProxyError::InvalidRequest(e.to_string()))
}

/// Health check endpoint (no auth required).
#[utoipa::path(
    get,
    path = "/api/v1/health",
    responses(
        (status = 200, description = "Server is healthy", body = HealthResponse)
    ),
    tag = "Health"
)]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Identify a plant from photos.
///
/// Returns the identification service's payload unchanged. An empty
/// `suggestions` list means no match.
#[utoipa::path(
    post,
    path = "/api/v1/identify",
    request_body = IdentifyRequest,
    responses(
        (status = 200, description = "Identification payload, passed through unchanged"),
        (status = 400, description = "Malformed request body", body = ErrorBody),
        (status = 401, description = "Unauthorized - missing or invalid API key"),
        (status = 500, description = "Configuration or upstream failure", body = ErrorBody)
    ),
    security(
        ("api_key" = [])
    ),
    tag = "Proxy"
)]
pub async fn identify(
    State(state): State<ApiState>,
    body: Bytes,
) -> Result<Json<Value>, ProxyError> {
    let request: IdentifyRequest = decode(&body)?;
    let payload = state.identification.identify(&request.images).await?;
    Ok(Json(payload))
}

/// Translate a herb record.
///
/// The default language echoes the submitted record byte for byte.
#[utoipa::path(
    post,
    path = "/api/v1/translate",
    request_body = TranslateRequest,
    responses(
        (status = 200, description = "Herb with translated fields merged in"),
        (status = 400, description = "Malformed request body", body = ErrorBody),
        (status = 401, description = "Unauthorized - missing or invalid API key"),
        (status = 500, description = "Configuration, upstream or parse failure", body = ErrorBody)
    ),
    security(
        ("api_key" = [])
    ),
    tag = "Proxy"
)]
pub async fn translate(
    State(state): State<ApiState>,
    body: Bytes,
) -> Result<Response, ProxyError> {
    let request: TranslateRequest = decode(&body)?;
    let raw = request.herb.get();

    if !raw.trim_start().starts_with('{') {
        return Err(ProxyError::InvalidRequest(
            "herb must be a JSON object".to_string(),
        ));
    }

    if language::is_default(&request.target_language) {
        return Ok((
            [(header::CONTENT_TYPE, "application/json")],
            raw.to_owned(),
        )
            .into_response());
    }

    let herb: Map<String, Value> = decode(raw.as_bytes())?;
    let translated = state
        .translation
        .translate(&herb, &request.target_language)
        .await?;
    Ok(Json(translated).into_response())
}
