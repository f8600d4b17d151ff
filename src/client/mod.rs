//! Client side of the proxies.
//!
//! [`HerbTranslator`] and [`PlantIdentifier`] are what the views and the
//! translation queue talk to. [`ProxyClient`] reaches a running proxy server
//! over HTTP; the proxies themselves implement the same traits so the whole
//! flow can run in one process.

pub mod http;

pub use http::ProxyClient;

use async_trait::async_trait;
use base64::Engine;
use serde_json::Value;
use std::path::Path;
use thiserror::Error;

use crate::catalog::Herb;
use crate::proxy::{IdentificationProxy, ProxyError, TranslationProxy};
use crate::upstream::{IdentificationOutcome, PlantIdResponse};

/// Client-side errors.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The proxy answered with an `{ "error": ... }` body
    #[error("Proxy returned HTTP {status}: {message}")]
    Proxy { status: u16, message: String },

    /// In-process proxy call failed
    #[error(transparent)]
    Local(#[from] ProxyError),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Failed to read image {path}: {source}")]
    Image {
        path: String,
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Produces a translated copy of a herb.
#[async_trait]
pub trait HerbTranslator: Send + Sync {
    async fn translate(&self, herb: &Herb, language: &str) -> Result<Herb, ClientError>;
}

/// Identifies a plant from encoded images.
#[async_trait]
pub trait PlantIdentifier: Send + Sync {
    async fn identify(&self, images: &[String]) -> Result<IdentificationOutcome, ClientError>;
}

/// Decode an identification payload into the top suggestion.
pub(crate) fn identification_outcome(payload: &Value) -> Result<IdentificationOutcome, ClientError> {
    PlantIdResponse::from_value(payload)
        .map(|response| response.outcome())
        .map_err(|e| ClientError::InvalidResponse(e.to_string()))
}

#[async_trait]
impl HerbTranslator for TranslationProxy {
    async fn translate(&self, herb: &Herb, language: &str) -> Result<Herb, ClientError> {
        let Value::Object(record) =
            serde_json::to_value(herb).map_err(|e| ClientError::InvalidResponse(e.to_string()))?
        else {
            return Err(ClientError::InvalidResponse(
                "herb did not serialize to an object".to_string(),
            ));
        };

        let translated = TranslationProxy::translate(self, &record, language).await?;
        serde_json::from_value(Value::Object(translated))
            .map_err(|e| ClientError::InvalidResponse(format!("translated herb: {}", e)))
    }
}

#[async_trait]
impl PlantIdentifier for IdentificationProxy {
    async fn identify(&self, images: &[String]) -> Result<IdentificationOutcome, ClientError> {
        let payload = IdentificationProxy::identify(self, images).await?;
        identification_outcome(&payload)
    }
}

/// MIME type guessed from an image file extension.
fn image_mime(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match ext.as_deref() {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("bmp") => "image/bmp",
        Some("heic") => "image/heic",
        Some("heif") => "image/heif",
        Some("tif") | Some("tiff") => "image/tiff",
        // Phone cameras mostly produce JPEG
        _ => "image/jpeg",
    }
}

/// Encode image bytes as a `data:` URL, the form a browser file reader
/// produces and the identification service accepts.
pub fn encode_image(bytes: &[u8], path: &Path) -> String {
    format!(
        "data:{};base64,{}",
        image_mime(path),
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}

/// Read an image file and encode it with [`encode_image`].
pub async fn read_image(path: &Path) -> Result<String, ClientError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| ClientError::Image {
            path: path.display().to_string(),
            source,
        })?;
    Ok(encode_image(&bytes, path))
}
