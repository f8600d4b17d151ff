//! Credential-injecting proxies in front of the third-party services.
//!
//! Each proxy resolves its API key from the environment on every call,
//! forwards exactly one request upstream and reshapes the answer. Failures
//! are reported as [`ProxyError`], which the HTTP layer turns into a
//! `{ "error": ... }` body; upstream detail is logged, never returned.

pub mod identify;
pub mod translate;

pub use identify::IdentificationProxy;
pub use translate::{build_prompt, extract_json_object, merge_translation, TranslationProxy};

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;
use utoipa::ToSchema;

use crate::upstream::UpstreamError;

/// Proxy failures.
#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Required credential missing from the environment
    #[error("{0} is not configured")]
    Configuration(String),

    /// Upstream answered with a non-success status
    #[error("{service} API error: {status}")]
    Upstream { service: &'static str, status: u16 },

    /// Upstream could not be reached
    #[error("{0} API is unreachable")]
    Network(&'static str),

    /// Upstream answered with something that does not fit the schema
    #[error("Could not parse {service} response: {detail}")]
    Parse {
        service: &'static str,
        detail: String,
    },
}

impl ProxyError {
    /// Convert an upstream failure, logging the detail that stays server-side.
    pub fn from_upstream(service: &'static str, err: UpstreamError) -> Self {
        match err {
            UpstreamError::Status { status, body } => {
                error!("{} API error: {} {}", service, status, body);
                ProxyError::Upstream { service, status }
            }
            UpstreamError::Http(e) => {
                error!("{} API request failed: {}", service, e);
                ProxyError::Network(service)
            }
            UpstreamError::InvalidResponse(detail) => {
                error!("{} API returned an invalid response: {}", service, detail);
                ProxyError::Parse { service, detail }
            }
            UpstreamError::Config(detail) => {
                error!("{} client misconfigured: {}", service, detail);
                ProxyError::Configuration(format!("{} client", service))
            }
        }
    }

    /// HTTP status returned to the caller.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Error body returned by both proxies.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    /// Human-readable failure message
    pub error: String,
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (
            status,
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}
