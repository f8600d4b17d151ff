//! Clients for the third-party services behind the proxies.
//!
//! - [`chat`]: OpenAI-compatible chat completions, used for translation
//! - [`plant_id`]: plant identification from photos
//!
//! Both take the credential per call. The proxies resolve it right before
//! the request so a missing key never reaches the network.

pub mod chat;
pub mod plant_id;

pub use chat::{ChatProvider, ChatResponse, Message, OpenAiChat, OpenAiChatConfig, Role};
pub use plant_id::{
    IdentificationOutcome, IdentificationResult, PlantIdClient, PlantIdConfig, PlantIdResponse,
    PlantIdentificationService,
};

use thiserror::Error;

/// Errors from upstream services.
#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Upstream returned HTTP {status}")]
    Status { status: u16, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    Config(String),
}
