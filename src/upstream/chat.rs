//! OpenAI-compatible chat completion client.
//!
//! Works with OpenAI and with gateways that implement the Chat Completions
//! API (Groq, OpenRouter, hosted Gemini gateways and the like).

use super::UpstreamError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// Message role for chat-style prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
}

/// A single message in a chat conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Completion returned by a chat provider.
#[derive(Debug)]
pub struct ChatResponse {
    /// The generated content.
    pub content: String,
    /// The model used for generation.
    pub model: String,
    /// Number of tokens used (if available).
    pub tokens_used: Option<u32>,
}

/// Trait for chat completion backends.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Get the model name being used.
    fn model(&self) -> &str;

    /// Send one chat completion request authorized with `api_key`.
    async fn chat(&self, api_key: &str, messages: &[Message])
        -> Result<ChatResponse, UpstreamError>;
}

/// OpenAI chat request format.
#[derive(Debug, Serialize)]
struct OpenAiChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
}

/// OpenAI chat response format.
#[derive(Debug, Deserialize)]
struct OpenAiChatResponse {
    choices: Vec<OpenAiChoice>,
    #[serde(default)]
    model: Option<String>,
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    total_tokens: u32,
}

/// Configuration for the OpenAI-compatible client.
#[derive(Debug, Clone)]
pub struct OpenAiChatConfig {
    /// Model name (e.g., "gpt-4o-mini", "google/gemini-2.5-flash")
    pub model: String,
    /// Base URL (e.g., "https://api.openai.com/v1")
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u32,
}

impl Default for OpenAiChatConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            timeout_secs: 60,
        }
    }
}

impl From<&crate::config::TranslationConfig> for OpenAiChatConfig {
    fn from(config: &crate::config::TranslationConfig) -> Self {
        Self {
            model: config.model.clone(),
            base_url: config.base_url.clone(),
            timeout_secs: config.timeout_secs,
        }
    }
}

/// OpenAI-compatible chat client.
pub struct OpenAiChat {
    client: Client,
    config: OpenAiChatConfig,
}

impl OpenAiChat {
    pub fn new(config: OpenAiChatConfig) -> Result<Self, UpstreamError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .map_err(|e| UpstreamError::Config(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl ChatProvider for OpenAiChat {
    fn model(&self) -> &str {
        &self.config.model
    }

    async fn chat(
        &self,
        api_key: &str,
        messages: &[Message],
    ) -> Result<ChatResponse, UpstreamError> {
        let request = OpenAiChatRequest {
            model: &self.config.model,
            messages,
        };

        let url = self.completions_url();
        debug!("Sending chat request to OpenAI-compatible API: {}", url);

        let start = std::time::Instant::now();
        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::Status { status, body });
        }

        let result: OpenAiChatResponse = response
            .json()
            .await
            .map_err(|e| UpstreamError::InvalidResponse(e.to_string()))?;

        let tokens = result.usage.map(|u| u.total_tokens);
        let model = result
            .model
            .unwrap_or_else(|| self.config.model.clone());

        info!(
            "Chat completed in {}ms (model: {}, tokens: {:?})",
            start.elapsed().as_millis(),
            model,
            tokens
        );

        let content = result
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| {
                UpstreamError::InvalidResponse("No message content in response".to_string())
            })?;

        Ok(ChatResponse {
            content,
            model,
            tokens_used: tokens,
        })
    }
}
