//! HTTP client for a running proxy server.

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use super::{identification_outcome, ClientError, HerbTranslator, PlantIdentifier};
use crate::catalog::Herb;
use crate::upstream::IdentificationOutcome;

#[derive(Serialize)]
struct TranslateBody<'a> {
    herb: &'a Herb,
    #[serde(rename = "targetLanguage")]
    target_language: &'a str,
}

#[derive(Serialize)]
struct IdentifyBody<'a> {
    images: &'a [String],
}

/// Calls the `/api/v1/identify` and `/api/v1/translate` endpoints.
pub struct ProxyClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl ProxyClient {
    /// `api_key` must already be resolved (not a keyring: reference).
    pub fn new(base_url: &str, api_key: Option<String>, timeout_secs: u32) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs as u64))
            .build()
            .map_err(|e| ClientError::Config(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        })
    }

    fn endpoint(&self, name: &str) -> String {
        format!("{}/api/v1/{}", self.base_url, name)
    }

    async fn post<B: Serialize + ?Sized>(&self, name: &str, body: &B) -> Result<Response, ClientError> {
        let url = self.endpoint(name);
        debug!("POST {}", url);

        let mut request = self.client.post(&url).json(body);
        if let Some(key) = &self.api_key {
            request = request.header("X-API-Key", key);
        }
        check(request.send().await?).await
    }
}

/// Turn an `{ "error": ... }` response into [`ClientError::Proxy`].
async fn check(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
        .unwrap_or(body);

    Err(ClientError::Proxy {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl HerbTranslator for ProxyClient {
    async fn translate(&self, herb: &Herb, language: &str) -> Result<Herb, ClientError> {
        let body = TranslateBody {
            herb,
            target_language: language,
        };
        self.post("translate", &body)
            .await?
            .json()
            .await
            .map_err(|e| ClientError::InvalidResponse(format!("translated herb: {}", e)))
    }
}

#[async_trait]
impl PlantIdentifier for ProxyClient {
    async fn identify(&self, images: &[String]) -> Result<IdentificationOutcome, ClientError> {
        let payload: Value = self
            .post("identify", &IdentifyBody { images })
            .await?
            .json()
            .await
            .map_err(|e| ClientError::InvalidResponse(e.to_string()))?;
        identification_outcome(&payload)
    }
}
