//! Plant identification service client.
//!
//! Sends base64 images to a Plant.id-style `identify` endpoint and returns
//! its JSON payload. The typed schema below is what the rest of the crate
//! relies on; the raw payload is kept so the proxy can pass it through.

use super::UpstreamError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Extra details requested for every suggestion.
const PLANT_DETAILS: &[&str] = &[
    "common_names",
    "taxonomy",
    "url",
    "wiki_description",
    "edible_parts",
    "watering",
];

/// Image preprocessing modifiers.
const MODIFIERS: &[&str] = &["crops_fast", "similar_images"];

/// Identify request body.
#[derive(Debug, Serialize)]
struct IdentifyRequest<'a> {
    images: &'a [String],
    modifiers: &'a [&'a str],
    plant_language: &'a str,
    plant_details: &'a [&'a str],
}

/// Identify response, as far as this crate reads it.
#[derive(Debug, Clone, Deserialize)]
pub struct PlantIdResponse {
    #[serde(default)]
    pub suggestions: Option<Vec<Suggestion>>,
}

/// One ranked species guess.
#[derive(Debug, Clone, Deserialize)]
pub struct Suggestion {
    pub plant_name: String,
    pub probability: f64,
    #[serde(default)]
    pub plant_details: Option<PlantDetails>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlantDetails {
    #[serde(default)]
    pub common_names: Option<Vec<String>>,
    #[serde(default)]
    pub wiki_description: Option<WikiDescription>,
    #[serde(default)]
    pub taxonomy: Option<Taxonomy>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WikiDescription {
    #[serde(default)]
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Taxonomy {
    #[serde(default)]
    pub family: Option<String>,
    #[serde(default)]
    pub genus: Option<String>,
}

/// Top-ranked guess for a submitted image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IdentificationResult {
    pub name: String,
    /// Confidence in [0, 1]
    pub probability: f64,
    pub common_names: Vec<String>,
    pub family: Option<String>,
    pub genus: Option<String>,
    pub description: Option<String>,
}

/// Identification verdict. No suggestion is a valid answer, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum IdentificationOutcome {
    Match(IdentificationResult),
    NoMatch,
}

impl PlantIdResponse {
    /// Validate a raw payload against the schema.
    pub fn from_value(value: &Value) -> Result<Self, UpstreamError> {
        Self::deserialize(value).map_err(|e| {
            UpstreamError::InvalidResponse(format!("unexpected identification payload: {}", e))
        })
    }

    /// The first suggestion is the primary candidate.
    pub fn outcome(&self) -> IdentificationOutcome {
        let Some(top) = self.suggestions.as_ref().and_then(|s| s.first()) else {
            return IdentificationOutcome::NoMatch;
        };

        let details = top.plant_details.clone().unwrap_or_default();
        let taxonomy = details.taxonomy.unwrap_or_default();

        IdentificationOutcome::Match(IdentificationResult {
            name: top.plant_name.clone(),
            probability: top.probability.clamp(0.0, 1.0),
            common_names: details.common_names.unwrap_or_default(),
            family: taxonomy.family,
            genus: taxonomy.genus,
            description: details.wiki_description.and_then(|w| w.value),
        })
    }
}

/// Trait for plant identification backends.
#[async_trait]
pub trait PlantIdentificationService: Send + Sync {
    /// Submit images and return the raw payload, authorized with `api_key`.
    async fn identify(&self, api_key: &str, images: &[String]) -> Result<Value, UpstreamError>;
}

/// Configuration for [`PlantIdClient`].
#[derive(Debug, Clone)]
pub struct PlantIdConfig {
    pub url: String,
    pub plant_language: String,
    pub timeout_secs: u32,
}

impl Default for PlantIdConfig {
    fn default() -> Self {
        Self {
            url: "https://api.plant.id/v2/identify".to_string(),
            plant_language: "en".to_string(),
            timeout_secs: 60,
        }
    }
}

impl From<&crate::config::IdentificationConfig> for PlantIdConfig {
    fn from(config: &crate::config::IdentificationConfig) -> Self {
        Self {
            url: config.url.clone(),
            plant_language: config.plant_language.clone(),
            timeout_secs: config.timeout_secs,
        }
    }
}

/// HTTP client for the identification API.
pub struct PlantIdClient {
    client: Client,
    config: PlantIdConfig,
}

impl PlantIdClient {
    pub fn new(config: PlantIdConfig) -> Result<Self, UpstreamError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .map_err(|e| UpstreamError::Config(e.to_string()))?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl PlantIdentificationService for PlantIdClient {
    async fn identify(&self, api_key: &str, images: &[String]) -> Result<Value, UpstreamError> {
        let request = IdentifyRequest {
            images,
            modifiers: MODIFIERS,
            plant_language: &self.config.plant_language,
            plant_details: PLANT_DETAILS,
        };

        debug!(
            "Sending {} image(s) to identification API: {}",
            images.len(),
            self.config.url
        );

        let response = self
            .client
            .post(&self.config.url)
            .header("Api-Key", api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::Status { status, body });
        }

        response
            .json()
            .await
            .map_err(|e| UpstreamError::InvalidResponse(e.to_string()))
    }
}
