//! Translation proxy.
//!
//! Wraps one herb record in a templated instruction, sends it to a chat
//! model and merges whatever JSON object comes back over the original.

use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::ProxyError;
use crate::language;
use crate::secrets::SecretResolver;
use crate::upstream::{ChatProvider, Message};

const SERVICE: &str = "Translation";

/// Optional free-text fields carried into the prompt.
const OPTIONAL_TEXT_FIELDS: &[&str] = &[
    "scientific_name",
    "growing_conditions",
    "medicinal_properties",
    "culinary_uses",
    "precautions",
];

/// Translates herb records through a chat model.
///
/// Stateless: one call is at most one upstream request, with no retry.
pub struct TranslationProxy {
    chat: Arc<dyn ChatProvider>,
    secrets: Arc<dyn SecretResolver>,
    api_key_env: String,
}

impl TranslationProxy {
    pub fn new(
        chat: Arc<dyn ChatProvider>,
        secrets: Arc<dyn SecretResolver>,
        api_key_env: &str,
    ) -> Self {
        Self {
            chat,
            secrets,
            api_key_env: api_key_env.to_string(),
        }
    }

    /// Translate `herb` into `target_language`.
    ///
    /// The default language returns the record unchanged without resolving
    /// the credential or touching the network.
    pub async fn translate(
        &self,
        herb: &Map<String, Value>,
        target_language: &str,
    ) -> Result<Map<String, Value>, ProxyError> {
        if language::is_default(target_language) {
            debug!("Target language is the default, skipping translation");
            return Ok(herb.clone());
        }

        let result = self.forward(herb, target_language).await;
        if let Err(e) = &result {
            error!("Translation failed: {}", e);
        }
        result
    }

    async fn forward(
        &self,
        herb: &Map<String, Value>,
        target_language: &str,
    ) -> Result<Map<String, Value>, ProxyError> {
        if target_language.trim().is_empty() {
            return Err(ProxyError::InvalidRequest(
                "targetLanguage must not be empty".to_string(),
            ));
        }

        let prompt = build_prompt(herb, target_language)?;

        let api_key = self
            .secrets
            .resolve(&self.api_key_env)
            .await
            .ok_or_else(|| ProxyError::Configuration(self.api_key_env.clone()))?;

        info!(
            "Translating herb {} to {}",
            herb.get("name").and_then(serde_json::Value::as_str).unwrap_or("<unnamed>"),
            language::language_name(target_language)
        );

        let messages = [Message::user(prompt)];
        let response = self
            .chat
            .chat(&api_key, &messages)
            .await
            .map_err(|e| ProxyError::from_upstream(SERVICE, e))?;

        let translated = extract_json_object(&response.content).ok_or_else(|| {
            warn!(
                "Model output did not contain a JSON object ({} chars)",
                response.content.len()
            );
            ProxyError::Parse {
                service: SERVICE,
                detail: "model output is not a JSON object".to_string(),
            }
        })?;

        info!("Translation successful ({} field(s))", translated.len());
        Ok(merge_translation(herb, translated))
    }
}

/// Build the instruction sent to the model.
///
/// Fails with [`ProxyError::InvalidRequest`] when the record lacks a
/// required text field or a field has the wrong JSON type.
pub fn build_prompt(herb: &Map<String, Value>, target_language: &str) -> Result<String, ProxyError> {
    let language = language::language_name(target_language);

    let mut lines = Vec::new();
    for field in ["name", "description", "category"] {
        let value = required_text(herb, field)?;
        lines.push(field_line(field, Value::from(value)));
    }
    for field in ["benefits", "uses"] {
        lines.push(field_line(field, Value::from(text_list(herb, field)?)));
    }
    for field in OPTIONAL_TEXT_FIELDS {
        let value = optional_text(herb, field)?.unwrap_or_default();
        lines.push(field_line(field, Value::from(value)));
    }

    Ok(format!(
        "Translate the following plant/herb information to {language}. \
         Maintain the same structure and return ONLY a valid JSON object \
         with these exact fields translated:\n\n\
         {{\n{fields}\n}}\n\n\
         Return ONLY the JSON object with all text translated to {language}. \
         Keep scientific_name in Latin. Keep the field names exactly as given. \
         Do not include any explanation or markdown formatting.",
        language = language,
        fields = lines.join(",\n"),
    ))
}

fn field_line(field: &str, value: Value) -> String {
    format!("  \"{}\": {}", field, value)
}

fn required_text<'a>(herb: &'a Map<String, Value>, field: &str) -> Result<&'a str, ProxyError> {
    match herb.get(field) {
        Some(Value::String(s)) => Ok(s.as_str()),
        Some(_) => Err(ProxyError::InvalidRequest(format!(
            "herb.{} must be a string",
            field
        ))),
        None => Err(ProxyError::InvalidRequest(format!(
            "herb.{} is required",
            field
        ))),
    }
}

fn optional_text<'a>(
    herb: &'a Map<String, Value>,
    field: &str,
) -> Result<Option<&'a str>, ProxyError> {
    match herb.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(_) => Err(ProxyError::InvalidRequest(format!(
            "herb.{} must be a string or null",
            field
        ))),
    }
}

fn text_list<'a>(herb: &'a Map<String, Value>, field: &str) -> Result<Vec<&'a str>, ProxyError> {
    let invalid = || ProxyError::InvalidRequest(format!("herb.{} must be a list of strings", field));
    match herb.get(field) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| item.as_str().ok_or_else(invalid))
            .collect(),
        Some(_) => Err(invalid()),
    }
}

/// Pull a JSON object out of free-form model output.
///
/// Tries the span from the first `{` to the last `}`, then the whole
/// trimmed text. Anything that does not decode to an object is rejected.
pub fn extract_json_object(text: &str) -> Option<Map<String, Value>> {
    greedy_span(text)
        .and_then(decode_object)
        .or_else(|| decode_object(text.trim()))
}

fn greedy_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn decode_object(candidate: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str(candidate) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Overlay `translated` on `original`. Keys the model returned win; keys it
/// dropped keep their original value.
pub fn merge_translation(
    original: &Map<String, Value>,
    translated: Map<String, Value>,
) -> Map<String, Value> {
    let mut merged = original.clone();
    for (key, value) in translated {
        merged.insert(key, value);
    }
    merged
}
