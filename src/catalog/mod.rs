//! Herb catalog: the record type and the managed backend that stores it.
//!
//! Persistence and authentication belong to an external backend. This module
//! only describes the rows it holds and the calls the client makes against
//! it; see [`rest::RestCatalog`] for the HTTP implementation.

pub mod rest;
pub mod session;

pub use rest::RestCatalog;
pub use session::{AuthEvent, Session, SessionContext, User};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Catalog backend errors.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Backend returned HTTP {status}: {message}")]
    Backend { status: u16, message: String },

    #[error("Herb '{0}' not found")]
    NotFound(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Admin privileges required")]
    Forbidden,

    #[error("Invalid herb: {0}")]
    Validation(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// A catalog entry as stored by the backend.
///
/// Columns the backend adds beyond these are kept in `extra` so a record
/// survives a round trip through the translation proxy unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Herb {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub scientific_name: Option<String>,
    pub description: String,
    pub category: String,
    #[serde(default, deserialize_with = "nullable_list")]
    pub benefits: Vec<String>,
    #[serde(default, deserialize_with = "nullable_list")]
    pub uses: Vec<String>,
    #[serde(default)]
    pub growing_conditions: Option<String>,
    #[serde(default)]
    pub medicinal_properties: Option<String>,
    #[serde(default)]
    pub culinary_uses: Option<String>,
    #[serde(default)]
    pub precautions: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub amazon_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Treat a `null` list column as empty.
fn nullable_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

impl Herb {
    /// Link to buy the herb: the curated link if set, else a store search.
    pub fn purchase_link(&self) -> String {
        match self.amazon_link.as_deref().map(str::trim) {
            Some(link) if !link.is_empty() => link.to_string(),
            _ => format!(
                "https://www.amazon.in/s?k={}+herb",
                urlencoding::encode(&self.name)
            ),
        }
    }

    /// Case-insensitive substring match against name and description.
    pub fn matches_query(&self, query: &str) -> bool {
        let query = query.to_lowercase();
        self.name.to_lowercase().contains(&query)
            || self.description.to_lowercase().contains(&query)
    }

    /// Case-insensitive exact match against the category label.
    pub fn in_category(&self, category: &str) -> bool {
        self.category.to_lowercase() == category.to_lowercase()
    }

    /// Optional text fields with content, paired with display labels.
    ///
    /// Blank values count as absent. Translated records carry `""` where
    /// the original had `null`.
    pub fn detail_fields(&self) -> Vec<(&'static str, &str)> {
        [
            ("Scientific name", &self.scientific_name),
            ("Growing conditions", &self.growing_conditions),
            ("Medicinal properties", &self.medicinal_properties),
            ("Culinary uses", &self.culinary_uses),
            ("Precautions", &self.precautions),
        ]
        .into_iter()
        .filter_map(|(label, value)| {
            let value = value.as_deref()?.trim();
            (!value.is_empty()).then_some((label, value))
        })
        .collect()
    }
}

/// A herb to insert. The backend assigns `id` and `created_at`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewHerb {
    pub name: String,
    pub scientific_name: Option<String>,
    pub description: String,
    pub category: String,
    pub benefits: Vec<String>,
    pub uses: Vec<String>,
    pub growing_conditions: Option<String>,
    pub medicinal_properties: Option<String>,
    pub culinary_uses: Option<String>,
    pub precautions: Option<String>,
    pub image_url: Option<String>,
    pub amazon_link: Option<String>,
}

/// Raw admin form input. List fields are comma-separated.
#[derive(Debug, Clone, Default)]
pub struct HerbForm {
    pub name: String,
    pub scientific_name: String,
    pub description: String,
    pub category: String,
    pub image_url: String,
    pub benefits: String,
    pub uses: String,
    pub growing_conditions: String,
    pub medicinal_properties: String,
    pub culinary_uses: String,
    pub precautions: String,
    pub amazon_link: String,
}

impl HerbForm {
    /// Validate the form and turn it into an insertable record.
    pub fn into_new_herb(self) -> Result<NewHerb, CatalogError> {
        for (field, value) in [
            ("name", &self.name),
            ("description", &self.description),
            ("category", &self.category),
        ] {
            if value.trim().is_empty() {
                return Err(CatalogError::Validation(format!("{} is required", field)));
            }
        }

        Ok(NewHerb {
            name: self.name.trim().to_string(),
            scientific_name: optional(&self.scientific_name),
            description: self.description.trim().to_string(),
            category: self.category.trim().to_string(),
            benefits: split_list(&self.benefits),
            uses: split_list(&self.uses),
            growing_conditions: optional(&self.growing_conditions),
            medicinal_properties: optional(&self.medicinal_properties),
            culinary_uses: optional(&self.culinary_uses),
            precautions: optional(&self.precautions),
            image_url: optional(&self.image_url),
            amazon_link: optional(&self.amazon_link),
        })
    }
}

fn optional(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// Operations the client performs against the managed backend.
#[async_trait]
pub trait CatalogBackend: Send + Sync {
    /// Fetch the whole collection.
    async fn list_herbs(&self) -> Result<Vec<Herb>, CatalogError>;

    /// Fetch one herb by id.
    async fn get_herb(&self, id: &str) -> Result<Herb, CatalogError>;

    /// Insert a herb as the session's user. The backend enforces the role.
    async fn insert_herb(&self, session: &Session, herb: &NewHerb) -> Result<Herb, CatalogError>;

    /// Exchange email and password for a session.
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, CatalogError>;

    /// Exchange a refresh token for a fresh session.
    async fn refresh(&self, session: &Session) -> Result<Session, CatalogError>;

    /// Revoke the session on the backend.
    async fn sign_out(&self, session: &Session) -> Result<(), CatalogError>;

    /// Whether the session's user holds the admin role.
    async fn is_admin(&self, session: &Session) -> Result<bool, CatalogError>;
}
