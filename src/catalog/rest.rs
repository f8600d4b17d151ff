//! HTTP client for the managed catalog backend.
//!
//! Talks to a PostgREST table API under `/rest/v1` and a token-based auth
//! API under `/auth/v1`. Every request carries the project's public key in
//! the `apikey` header; row-level security on the backend decides what each
//! bearer token may read or write.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info};

use super::session::{Session, User};
use super::{CatalogBackend, CatalogError, Herb, NewHerb};

const HERBS_TABLE: &str = "herbs";
const ROLES_TABLE: &str = "user_roles";
const ADMIN_ROLE: &str = "admin";

/// Token endpoint response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
    user: User,
}

impl From<TokenResponse> for Session {
    fn from(token: TokenResponse) -> Self {
        Session {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_at: Utc::now() + ChronoDuration::seconds(token.expires_in),
            user: token.user,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RoleRow {
    role: String,
}

/// Catalog backend reached over its REST API.
pub struct RestCatalog {
    client: Client,
    base_url: String,
    anon_key: String,
}

impl RestCatalog {
    /// Create a client for the project at `base_url`.
    ///
    /// The anon key should already be resolved (not a keyring: reference).
    pub fn new(base_url: &str, anon_key: &str, timeout_secs: u32) -> Result<Self, CatalogError> {
        if anon_key.trim().is_empty() {
            return Err(CatalogError::Config("catalog anon_key is required".to_string()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs as u64))
            .build()
            .map_err(|e| CatalogError::Config(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
        })
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    /// Attach the project key and a bearer token (anon key when signed out).
    fn authorized(&self, request: RequestBuilder, bearer: Option<&str>) -> RequestBuilder {
        request
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer.unwrap_or(self.anon_key.as_str()))
    }

    /// Turn a non-success response into a backend error.
    async fn check(response: Response) -> Result<Response, CatalogError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| {
                ["message", "error_description", "msg", "error"]
                    .iter()
                    .find_map(|key| v.get(*key).and_then(|m| m.as_str()).map(str::to_string))
            })
            .unwrap_or(body);

        match status.as_u16() {
            401 | 403 => Err(CatalogError::Auth(message)),
            code => Err(CatalogError::Backend {
                status: code,
                message,
            }),
        }
    }

    async fn token(&self, grant_type: &str, body: serde_json::Value) -> Result<Session, CatalogError> {
        let response = self
            .authorized(
                self.client
                    .post(self.auth_url("token"))
                    .query(&[("grant_type", grant_type)]),
                None,
            )
            .json(&body)
            .send()
            .await?;

        // The token endpoint answers bad credentials with 400
        let response = Self::check(response).await.map_err(|e| match e {
            CatalogError::Backend {
                status: 400,
                message,
            } => CatalogError::Auth(message),
            other => other,
        })?;

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| CatalogError::InvalidResponse(e.to_string()))?;
        Ok(token.into())
    }
}

#[async_trait]
impl CatalogBackend for RestCatalog {
    async fn list_herbs(&self) -> Result<Vec<Herb>, CatalogError> {
        let response = self
            .authorized(
                self.client
                    .get(self.rest_url(HERBS_TABLE))
                    .query(&[("select", "*")]),
                None,
            )
            .send()
            .await?;

        let herbs: Vec<Herb> = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| CatalogError::InvalidResponse(e.to_string()))?;

        debug!("Fetched {} herbs", herbs.len());
        Ok(herbs)
    }

    async fn get_herb(&self, id: &str) -> Result<Herb, CatalogError> {
        let filter = format!("eq.{}", id);
        let response = self
            .authorized(
                self.client
                    .get(self.rest_url(HERBS_TABLE))
                    .query(&[("select", "*"), ("id", filter.as_str())]),
                None,
            )
            .send()
            .await?;

        let mut rows: Vec<Herb> = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| CatalogError::InvalidResponse(e.to_string()))?;

        match rows.len() {
            0 => Err(CatalogError::NotFound(id.to_string())),
            1 => Ok(rows.remove(0)),
            n => Err(CatalogError::InvalidResponse(format!(
                "expected one herb with id {}, got {}",
                id, n
            ))),
        }
    }

    async fn insert_herb(&self, session: &Session, herb: &NewHerb) -> Result<Herb, CatalogError> {
        let response = self
            .authorized(
                self.client.post(self.rest_url(HERBS_TABLE)),
                Some(session.access_token.as_str()),
            )
            .header("Prefer", "return=representation")
            .json(herb)
            .send()
            .await?;

        let mut rows: Vec<Herb> = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| CatalogError::InvalidResponse(e.to_string()))?;

        if rows.is_empty() {
            return Err(CatalogError::InvalidResponse(
                "insert returned no rows".to_string(),
            ));
        }
        let inserted = rows.remove(0);
        info!("Added herb '{}' ({})", inserted.name, inserted.id);
        Ok(inserted)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, CatalogError> {
        self.token("password", json!({ "email": email, "password": password }))
            .await
    }

    async fn refresh(&self, session: &Session) -> Result<Session, CatalogError> {
        self.token(
            "refresh_token",
            json!({ "refresh_token": session.refresh_token }),
        )
        .await
    }

    async fn sign_out(&self, session: &Session) -> Result<(), CatalogError> {
        let response = self
            .authorized(
                self.client.post(self.auth_url("logout")),
                Some(session.access_token.as_str()),
            )
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn is_admin(&self, session: &Session) -> Result<bool, CatalogError> {
        let user_filter = format!("eq.{}", session.user.id);
        let role_filter = format!("eq.{}", ADMIN_ROLE);
        let response = self
            .authorized(
                self.client.get(self.rest_url(ROLES_TABLE)).query(&[
                    ("select", "role"),
                    ("user_id", user_filter.as_str()),
                    ("role", role_filter.as_str()),
                ]),
                Some(session.access_token.as_str()),
            )
            .send()
            .await?;

        let rows: Vec<RoleRow> = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| CatalogError::InvalidResponse(e.to_string()))?;

        Ok(rows.iter().any(|r| r.role == ADMIN_ROLE))
    }
}
