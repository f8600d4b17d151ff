//! Upstream credentials.
//!
//! The proxies read their API keys from the environment on every request,
//! so a key can be rotated without restarting the server and a missing key
//! fails only the request that needed it. An environment value of the form
//! `keyring:<name>` is looked up in the platform credential manager:
//! - Linux: Secret Service (GNOME Keyring, KWallet)
//! - macOS: Keychain
//! - Windows: Credential Manager

use async_trait::async_trait;
use keyring::Entry;
use std::collections::HashMap;
use thiserror::Error;
use tracing::{info, warn};

/// Keyring service the entries are filed under.
const KEYRING_SERVICE: &str = "herbgarden";

/// Prefix marking a value as a keyring reference.
const KEYRING_PREFIX: &str = "keyring:";

#[derive(Error, Debug)]
pub enum SecretError {
    #[error("Secret '{0}' not found")]
    NotFound(String),

    #[error("Keyring error: {0}")]
    Keyring(String),

    #[error("Could not read secret: {0}")]
    Prompt(#[from] std::io::Error),
}

fn keyring_error(name: &str, err: keyring::Error) -> SecretError {
    match err {
        keyring::Error::NoEntry => SecretError::NotFound(name.to_string()),
        other => SecretError::Keyring(other.to_string()),
    }
}

/// Named secrets in the platform credential manager.
#[derive(Debug, Clone)]
pub struct SecretStore {
    service: &'static str,
}

impl SecretStore {
    pub fn new() -> Self {
        Self {
            service: KEYRING_SERVICE,
        }
    }

    fn entry(&self, name: &str) -> Result<Entry, SecretError> {
        Entry::new(self.service, name).map_err(|e| keyring_error(name, e))
    }

    pub fn set(&self, name: &str, value: &str) -> Result<(), SecretError> {
        self.entry(name)?
            .set_password(value)
            .map_err(|e| keyring_error(name, e))?;
        info!("Stored keyring secret '{}'", name);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<String, SecretError> {
        self.entry(name)?
            .get_password()
            .map_err(|e| keyring_error(name, e))
    }

    pub fn delete(&self, name: &str) -> Result<(), SecretError> {
        self.entry(name)?
            .delete_credential()
            .map_err(|e| keyring_error(name, e))?;
        info!("Removed keyring secret '{}'", name);
        Ok(())
    }

    /// Whether a keyring backend can be opened at all.
    pub fn is_available() -> bool {
        Entry::new(KEYRING_SERVICE, "availability-check").is_ok()
    }
}

impl Default for SecretStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Expand a `keyring:<name>` reference; any other value is returned unchanged.
pub fn resolve_secret(value: &str, store: &SecretStore) -> Result<String, SecretError> {
    match value.strip_prefix(KEYRING_PREFIX) {
        Some(name) => store.get(name),
        None => Ok(value.to_string()),
    }
}

/// Source of named credentials.
///
/// Returns `None` when the credential is absent or blank. Called on every
/// proxied request, so implementations must not block the runtime.
#[async_trait]
pub trait SecretResolver: Send + Sync {
    async fn resolve(&self, name: &str) -> Option<String>;
}

/// Reads credentials from environment variables.
#[derive(Default)]
pub struct EnvSecrets {
    store: SecretStore,
}

impl EnvSecrets {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SecretResolver for EnvSecrets {
    async fn resolve(&self, name: &str) -> Option<String> {
        let raw = std::env::var(name).ok()?;
        let raw = raw.trim().to_string();

        let resolved = if raw.starts_with(KEYRING_PREFIX) {
            // Keyring backends talk D-Bus or the Keychain synchronously
            let store = self.store.clone();
            match tokio::task::spawn_blocking(move || resolve_secret(&raw, &store)).await {
                Ok(result) => result,
                Err(e) => {
                    warn!("Keyring lookup for {} did not complete: {}", name, e);
                    return None;
                }
            }
        } else {
            Ok(raw)
        };

        match resolved {
            Ok(value) if !value.trim().is_empty() => Some(value.trim().to_string()),
            Ok(_) => None,
            Err(e) => {
                warn!("Failed to resolve credential {}: {}", name, e);
                None
            }
        }
    }
}

/// Fixed credentials, for embedding and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticSecrets {
    values: HashMap<String, String>,
}

impl StaticSecrets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: &str) -> Self {
        self.values.insert(name.to_string(), value.to_string());
        self
    }
}

#[async_trait]
impl SecretResolver for StaticSecrets {
    async fn resolve(&self, name: &str) -> Option<String> {
        self.values
            .get(name)
            .filter(|v| !v.trim().is_empty())
            .cloned()
    }
}

/// Read a value from the terminal without echoing it.
pub fn prompt_secret(prompt: &str) -> Result<String, SecretError> {
    Ok(rpassword::prompt_password(prompt)?)
}

/// `herbgarden secret ...` subcommands.
pub mod cli {
    use super::*;

    pub fn handle_set(name: &str) -> anyhow::Result<()> {
        let value = prompt_secret(&format!("Value for '{}': ", name))?;
        if value.trim().is_empty() {
            anyhow::bail!("Refusing to store an empty secret");
        }
        SecretStore::new().set(name, value.trim())?;
        println!("Saved '{}'. Use {}{} in the environment or config.", name, KEYRING_PREFIX, name);
        Ok(())
    }

    pub fn handle_delete(name: &str) -> anyhow::Result<()> {
        SecretStore::new().delete(name)?;
        println!("Removed '{}'.", name);
        Ok(())
    }

    pub fn handle_check() -> anyhow::Result<()> {
        if !SecretStore::is_available() {
            anyhow::bail!("No keyring backend is available");
        }
        println!("Keyring backend is available.");
        Ok(())
    }
}
