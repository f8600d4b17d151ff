use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::language;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to find config directory")]
    NoConfigDir,

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    /// Proxy server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Plant identification upstream
    #[serde(default)]
    pub identification: IdentificationConfig,

    /// Language model upstream used for translation
    #[serde(default)]
    pub translation: TranslationConfig,

    /// Managed catalog backend and proxy endpoint used by client commands
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Translation queue settings
    #[serde(default)]
    pub queue: QueueConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Proxy server configuration.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerConfig {
    /// Bind address (default: 127.0.0.1:8787 - localhost only)
    #[serde(default = "default_bind")]
    pub bind: String,

    /// API key hash (SHA-256) required on proxy routes.
    /// Generate with: `herbgarden api-key generate`
    #[serde(default)]
    pub api_key_hash: Option<String>,

    /// Enable Swagger UI at /swagger-ui/
    #[serde(default = "default_true")]
    pub swagger_ui: bool,

    /// Allowed CORS origins ("*" = any origin, empty = same-origin only)
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            api_key_hash: None,
            swagger_ui: true,
            cors_origins: default_cors_origins(),
        }
    }
}

/// Plant identification API settings.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct IdentificationConfig {
    /// Identify endpoint URL
    #[serde(default = "default_identification_url")]
    pub url: String,

    /// Environment variable holding the API key
    #[serde(default = "default_identification_key_env")]
    pub api_key_env: String,

    /// Language for common names and descriptions in the result
    #[serde(default = "default_plant_language")]
    pub plant_language: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

impl Default for IdentificationConfig {
    fn default() -> Self {
        Self {
            url: default_identification_url(),
            api_key_env: default_identification_key_env(),
            plant_language: default_plant_language(),
            timeout_secs: default_timeout(),
        }
    }
}

/// OpenAI-compatible chat completion settings for translation.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TranslationConfig {
    /// Base URL (override for compatible gateways)
    #[serde(default = "default_translation_base_url")]
    pub base_url: String,

    /// Model name
    #[serde(default = "default_translation_model")]
    pub model: String,

    /// Environment variable holding the API key
    #[serde(default = "default_translation_key_env")]
    pub api_key_env: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            base_url: default_translation_base_url(),
            model: default_translation_model(),
            api_key_env: default_translation_key_env(),
            timeout_secs: default_timeout(),
        }
    }
}

/// Catalog backend settings for the client commands.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CatalogConfig {
    /// Backend project URL (REST and auth live under it)
    #[serde(default = "default_catalog_url")]
    pub url: String,

    /// Public (anon) key (supports "keyring:" prefix)
    #[serde(default)]
    pub anon_key: String,

    /// Base URL of the herbgarden proxy server
    #[serde(default = "default_proxy_url")]
    pub proxy_url: String,

    /// Key sent to the proxy when it requires one (supports "keyring:" prefix)
    #[serde(default)]
    pub proxy_api_key: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            url: default_catalog_url(),
            anon_key: String::new(),
            proxy_url: default_proxy_url(),
            proxy_api_key: None,
            timeout_secs: default_timeout(),
        }
    }
}

/// Translation queue configuration.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct QueueConfig {
    /// Maximum translation calls in flight (1 = strictly sequential)
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_in_flight: default_max_in_flight(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,

    /// Directory for daily rolling log files (stderr only when unset)
    #[serde(default)]
    pub directory: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            directory: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_bind() -> String {
    "127.0.0.1:8787".to_string()
}

fn default_true() -> bool {
    true
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_identification_url() -> String {
    "https://api.plant.id/v2/identify".to_string()
}

fn default_identification_key_env() -> String {
    "PLANT_ID_API_KEY".to_string()
}

fn default_plant_language() -> String {
    language::DEFAULT_LANGUAGE.to_string()
}

fn default_timeout() -> u32 {
    60
}

fn default_translation_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_translation_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_translation_key_env() -> String {
    "TRANSLATION_API_KEY".to_string()
}

fn default_catalog_url() -> String {
    "http://127.0.0.1:54321".to_string()
}

fn default_proxy_url() -> String {
    "http://127.0.0.1:8787".to_string()
}

fn default_max_in_flight() -> usize {
    1
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        ProjectDirs::from("com", "herbgarden", "herbgarden")
            .map(|dirs| dirs.config_dir().to_path_buf())
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Get the config file path
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load config from a file, or create it with defaults if not exists
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let contents = fs::read_to_string(path)?;
            let config: Config = toml::from_str(&contents)?;
            config.validate()?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.bind.parse::<SocketAddr>().is_err() {
            return Err(ConfigError::ValidationError(format!(
                "server bind address '{}' is not a valid socket address",
                self.server.bind
            )));
        }

        for (name, url) in [
            ("identification url", &self.identification.url),
            ("translation base_url", &self.translation.base_url),
            ("catalog url", &self.catalog.url),
            ("catalog proxy_url", &self.catalog.proxy_url),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::ValidationError(format!(
                    "{} must start with http:// or https://",
                    name
                )));
            }
        }

        for (name, secs) in [
            ("identification timeout_secs", self.identification.timeout_secs),
            ("translation timeout_secs", self.translation.timeout_secs),
            ("catalog timeout_secs", self.catalog.timeout_secs),
        ] {
            if secs == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "{} must be positive",
                    name
                )));
            }
        }

        if self.identification.api_key_env.trim().is_empty()
            || self.translation.api_key_env.trim().is_empty()
        {
            return Err(ConfigError::ValidationError(
                "api_key_env cannot be empty".into(),
            ));
        }

        if !(1..=16).contains(&self.queue.max_in_flight) {
            return Err(ConfigError::ValidationError(
                "queue max_in_flight must be between 1 and 16".into(),
            ));
        }

        Ok(())
    }

    /// Save config to a file
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        // Create config directory if needed
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;

        info!("Config saved to: {}", path.display());
        Ok(())
    }
}

/// Show current configuration
pub fn show(path: &Path) -> anyhow::Result<()> {
    let config = Config::load_from(path)?;

    println!("Config file: {}\n", path.display());
    println!("{}", toml::to_string_pretty(&config)?);

    Ok(())
}
