//! Herbgarden library exports for the binary, integration tests and fuzzing.
//!
//! - [`proxy`]: credential-injecting proxies for identification and translation
//! - [`api`]: the HTTP server in front of the proxies
//! - [`client`], [`queue`], [`view`]: client-side orchestration
//! - [`catalog`]: herb records and the managed backend that stores them

pub mod api;
pub mod catalog;
pub mod client;
pub mod config;
pub mod language;
pub mod proxy;
pub mod queue;
pub mod secrets;
pub mod upstream;
pub mod view;

// Re-export commonly used types for convenience
pub use catalog::Herb;
pub use config::Config;
pub use proxy::{extract_json_object, IdentificationProxy, ProxyError, TranslationProxy};
