//! Shared state for the proxy handlers.

use std::sync::Arc;

use crate::proxy::{IdentificationProxy, TranslationProxy};

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub identification: Arc<IdentificationProxy>,
    pub translation: Arc<TranslationProxy>,
    /// API key hash for authentication (SHA-256 hex)
    pub api_key_hash: Option<String>,
}

impl ApiState {
    /// Create new API state.
    pub fn new(
        identification: Arc<IdentificationProxy>,
        translation: Arc<TranslationProxy>,
        api_key_hash: Option<String>,
    ) -> Self {
        Self {
            identification,
            translation,
            api_key_hash,
        }
    }
}
