//! Client-side orchestration of the catalog views.
//!
//! A view loads herbs from the catalog, keeps a per-language overlay of
//! translated records and answers "what should be displayed right now".
//! Failures never escape a view: they become a notice or fall back to the
//! original record.

mod detail;
mod list;

pub use detail::HerbDetailView;
pub use list::{HerbListView, ALL_CATEGORIES};

use std::collections::HashMap;

use crate::catalog::Herb;

/// Lifecycle of a view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewState {
    Idle,
    Loading,
    Loaded,
    /// Loading failed; holds the notice shown to the user
    Error(String),
    Translating,
    Translated,
}

/// Translated records keyed by (herb id, language).
///
/// Lives only as long as the current language selection.
#[derive(Debug, Default)]
pub struct TranslationCache {
    entries: HashMap<(String, String), Herb>,
}

impl TranslationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, herb_id: &str, language: &str, herb: Herb) {
        self.entries
            .insert((herb_id.to_string(), language.to_string()), herb);
    }

    pub fn get(&self, herb_id: &str, language: &str) -> Option<&Herb> {
        self.entries
            .get(&(herb_id.to_string(), language.to_string()))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
