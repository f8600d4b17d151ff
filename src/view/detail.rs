//! Single-herb detail view.

use tracing::{debug, error, warn};

use super::ViewState;
use crate::catalog::{CatalogBackend, CatalogError, Herb};
use crate::client::HerbTranslator;
use crate::language::{self, DEFAULT_LANGUAGE};

/// One herb, shown in the selected language.
///
/// Translation is a single awaited call per language change, so there is no
/// queue here.
pub struct HerbDetailView {
    herb: Option<Herb>,
    overlay: Option<Herb>,
    language: String,
    state: ViewState,
}

impl Default for HerbDetailView {
    fn default() -> Self {
        Self {
            herb: None,
            overlay: None,
            language: DEFAULT_LANGUAGE.to_string(),
            state: ViewState::Idle,
        }
    }
}

impl HerbDetailView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    /// Fetch the herb with `id`. Call [`set_language`](Self::set_language)
    /// afterwards to show it in a non-default language.
    pub async fn load(&mut self, catalog: &dyn CatalogBackend, id: &str) {
        self.state = ViewState::Loading;
        self.overlay = None;

        match catalog.get_herb(id).await {
            Ok(herb) => {
                self.herb = Some(herb);
                self.state = ViewState::Loaded;
            }
            Err(e) => {
                error!("Failed to load herb {}: {}", id, e);
                self.herb = None;
                let notice = match e {
                    CatalogError::NotFound(_) => "Herb not found",
                    _ => "Failed to load herb details",
                };
                self.state = ViewState::Error(notice.to_string());
            }
        }
    }

    /// Switch language, translating the loaded herb when it is non-default.
    ///
    /// A failed translation keeps the original on display.
    pub async fn set_language(&mut self, language: &str, translator: &dyn HerbTranslator) {
        self.language = language.trim().to_string();
        self.overlay = None;

        let Some(herb) = &self.herb else {
            return;
        };
        if language::is_default(&self.language) {
            self.state = ViewState::Loaded;
            return;
        }

        self.state = ViewState::Translating;
        debug!("Translating herb {} to {}", herb.id, self.language);

        match translator.translate(herb, &self.language).await {
            Ok(translated) => {
                self.overlay = Some(translated);
                self.state = ViewState::Translated;
            }
            Err(e) => {
                warn!("Translation of {} failed, showing original: {}", herb.id, e);
                self.state = ViewState::Loaded;
            }
        }
    }

    /// Overlay if present, else the original.
    pub fn display(&self) -> Option<&Herb> {
        self.overlay.as_ref().or(self.herb.as_ref())
    }
}
