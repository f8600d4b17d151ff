//! Herb list view.

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::{TranslationCache, ViewState};
use crate::catalog::{CatalogBackend, Herb};
use crate::client::HerbTranslator;
use crate::language::{self, DEFAULT_LANGUAGE};
use crate::queue::{BatchTracker, OutcomeStatus, TranslationOutcome, TranslationQueue};

/// Category filter value that disables filtering.
pub const ALL_CATEGORIES: &str = "all";

/// Searchable, filterable list of herbs in the selected language.
///
/// Translations run on a [`TranslationQueue`]; outcomes are fed back with
/// [`apply`](Self::apply) (or [`settle`](Self::settle)) and only those of
/// the active batch are kept.
pub struct HerbListView {
    herbs: Vec<Herb>,
    language: String,
    state: ViewState,
    cache: TranslationCache,
    search: String,
    category: String,
    queue: TranslationQueue,
    outcomes: mpsc::UnboundedReceiver<TranslationOutcome>,
    tracker: BatchTracker,
}

impl HerbListView {
    /// Must be called within a tokio runtime (starts the queue worker).
    pub fn new(translator: Arc<dyn HerbTranslator>, max_in_flight: usize) -> Self {
        let (queue, outcomes) = TranslationQueue::spawn(translator, max_in_flight);
        Self {
            herbs: Vec::new(),
            language: DEFAULT_LANGUAGE.to_string(),
            state: ViewState::Idle,
            cache: TranslationCache::new(),
            search: String::new(),
            category: ALL_CATEGORIES.to_string(),
            queue,
            outcomes,
            tracker: BatchTracker::new(),
        }
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    /// Generation of the batch whose outcomes are being accepted.
    pub fn batch_generation(&self) -> Option<u64> {
        self.tracker.generation()
    }

    /// Herbs of the active batch shown untranslated because their call failed.
    pub fn failed_translations(&self) -> usize {
        self.tracker.failed()
    }

    /// Original records, in catalog order.
    pub fn herbs(&self) -> &[Herb] {
        &self.herbs
    }

    /// Fetch the collection once. A failure leaves the list empty.
    pub async fn load(&mut self, catalog: &dyn CatalogBackend) {
        self.state = ViewState::Loading;
        self.tracker.clear();
        self.queue.cancel();
        self.cache.clear();

        match catalog.list_herbs().await {
            Ok(herbs) => {
                info!("Loaded {} herb(s)", herbs.len());
                self.herbs = herbs;
                self.state = ViewState::Loaded;
                self.start_translation();
            }
            Err(e) => {
                error!("Failed to load herbs: {}", e);
                self.herbs.clear();
                self.state = ViewState::Error("Failed to load herbs".to_string());
            }
        }
    }

    /// Switch the active language. The previous overlay is discarded.
    pub fn set_language(&mut self, language: &str) {
        let language = language.trim();
        if language.is_empty() {
            return;
        }

        debug!("Language changed: {} -> {}", self.language, language);
        self.language = language.to_string();
        self.cache.clear();
        self.tracker.clear();
        self.queue.cancel();

        if matches!(self.state, ViewState::Translating | ViewState::Translated) {
            self.state = ViewState::Loaded;
        }
        self.start_translation();
    }

    fn start_translation(&mut self) {
        if self.state != ViewState::Loaded
            || self.herbs.is_empty()
            || language::is_default(&self.language)
        {
            return;
        }

        let generation = self.queue.submit_batch(&self.herbs, &self.language);
        self.tracker
            .start(generation, &self.language, self.herbs.len());
        self.state = ViewState::Translating;
    }

    /// Feed one queue outcome into the view.
    ///
    /// Returns false if the outcome was stale and discarded.
    pub fn apply(&mut self, outcome: TranslationOutcome) -> bool {
        if !self.tracker.record(&outcome) {
            debug!(
                "Discarding stale translation of {} ({}, generation {})",
                outcome.herb_id, outcome.language, outcome.generation
            );
            return false;
        }

        match outcome.status {
            OutcomeStatus::Translated(herb) => {
                self.cache.insert(&outcome.herb_id, &outcome.language, herb)
            }
            OutcomeStatus::Failed(message) => {
                warn!(
                    "Translation of {} failed, showing original: {}",
                    outcome.herb_id, message
                );
            }
            OutcomeStatus::Cancelled => {}
        }

        if self.tracker.is_complete() && self.state == ViewState::Translating {
            info!(
                "Translated {} of {} herb(s) to {} ({} failed)",
                self.cache.len(),
                self.herbs.len(),
                self.language,
                self.tracker.failed()
            );
            self.state = ViewState::Translated;
        }
        true
    }

    /// Wait until the active batch has fully reported.
    pub async fn settle(&mut self) {
        while self.tracker.pending() > 0 {
            match self.outcomes.recv().await {
                Some(outcome) => {
                    self.apply(outcome);
                }
                None => break,
            }
        }
    }

    pub fn set_search(&mut self, query: &str) {
        self.search = query.trim().to_string();
    }

    /// `all` (or an empty string) disables the filter.
    pub fn set_category(&mut self, category: &str) {
        let category = category.trim();
        self.category = if category.is_empty() {
            ALL_CATEGORIES.to_string()
        } else {
            category.to_string()
        };
    }

    /// The record to display for `herb` in the active language.
    pub fn display<'a>(&'a self, herb: &'a Herb) -> &'a Herb {
        if language::is_default(&self.language) {
            return herb;
        }
        self.cache.get(&herb.id, &self.language).unwrap_or(herb)
    }

    fn active_records(&self) -> impl Iterator<Item = &Herb> {
        self.herbs.iter().map(|herb| self.display(herb))
    }

    /// Records passing the search and category filters, in catalog order.
    pub fn visible(&self) -> Vec<&Herb> {
        let filter_category = !self.category.eq_ignore_ascii_case(ALL_CATEGORIES);
        self.active_records()
            .filter(|herb| self.search.is_empty() || herb.matches_query(&self.search))
            .filter(|herb| !filter_category || herb.in_category(&self.category))
            .collect()
    }

    /// `all` followed by the distinct lowercased categories, first seen first.
    pub fn categories(&self) -> Vec<String> {
        let mut categories = vec![ALL_CATEGORIES.to_string()];
        for herb in self.active_records() {
            let category = herb.category.to_lowercase();
            if !categories.contains(&category) {
                categories.push(category);
            }
        }
        categories
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::fakes::{herb, FakeCatalog, TagTranslator};
    use std::sync::atomic::Ordering;

    fn catalog() -> FakeCatalog {
        FakeCatalog {
            herbs: Ok(vec![
                herb("1", "Tulsi", "Medicinal"),
                herb("2", "Mint", "Culinary"),
                herb("3", "Neem", "medicinal"),
            ]),
        }
    }

    fn names(view: &HerbListView) -> Vec<String> {
        view.visible().iter().map(|h| h.name.clone()).collect()
    }

    // ===== Loading =====

    #[tokio::test]
    async fn test_load_success() {
        let translator = Arc::new(TagTranslator::default());
        let mut view = HerbListView::new(translator.clone(), 1);
        assert_eq!(view.state(), &ViewState::Idle);

        view.load(&catalog()).await;
        assert_eq!(view.state(), &ViewState::Loaded);
        assert_eq!(view.herbs().len(), 3);
        assert_eq!(translator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_load_failure_sets_notice() {
        let mut view = HerbListView::new(Arc::new(TagTranslator::default()), 1);
        view.load(&FakeCatalog {
            herbs: Err("database down".to_string()),
        })
        .await;

        assert!(matches!(view.state(), ViewState::Error(_)));
        assert!(view.visible().is_empty());
    }

    // ===== Translation =====

    #[tokio::test]
    async fn test_partial_failure_falls_back_to_original() {
        let translator = Arc::new(TagTranslator {
            fail_ids: vec!["2".to_string()],
            ..Default::default()
        });
        let mut view = HerbListView::new(translator.clone(), 1);
        view.load(&catalog()).await;

        view.set_language("hi");
        assert_eq!(view.state(), &ViewState::Translating);
        view.settle().await;

        assert_eq!(view.state(), &ViewState::Translated);
        assert_eq!(translator.calls.load(Ordering::SeqCst), 3);
        assert_eq!(names(&view), vec!["[hi] Tulsi", "Mint", "[hi] Neem"]);
        assert_eq!(view.failed_translations(), 1);
    }

    #[tokio::test]
    async fn test_switch_back_to_default_makes_no_call() {
        let translator = Arc::new(TagTranslator::default());
        let mut view = HerbListView::new(translator.clone(), 1);
        view.load(&catalog()).await;

        view.set_language("fr");
        view.settle().await;
        let calls = translator.calls.load(Ordering::SeqCst);

        view.set_language("en");
        assert_eq!(view.state(), &ViewState::Loaded);
        assert_eq!(names(&view), vec!["Tulsi", "Mint", "Neem"]);
        assert_eq!(translator.calls.load(Ordering::SeqCst), calls);
    }

    #[tokio::test]
    async fn test_language_before_load_translates_after_load() {
        let translator = Arc::new(TagTranslator::default());
        let mut view = HerbListView::new(translator.clone(), 1);
        view.set_language("ta");
        assert_eq!(view.state(), &ViewState::Idle);

        view.load(&catalog()).await;
        assert_eq!(view.state(), &ViewState::Translating);
        view.settle().await;
        assert_eq!(view.visible()[0].name, "[ta] Tulsi");
    }

    #[tokio::test]
    async fn test_empty_collection_makes_no_call() {
        let translator = Arc::new(TagTranslator::default());
        let mut view = HerbListView::new(translator.clone(), 1);
        view.load(&FakeCatalog { herbs: Ok(vec![]) }).await;

        view.set_language("hi");
        view.settle().await;
        assert_eq!(view.state(), &ViewState::Loaded);
        assert_eq!(translator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_stale_outcome_is_discarded() {
        let mut view = HerbListView::new(Arc::new(TagTranslator::default()), 1);
        view.load(&catalog()).await;

        view.set_language("hi");
        let hindi_batch = view.batch_generation().unwrap();
        view.set_language("es");
        assert_ne!(view.batch_generation(), Some(hindi_batch));

        // A late Hindi result from the superseded batch
        let stale = TranslationOutcome {
            herb_id: "1".to_string(),
            language: "hi".to_string(),
            generation: hindi_batch,
            status: OutcomeStatus::Translated(herb("1", "तुलसी", "औषधीय")),
        };
        assert!(!view.apply(stale));

        view.settle().await;
        assert_eq!(view.language(), "es");
        assert_eq!(names(&view), vec!["[es] Tulsi", "[es] Mint", "[es] Neem"]);
    }

    // ===== Filtering =====

    #[tokio::test]
    async fn test_search_and_category_filter() {
        let mut view = HerbListView::new(Arc::new(TagTranslator::default()), 1);
        view.load(&catalog()).await;

        view.set_search("NEEM");
        assert_eq!(names(&view), vec!["Neem"]);

        view.set_search("about");
        view.set_category("MEDICINAL");
        assert_eq!(names(&view), vec!["Tulsi", "Neem"]);

        view.set_category("all");
        assert_eq!(view.visible().len(), 3);
    }

    #[tokio::test]
    async fn test_filters_read_translated_records() {
        let mut view = HerbListView::new(Arc::new(TagTranslator::default()), 1);
        view.load(&catalog()).await;
        view.set_language("hi");
        view.settle().await;

        view.set_category("medicinal-hi");
        assert_eq!(names(&view), vec!["[hi] Tulsi", "[hi] Neem"]);

        view.set_category("all");
        view.set_search("[hi] mint");
        assert_eq!(names(&view), vec!["[hi] Mint"]);
    }

    #[tokio::test]
    async fn test_categories_first_seen_order() {
        let mut view = HerbListView::new(Arc::new(TagTranslator::default()), 1);
        view.load(&catalog()).await;
        assert_eq!(view.categories(), vec!["all", "medicinal", "culinary"]);
    }
}
