//! Translation queue for async processing.
//!
//! Decouples the views from the translation calls:
//! - Jobs run on a background worker with a bounded number in flight
//! - Each batch has a generation; submitting a new batch cancels the old one
//! - Every job reports exactly one outcome, tagged so stale ones can be dropped

pub mod worker;

pub use worker::TranslationQueue;

use crate::catalog::Herb;
use tokio::sync::watch;

/// Cancellation handle bound to one batch generation.
///
/// The token is cancelled as soon as the queue moves to a later generation.
#[derive(Debug, Clone)]
pub struct CancelToken {
    generation: u64,
    current: watch::Receiver<u64>,
}

impl CancelToken {
    pub(crate) fn new(generation: u64, current: watch::Receiver<u64>) -> Self {
        Self {
            generation,
            current,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_cancelled(&self) -> bool {
        *self.current.borrow() != self.generation
    }

    /// Resolve once the token is cancelled or the queue is gone.
    pub async fn cancelled(&self) {
        let mut current = self.current.clone();
        let generation = self.generation;
        let _ = current.wait_for(|g| *g != generation).await;
    }
}

/// A job to be processed by the translation worker.
#[derive(Debug)]
pub struct TranslationJob {
    pub herb: Herb,
    pub language: String,
    pub token: CancelToken,
}

/// How a job ended.
#[derive(Debug, Clone, PartialEq)]
pub enum OutcomeStatus {
    Translated(Herb),
    Failed(String),
    Cancelled,
}

/// Result of one job.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslationOutcome {
    pub herb_id: String,
    /// Language the job was issued for
    pub language: String,
    /// Batch the job belonged to
    pub generation: u64,
    pub status: OutcomeStatus,
}

#[derive(Debug)]
struct Batch {
    generation: u64,
    language: String,
    expected: usize,
    reported: usize,
    failed: usize,
}

/// Tracks the outcomes of the active batch.
///
/// Outcomes from any other generation or language are rejected, which is
/// what keeps a late response from overwriting a newer selection.
#[derive(Debug, Default)]
pub struct BatchTracker {
    active: Option<Batch>,
}

impl BatchTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a batch of `expected` jobs. Replaces any previous batch.
    pub fn start(&mut self, generation: u64, language: &str, expected: usize) {
        self.active = Some(Batch {
            generation,
            language: language.to_string(),
            expected,
            reported: 0,
            failed: 0,
        });
    }

    /// Stop tracking. Every later outcome is stale.
    pub fn clear(&mut self) {
        self.active = None;
    }

    pub fn generation(&self) -> Option<u64> {
        self.active.as_ref().map(|b| b.generation)
    }

    /// Whether `outcome` belongs to the active batch.
    pub fn accepts(&self, outcome: &TranslationOutcome) -> bool {
        self.active.as_ref().is_some_and(|batch| {
            batch.generation == outcome.generation
                && batch.language == outcome.language
                && batch.reported < batch.expected
        })
    }

    /// Count `outcome` against the active batch. Returns false if it is stale.
    pub fn record(&mut self, outcome: &TranslationOutcome) -> bool {
        if !self.accepts(outcome) {
            return false;
        }
        if let Some(batch) = self.active.as_mut() {
            batch.reported += 1;
            if matches!(outcome.status, OutcomeStatus::Failed(_)) {
                batch.failed += 1;
            }
        }
        true
    }

    /// True once every job of the active batch has reported.
    pub fn is_complete(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|b| b.reported >= b.expected)
    }

    /// Jobs of the active batch still outstanding.
    pub fn pending(&self) -> usize {
        self.active
            .as_ref()
            .map_or(0, |b| b.expected.saturating_sub(b.reported))
    }

    /// Failed jobs in the active batch.
    pub fn failed(&self) -> usize {
        self.active.as_ref().map_or(0, |b| b.failed)
    }
}
