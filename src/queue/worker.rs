//! Background translation worker.
//!
//! Receives jobs from a channel in submission order and starts each one as
//! soon as a concurrency permit is free. With one permit the calls run
//! strictly one after another.

use std::sync::Arc;
use tokio::sync::{mpsc, watch, Semaphore};
use tracing::{debug, info, warn};

use super::{CancelToken, OutcomeStatus, TranslationJob, TranslationOutcome};
use crate::catalog::Herb;
use crate::client::HerbTranslator;

/// Handle to the translation worker.
///
/// Dropping the handle stops the worker once queued jobs have reported.
pub struct TranslationQueue {
    job_tx: mpsc::UnboundedSender<TranslationJob>,
    generation_tx: watch::Sender<u64>,
}

impl TranslationQueue {
    /// Start the worker. Outcomes arrive on the returned receiver.
    ///
    /// `max_in_flight` is clamped to at least 1.
    pub fn spawn(
        translator: Arc<dyn HerbTranslator>,
        max_in_flight: usize,
    ) -> (Self, mpsc::UnboundedReceiver<TranslationOutcome>) {
        let (job_tx, job_rx) = mpsc::unbounded_channel();
        let (result_tx, result_rx) = mpsc::unbounded_channel();
        let (generation_tx, _) = watch::channel(0u64);

        tokio::spawn(run(translator, max_in_flight.max(1), job_rx, result_tx));

        (
            Self {
                job_tx,
                generation_tx,
            },
            result_rx,
        )
    }

    /// Current batch generation.
    pub fn generation(&self) -> u64 {
        *self.generation_tx.borrow()
    }

    fn advance(&self) -> u64 {
        self.generation_tx.send_modify(|g| *g += 1);
        self.generation()
    }

    /// Cancel the current batch and queue one job per herb for `language`.
    ///
    /// Returns the new batch's generation.
    pub fn submit_batch(&self, herbs: &[Herb], language: &str) -> u64 {
        let generation = self.advance();
        info!(
            "Queueing {} translation(s) to {} (generation {})",
            herbs.len(),
            language,
            generation
        );

        for herb in herbs {
            let job = TranslationJob {
                herb: herb.clone(),
                language: language.to_string(),
                token: CancelToken::new(generation, self.generation_tx.subscribe()),
            };
            if self.job_tx.send(job).is_err() {
                warn!("Translation worker is gone, dropping job for {}", herb.id);
            }
        }
        generation
    }

    /// Cancel the current batch without starting another.
    pub fn cancel(&self) {
        let generation = self.advance();
        debug!("Translation batch cancelled (now generation {})", generation);
    }
}

async fn run(
    translator: Arc<dyn HerbTranslator>,
    max_in_flight: usize,
    mut job_rx: mpsc::UnboundedReceiver<TranslationJob>,
    result_tx: mpsc::UnboundedSender<TranslationOutcome>,
) {
    info!("Translation worker started (max in flight: {})", max_in_flight);
    let permits = Arc::new(Semaphore::new(max_in_flight));

    while let Some(job) = job_rx.recv().await {
        // Permits are taken in submission order, so jobs start in order.
        let permit = tokio::select! {
            biased;
            _ = job.token.cancelled() => None,
            permit = permits.clone().acquire_owned() => permit.ok(),
        };

        let Some(permit) = permit.filter(|_| !job.token.is_cancelled()) else {
            report(&result_tx, &job, OutcomeStatus::Cancelled);
            continue;
        };

        let translator = Arc::clone(&translator);
        let result_tx = result_tx.clone();
        tokio::spawn(async move {
            let status = tokio::select! {
                biased;
                _ = job.token.cancelled() => OutcomeStatus::Cancelled,
                result = translator.translate(&job.herb, &job.language) => match result {
                    Ok(herb) => OutcomeStatus::Translated(herb),
                    Err(e) => OutcomeStatus::Failed(e.to_string()),
                },
            };
            // Report before releasing the permit so outcomes keep job order.
            report(&result_tx, &job, status);
            drop(permit);
        });
    }

    info!("Translation worker stopped");
}

fn report(
    result_tx: &mpsc::UnboundedSender<TranslationOutcome>,
    job: &TranslationJob,
    status: OutcomeStatus,
) {
    match &status {
        OutcomeStatus::Translated(_) => debug!("Translated {} to {}", job.herb.id, job.language),
        OutcomeStatus::Failed(e) => debug!("Translation of {} failed: {}", job.herb.id, e),
        OutcomeStatus::Cancelled => debug!("Translation of {} cancelled", job.herb.id),
    }

    let outcome = TranslationOutcome {
        herb_id: job.herb.id.clone(),
        language: job.language.clone(),
        generation: job.token.generation(),
        status,
    };
    if result_tx.send(outcome).is_err() {
        debug!("Outcome channel closed");
    }
}
