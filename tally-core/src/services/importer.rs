//! Batch importer - submits candidates to the ledger in sequential batches

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::domain::result::{Error, Result};
use crate::domain::{CandidateTransaction, CreateTransactionRequest};
use crate::ports::BatchCreate;
use crate::services::classifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportState {
    Waiting,
    Importing,
    Imported,
}

/// Called with every new progress value, starting with the number of rows
/// rejected before submission
pub type ProgressListener = Box<dyn FnMut(usize) + Send>;

/// One import run over a fixed set of candidates.
///
/// `Waiting -> Importing -> Imported`. An importer runs once; retrying means
/// building a new one over the same candidates.
pub struct Importer {
    ledger: Arc<dyn BatchCreate>,
    candidates: Vec<CandidateTransaction>,
    batch_size: usize,
    listener: Option<ProgressListener>,
    state: ImportState,
    progress: usize,
    succeeded: Vec<CreateTransactionRequest>,
    failed: Vec<CreateTransactionRequest>,
    duplicate: Vec<CreateTransactionRequest>,
}

impl Importer {
    pub fn new(ledger: Arc<dyn BatchCreate>, candidates: Vec<CandidateTransaction>, batch_size: usize) -> Self {
        Self {
            ledger,
            candidates,
            batch_size: batch_size.max(1),
            listener: None,
            state: ImportState::Waiting,
            progress: 0,
            succeeded: Vec::new(),
            failed: Vec::new(),
            duplicate: Vec::new(),
        }
    }

    pub fn with_listener(mut self, listener: ProgressListener) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn state(&self) -> ImportState {
        self.state
    }

    pub fn progress(&self) -> usize {
        self.progress
    }

    /// Number of candidates this run covers
    pub fn total(&self) -> usize {
        self.candidates.len()
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn succeeded(&self) -> &[CreateTransactionRequest] {
        &self.succeeded
    }

    pub fn failed(&self) -> &[CreateTransactionRequest] {
        &self.failed
    }

    pub fn duplicate(&self) -> &[CreateTransactionRequest] {
        &self.duplicate
    }

    /// Run the import.
    ///
    /// Locally rejected rows land in `failed` without a round trip. A ledger
    /// error aborts the run and is returned as is; the importer then stays in
    /// `Importing` with whatever the earlier batches produced.
    pub async fn start(&mut self) -> Result<()> {
        if self.state != ImportState::Waiting {
            return Err(Error::validation(format!(
                "importer already started (state: {:?})",
                self.state
            )));
        }
        self.state = ImportState::Importing;

        let (rejected, eligible) = partition(&self.candidates);
        let rejected: Vec<CreateTransactionRequest> = rejected.into_iter().map(CreateTransactionRequest::from).collect();
        let eligible: Vec<CreateTransactionRequest> = eligible.into_iter().map(CreateTransactionRequest::from).collect();

        let rejected_count = rejected.len();
        self.failed.extend(rejected);
        self.set_progress(rejected_count);

        let batches = eligible.len().div_ceil(self.batch_size);
        for (index, chunk) in eligible.chunks(self.batch_size).enumerate() {
            debug!("Submitting batch {}/{} ({} rows)", index + 1, batches, chunk.len());
            let outcome = self.ledger.create_many(chunk).await?;

            if outcome.len() != chunk.len() {
                warn!(
                    "Batch {} classified {} of {} submitted rows",
                    index + 1,
                    outcome.len(),
                    chunk.len()
                );
            }

            self.succeeded.extend(outcome.succeeded);
            self.failed.extend(outcome.failed);
            self.duplicate.extend(outcome.duplicate);
            self.set_progress(self.progress + chunk.len());
        }

        self.state = ImportState::Imported;
        Ok(())
    }

    fn set_progress(&mut self, progress: usize) {
        self.progress = progress;
        if let Some(listener) = self.listener.as_mut() {
            listener(progress);
        }
    }
}

/// Split candidates into `(locally_rejected, eligible)`, keeping row order
/// in both
pub fn partition(candidates: &[CandidateTransaction]) -> (Vec<&CandidateTransaction>, Vec<&CandidateTransaction>) {
    candidates
        .iter()
        .partition(|c| classifier::is_locally_rejected(c))
}
