//! Batch coordination.
//!
//! Drives concurrent archival of one delivered batch and assembles the
//! partial-failure response the queue source expects. The coordinator
//! never fails as a unit: even a batch where every message fails produces
//! a well-formed response. Only invocation-level faults propagate.

mod pool;

pub use pool::WorkerPool;

use snafu::prelude::*;
use std::sync::Arc;
use tracing::{Instrument, info, info_span, warn};

use crate::archive::{ArchiveOutcome, Archiver, STORAGE_PATTERN};
use crate::config::MAX_CONCURRENT_MESSAGES;
use crate::emit;
use crate::error::{ArchiverError, SummarySerializeSnafu};
use crate::event::{BatchItemFailure, BatchResponse, BatchSummary, QueueEvent};
use crate::metrics::events::BatchCompleted;

/// Aggregate outcome of one batch.
///
/// `failed_message_ids` is in completion order, not input order; callers
/// must not rely on ordering.
#[derive(Debug, Clone, Default)]
pub struct BatchResult {
    pub processed: usize,
    pub errors: usize,
    pub total: usize,
    pub failed_message_ids: Vec<String>,
    /// Failures whose message id could not be read. Counted in `errors`
    /// but not reportable for redelivery.
    pub failures_without_id: usize,
}

impl BatchResult {
    fn new(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    /// Fold one worker outcome into the aggregate.
    fn record(&mut self, outcome: ArchiveOutcome) {
        match outcome {
            ArchiveOutcome::Archived { .. } => self.processed += 1,
            ArchiveOutcome::Failed {
                message_id: Some(id),
            } => {
                self.errors += 1;
                self.failed_message_ids.push(id);
            }
            ArchiveOutcome::Failed { message_id: None } => {
                self.errors += 1;
                self.failures_without_id += 1;
            }
        }
    }

    /// Build the queue-facing response.
    ///
    /// Failures without a readable id are omitted from
    /// `batchItemFailures`; the queue contract keys redelivery on item
    /// identifiers. The status code is 200 regardless of failures.
    pub fn to_response(&self) -> Result<BatchResponse, serde_json::Error> {
        let summary = BatchSummary {
            processed_messages: self.processed,
            error_count: self.errors,
            total_messages: self.total,
            storage_pattern: STORAGE_PATTERN.to_string(),
        };

        Ok(BatchResponse {
            batch_item_failures: self
                .failed_message_ids
                .iter()
                .map(|id| BatchItemFailure {
                    item_identifier: id.clone(),
                })
                .collect(),
            status_code: 200,
            body: serde_json::to_string(&summary)?,
        })
    }
}

/// Process one batch of queued messages.
///
/// Fans out across a worker pool capped at [`MAX_CONCURRENT_MESSAGES`]
/// (sized down for smaller batches) and folds outcomes sequentially as
/// workers complete. Empty batches short-circuit to an empty result.
pub async fn run_batch(
    event: QueueEvent,
    archiver: Arc<Archiver>,
) -> Result<BatchResponse, ArchiverError> {
    let span = info_span!("batch", request_id = %archiver.context().request_id);

    async move {
        let total = event.records.len();
        info!(
            records = total,
            processor = %archiver.context().processor_name,
            version = %archiver.context().processor_version,
            "Starting batch processing"
        );

        if total == 0 {
            warn!("Received empty batch, nothing to archive");
            return BatchResult::new(0)
                .to_response()
                .context(SummarySerializeSnafu);
        }

        let pool = WorkerPool::for_batch(MAX_CONCURRENT_MESSAGES, total);
        let outcomes = pool
            .run(event.records, |record| {
                let archiver = archiver.clone();
                async move { archiver.archive(record).await }
            })
            .await;

        let mut result = BatchResult::new(total);
        for outcome in outcomes {
            result.record(outcome);
        }

        emit!(BatchCompleted {
            processed: result.processed as u64,
            failed: result.errors as u64,
        });

        info!(
            total = result.total,
            processed = result.processed,
            errors = result.errors,
            failed_ids = ?result.failed_message_ids,
            storage_pattern = STORAGE_PATTERN,
            "Batch processing complete"
        );
        if result.failures_without_id > 0 {
            warn!(
                count = result.failures_without_id,
                "Failures without a readable message id were omitted from batchItemFailures"
            );
        }

        result.to_response().context(SummarySerializeSnafu)
    }
    .instrument(span)
    .await
}
