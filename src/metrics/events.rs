//! Internal events for metrics emission.
//!
//! Each event struct represents a measurable occurrence in the archiver.
//! Events implement the `InternalEvent` trait which emits the
//! corresponding Prometheus metric.

use metrics::{counter, gauge, histogram};
use std::time::Duration;
use tracing::trace;

/// Trait for internal events that can be emitted as metrics.
pub trait InternalEvent {
    /// Emit this event as a metric.
    fn emit(self);
}

/// Final status of one processed message.
#[derive(Debug, Clone, Copy)]
pub enum MessageStatus {
    Archived,
    Failed,
}

impl MessageStatus {
    fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Archived => "archived",
            MessageStatus::Failed => "failed",
        }
    }
}

/// Event emitted when a message finishes processing.
pub struct MessageProcessed {
    pub status: MessageStatus,
}

impl InternalEvent for MessageProcessed {
    fn emit(self) {
        trace!(status = self.status.as_str(), "Message processed");
        counter!("icebox_messages_total", "status" => self.status.as_str()).increment(1);
    }
}

/// Stage at which an archive attempt failed.
#[derive(Debug, Clone, Copy)]
pub enum FailureStage {
    /// The queue record could not be validated.
    Decode,
    /// The archive record could not be encoded.
    Serialize,
    /// The object store write failed.
    Write,
}

impl FailureStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureStage::Decode => "decode",
            FailureStage::Serialize => "serialize",
            FailureStage::Write => "write",
        }
    }
}

/// Event emitted when a message fails to archive.
pub struct ArchiveFailed {
    pub stage: FailureStage,
}

impl InternalEvent for ArchiveFailed {
    fn emit(self) {
        trace!(stage = self.stage.as_str(), "Archive failed");
        counter!("icebox_archive_failures_total", "stage" => self.stage.as_str()).increment(1);
    }
}

/// Event emitted when a message is archived, with end-to-end duration.
pub struct ArchiveCompleted {
    pub duration: Duration,
}

impl InternalEvent for ArchiveCompleted {
    fn emit(self) {
        trace!(duration_ms = self.duration.as_millis(), "Archive completed");
        histogram!("icebox_archive_duration_seconds").record(self.duration.as_secs_f64());
    }
}

/// Event emitted when the number of in-flight workers changes.
pub struct ActiveWorkers {
    pub count: usize,
}

impl InternalEvent for ActiveWorkers {
    fn emit(self) {
        trace!(count = self.count, "Active workers");
        gauge!("icebox_active_workers").set(self.count as f64);
    }
}

/// Event emitted when a batch completes.
pub struct BatchCompleted {
    pub processed: u64,
    pub failed: u64,
}

impl InternalEvent for BatchCompleted {
    fn emit(self) {
        trace!(
            processed = self.processed,
            failed = self.failed,
            "Batch completed"
        );
        counter!("icebox_batches_total").increment(1);
        counter!("icebox_batch_messages_total", "status" => "archived").increment(self.processed);
        counter!("icebox_batch_messages_total", "status" => "failed").increment(self.failed);
    }
}

/// Status of a storage request.
#[derive(Debug, Clone, Copy)]
pub enum RequestStatus {
    Success,
    Error,
}

impl RequestStatus {
    fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Success => "success",
            RequestStatus::Error => "error",
        }
    }
}

/// Event emitted when a storage write completes.
pub struct StorageRequest {
    pub status: RequestStatus,
}

impl InternalEvent for StorageRequest {
    fn emit(self) {
        trace!(status = self.status.as_str(), "Storage request");
        counter!("icebox_storage_requests_total", "status" => self.status.as_str()).increment(1);
    }
}

/// Event emitted when a storage write completes, with duration.
pub struct StorageRequestDuration {
    pub duration: Duration,
}

impl InternalEvent for StorageRequestDuration {
    fn emit(self) {
        trace!(
            duration_ms = self.duration.as_millis(),
            "Storage request duration"
        );
        histogram!("icebox_storage_request_duration_seconds").record(self.duration.as_secs_f64());
    }
}
