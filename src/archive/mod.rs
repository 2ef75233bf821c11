//! Per-message archival.
//!
//! Transforms one queued message into a durable archive record and writes
//! it to the object store. Every failure is contained here: the archiver
//! reports an outcome, never an error, so one bad message cannot abort its
//! siblings.

mod key;

pub use key::{STORAGE_PATTERN, object_key};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use object_store::path::Path;
use serde::Serialize;
use snafu::prelude::*;
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, error, info};

use crate::emit;
use crate::error::{ArchiveError, SerializeRecordSnafu, WriteRecordSnafu};
use crate::event::{InboundMessage, InvocationContext, QueueRecord};
use crate::metrics::events::{
    ArchiveCompleted, ArchiveFailed, FailureStage, MessageProcessed, MessageStatus,
};
use crate::storage::StorageProviderRef;

/// The durable artifact written for each message.
///
/// Never mutated or deleted by this system once written.
#[derive(Debug, Serialize)]
pub struct ArchiveRecord {
    pub timestamp: DateTime<Utc>,
    pub message_id: String,
    pub receipt_handle: String,
    pub attributes: HashMap<String, serde_json::Value>,
    pub body: String,
    pub processing: ProcessingInfo,
}

/// Invocation-context block embedded in every archive record.
#[derive(Debug, Serialize)]
pub struct ProcessingInfo {
    pub request_id: String,
    pub processor_name: String,
    pub processor_version: String,
}

/// Result of archiving one message.
///
/// `Failed` carries the message id when it could be read from the record;
/// a message that failed before its id was known reports `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveOutcome {
    Archived { message_id: String, key: String },
    Failed { message_id: Option<String> },
}

/// Archives individual messages into the object store.
///
/// Shared across batch workers; holds the storage handle and the
/// invocation context under which records are attributed.
pub struct Archiver {
    storage: StorageProviderRef,
    context: InvocationContext,
}

impl Archiver {
    pub fn new(storage: StorageProviderRef, context: InvocationContext) -> Self {
        Self { storage, context }
    }

    pub fn context(&self) -> &InvocationContext {
        &self.context
    }

    /// Archive one queued message.
    ///
    /// Serialization and storage errors are logged with message and
    /// request correlation, counted, and folded into the outcome. No
    /// local retries; redelivery is the queue source's responsibility.
    pub async fn archive(&self, record: QueueRecord) -> ArchiveOutcome {
        // An empty id cannot identify an item for redelivery; treat it as
        // unreadable.
        let fallback_id = record.message_id.clone().filter(|id| !id.is_empty());
        let start = Instant::now();

        debug!(
            message_id = fallback_id.as_deref().unwrap_or("unknown"),
            request_id = %self.context.request_id,
            "Processing message"
        );

        match self.try_archive(record).await {
            Ok((message_id, key)) => {
                emit!(ArchiveCompleted {
                    duration: start.elapsed(),
                });
                emit!(MessageProcessed {
                    status: MessageStatus::Archived,
                });
                info!(
                    %message_id,
                    %key,
                    request_id = %self.context.request_id,
                    "Message archived"
                );
                ArchiveOutcome::Archived { message_id, key }
            }
            Err(archive_error) => {
                emit!(MessageProcessed {
                    status: MessageStatus::Failed,
                });
                emit!(ArchiveFailed {
                    stage: archive_error.stage(),
                });
                error!(
                    message_id = fallback_id.as_deref().unwrap_or("unknown"),
                    request_id = %self.context.request_id,
                    stage = archive_error.stage().as_str(),
                    error = %archive_error,
                    "Failed to archive message"
                );
                ArchiveOutcome::Failed {
                    message_id: fallback_id,
                }
            }
        }
    }

    async fn try_archive(&self, record: QueueRecord) -> Result<(String, String), ArchiveError> {
        let message = InboundMessage::try_from(record)?;

        // Key and record carry independent timestamps; they may differ by
        // microseconds.
        let key = object_key(&message.id, Utc::now());
        let record = self.build_record(message);

        let encoded = serde_json::to_vec_pretty(&record).context(SerializeRecordSnafu)?;
        let metadata = write_metadata(&record.message_id, &self.context, Utc::now());

        self.storage
            .put_with_metadata(&Path::from(key.as_str()), Bytes::from(encoded), metadata)
            .await
            .context(WriteRecordSnafu)?;

        Ok((record.message_id, key))
    }

    fn build_record(&self, message: InboundMessage) -> ArchiveRecord {
        ArchiveRecord {
            timestamp: Utc::now(),
            message_id: message.id,
            receipt_handle: message.receipt_handle,
            attributes: message.attributes,
            body: message.body,
            processing: ProcessingInfo {
                request_id: self.context.request_id.clone(),
                processor_name: self.context.processor_name.clone(),
                processor_version: self.context.processor_version.clone(),
            },
        }
    }
}

impl ArchiveError {
    /// Classify this error for failure metrics.
    fn stage(&self) -> FailureStage {
        match self {
            ArchiveError::MalformedMessage { .. } => FailureStage::Decode,
            ArchiveError::SerializeRecord { .. } => FailureStage::Serialize,
            ArchiveError::WriteRecord { .. } => FailureStage::Write,
        }
    }
}

/// Side-channel metadata attached to each written object, for store-level
/// introspection without parsing the body.
fn write_metadata(
    message_id: &str,
    context: &InvocationContext,
    now: DateTime<Utc>,
) -> Vec<(&'static str, String)> {
    vec![
        ("message_id", message_id.to_string()),
        ("processing_timestamp", now.to_rfc3339()),
        ("request_id", context.request_id.clone()),
        ("year", now.format("%Y").to_string()),
        ("month", now.format("%m").to_string()),
        ("day", now.format("%d").to_string()),
    ]
}
