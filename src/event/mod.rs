//! Invocation event model.
//!
//! Wire types for the batch delivered by the queue source, the validated
//! per-message view the archiver works with, and the response shape the
//! queue's batch-retry contract expects back.
//!
//! Deserialization is deliberately split: a batch whose structure is
//! malformed fails the whole invocation, while a record missing one of its
//! required fields is a per-message failure reported alongside its siblings.

use serde::{Deserialize, Serialize};
use snafu::prelude::*;
use std::collections::HashMap;

use crate::error::{ArchiveError, MalformedMessageSnafu};

/// A batch of queued messages, as delivered by the queue source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEvent {
    #[serde(rename = "Records")]
    pub records: Vec<QueueRecord>,
}

/// One queued message as it appears on the wire.
///
/// All fields are optional here; validation happens in
/// [`InboundMessage::try_from`] so that a single bad record cannot abort
/// the invocation. Unknown queue-side fields are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueRecord {
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub receipt_handle: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    /// Queue-supplied metadata, carried opaquely.
    #[serde(default)]
    pub message_attributes: HashMap<String, serde_json::Value>,
}

/// A validated message ready for archival.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub id: String,
    pub receipt_handle: String,
    pub attributes: HashMap<String, serde_json::Value>,
    pub body: String,
}

impl TryFrom<QueueRecord> for InboundMessage {
    type Error = ArchiveError;

    fn try_from(record: QueueRecord) -> Result<Self, Self::Error> {
        let id = record
            .message_id
            .filter(|id| !id.is_empty())
            .context(MalformedMessageSnafu {
                reason: "messageId is missing or empty",
            })?;

        let receipt_handle = record.receipt_handle.context(MalformedMessageSnafu {
            reason: "receiptHandle is missing",
        })?;

        let body = record.body.context(MalformedMessageSnafu {
            reason: "body is missing",
        })?;

        Ok(Self {
            id,
            receipt_handle,
            attributes: record.message_attributes,
            body,
        })
    }
}

/// Metadata about the current processing run, supplied by the hosting
/// runtime rather than the archiver itself.
#[derive(Debug, Clone)]
pub struct InvocationContext {
    pub request_id: String,
    pub processor_name: String,
    pub processor_version: String,
}

/// Invocation output, per the queue source's batch-acknowledgment contract.
///
/// Items not listed in `batch_item_failures` are treated as fully consumed;
/// listed items are redelivered. `status_code` is 200 even under partial
/// failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResponse {
    pub batch_item_failures: Vec<BatchItemFailure>,
    pub status_code: u16,
    /// JSON-encoded [`BatchSummary`].
    pub body: String,
}

/// One failed item, identified for redelivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItemFailure {
    pub item_identifier: String,
}

/// Machine-readable batch counts, serialized into the response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSummary {
    pub processed_messages: usize,
    pub error_count: usize,
    pub total_messages: usize,
    pub storage_pattern: String,
}
