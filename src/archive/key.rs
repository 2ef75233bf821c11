//! Object key derivation.
//!
//! Archived messages are laid out under date folders so that keys within a
//! day sort lexicographically by processing time and date ranges can be
//! listed efficiently.

use chrono::{DateTime, Utc};

/// Human-readable description of the key layout, reported in batch
/// summaries.
pub const STORAGE_PATTERN: &str = "YYYY/MM/DD/HHMMSS_microseconds_messageId.json";

/// Derive the object key for one message.
///
/// Pure function of the message id and the wall-clock instant; called once
/// per message at the moment of processing, not at batch start. The
/// timestamp is the archiver's clock, never one embedded in the message.
///
/// Keys can collide only if the same message id is processed twice within
/// one microsecond; ids are unique per batch so this is accepted.
pub fn object_key(message_id: &str, now: DateTime<Utc>) -> String {
    format!("{}_{}.json", now.format("%Y/%m/%d/%H%M%S_%6f"), message_id)
}
