//! Error types for icebox using snafu.
//!
//! This module defines structured error types with context selectors for
//! all error conditions in the codebase.

use snafu::prelude::*;

// ============ Storage Errors ============

/// Errors that can occur during storage operations.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum StorageError {
    /// Invalid storage URL or bucket name.
    #[snafu(display("Invalid storage URL: {url}"))]
    InvalidUrl { url: String },

    /// Object store operation failed.
    #[snafu(display("Storage operation failed"))]
    ObjectStore { source: object_store::Error },

    /// S3 configuration error.
    #[snafu(display("S3 configuration error"))]
    S3Config { source: object_store::Error },

    /// IO error during storage operations.
    #[snafu(display("IO error"))]
    Io { source: std::io::Error },
}

// ============ Archive Errors ============

/// Errors that can occur while archiving a single message.
///
/// These are always contained within one message's processing unit and
/// never abort sibling messages.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ArchiveError {
    /// The queue record is missing a required field.
    #[snafu(display("Malformed message: {reason}"))]
    MalformedMessage { reason: String },

    /// The archive record could not be encoded.
    #[snafu(display("Failed to serialize archive record"))]
    SerializeRecord { source: serde_json::Error },

    /// The object store write failed.
    #[snafu(display("Failed to write archive record"))]
    WriteRecord { source: StorageError },
}

// ============ Metrics Errors ============

/// Errors that can occur during metrics initialization.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum MetricsError {
    /// Failed to initialize Prometheus recorder.
    #[snafu(display("Failed to initialize Prometheus recorder"))]
    PrometheusInit {
        source: metrics_exporter_prometheus::BuildError,
    },
}

// ============ Archiver Error (top-level) ============

/// Top-level invocation errors.
///
/// Per-message failures never surface here; they are reported through
/// `batchItemFailures`. Anything that does surface here is an
/// invocation-level fault and aborts the run.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ArchiverError {
    /// Failed to read the event file.
    #[snafu(display("Failed to read event file"))]
    EventRead { source: std::io::Error },

    /// The event is not a well-formed batch.
    #[snafu(display("Malformed batch event"))]
    EventParse { source: serde_json::Error },

    /// Storage provider setup failed.
    #[snafu(display("Storage error"))]
    ArchiveStorage { source: StorageError },

    /// The batch summary could not be encoded for the response body.
    #[snafu(display("Failed to serialize batch summary"))]
    SummarySerialize { source: serde_json::Error },

    /// Address parsing error.
    #[snafu(display("Failed to parse metrics address"))]
    AddressParse { source: std::net::AddrParseError },

    /// Metrics error.
    #[snafu(display("Metrics error"))]
    Metrics { source: MetricsError },
}
