//! icebox: archives queue message batches as timestamped JSON objects.
//!
//! Receives batches of queued messages delivered by an at-least-once
//! queue source, archives each message concurrently into an object store
//! under date-based keys, and reports per-message failures back for
//! selective redelivery.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use icebox::{Archiver, Config, StorageProvider, run_batch};
//! use icebox::event::InvocationContext;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), icebox::error::ArchiverError> {
//!     let config = Config::from_env();
//!     let storage = Arc::new(StorageProvider::for_url(&config.bucket).await?);
//!     let archiver = Arc::new(Archiver::new(storage, context));
//!     let response = run_batch(event, archiver).await?;
//!     println!("{} failures", response.batch_item_failures.len());
//!     Ok(())
//! }
//! ```

pub mod archive;
pub mod batch;
pub mod config;
pub mod error;
pub mod event;
pub mod metrics;
pub mod storage;
pub mod synthetic;

// Re-export main types
pub use archive::{ArchiveOutcome, Archiver};
pub use batch::{BatchResult, WorkerPool, run_batch};
pub use config::Config;
pub use event::{BatchResponse, InvocationContext, QueueEvent};
pub use storage::{StorageProvider, StorageProviderRef};
