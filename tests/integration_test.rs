//! Integration tests for icebox

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::{
    GetOptions, GetResult, ListResult, ObjectMeta, ObjectStore, PutMultipartOpts, PutOptions,
    PutPayload, PutResult,
};

use icebox::event::{BatchSummary, InvocationContext, QueueEvent, QueueRecord};
use icebox::{Archiver, StorageProvider, run_batch};

/// Object store wrapper that counts in-flight writes and injects failures.
///
/// Writes sleep briefly so concurrent calls overlap and the peak gauge is
/// meaningful.
#[derive(Debug)]
struct InstrumentedStore {
    inner: InMemory,
    active_puts: AtomicUsize,
    peak_puts: AtomicUsize,
    /// Fail any write whose key contains this marker.
    fail_marker: Option<String>,
    fail_all: bool,
}

impl InstrumentedStore {
    fn healthy() -> Self {
        Self {
            inner: InMemory::new(),
            active_puts: AtomicUsize::new(0),
            peak_puts: AtomicUsize::new(0),
            fail_marker: None,
            fail_all: false,
        }
    }

    fn failing_keys_containing(marker: &str) -> Self {
        Self {
            fail_marker: Some(marker.to_string()),
            ..Self::healthy()
        }
    }

    fn failing_everything() -> Self {
        Self {
            fail_all: true,
            ..Self::healthy()
        }
    }

    fn peak_concurrent_puts(&self) -> usize {
        self.peak_puts.load(Ordering::SeqCst)
    }

    fn injected_failure() -> object_store::Error {
        object_store::Error::Generic {
            store: "instrumented",
            source: "injected write failure".into(),
        }
    }
}

impl std::fmt::Display for InstrumentedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "InstrumentedStore")
    }
}

#[async_trait]
impl ObjectStore for InstrumentedStore {
    async fn put_opts(
        &self,
        location: &Path,
        payload: PutPayload,
        opts: PutOptions,
    ) -> object_store::Result<PutResult> {
        let now = self.active_puts.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_puts.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(10)).await;

        let result = if self.fail_all
            || self
                .fail_marker
                .as_ref()
                .is_some_and(|marker| location.as_ref().contains(marker))
        {
            Err(Self::injected_failure())
        } else {
            self.inner.put_opts(location, payload, opts).await
        };

        self.active_puts.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn put_multipart_opts(
        &self,
        location: &Path,
        opts: PutMultipartOpts,
    ) -> object_store::Result<Box<dyn object_store::MultipartUpload>> {
        self.inner.put_multipart_opts(location, opts).await
    }

    async fn get_opts(
        &self,
        location: &Path,
        options: GetOptions,
    ) -> object_store::Result<GetResult> {
        self.inner.get_opts(location, options).await
    }

    async fn delete(&self, location: &Path) -> object_store::Result<()> {
        self.inner.delete(location).await
    }

    fn list(&self, prefix: Option<&Path>) -> BoxStream<'_, object_store::Result<ObjectMeta>> {
        self.inner.list(prefix)
    }

    async fn list_with_delimiter(
        &self,
        prefix: Option<&Path>,
    ) -> object_store::Result<ListResult> {
        self.inner.list_with_delimiter(prefix).await
    }

    async fn copy(&self, from: &Path, to: &Path) -> object_store::Result<()> {
        self.inner.copy(from, to).await
    }

    async fn copy_if_not_exists(&self, from: &Path, to: &Path) -> object_store::Result<()> {
        self.inner.copy_if_not_exists(from, to).await
    }
}

fn test_context() -> InvocationContext {
    InvocationContext {
        request_id: "it-request-123".to_string(),
        processor_name: "icebox".to_string(),
        processor_version: "test".to_string(),
    }
}

fn archiver_over(store: Arc<InstrumentedStore>) -> Arc<Archiver> {
    let storage = Arc::new(StorageProvider::with_object_store(
        store,
        "instrumented://test",
    ));
    Arc::new(Archiver::new(storage, test_context()))
}

fn well_formed_record(id: &str) -> QueueRecord {
    QueueRecord {
        message_id: Some(id.to_string()),
        receipt_handle: Some(format!("receipt-{id}")),
        body: Some(format!(r#"{{"test_id": "{id}"}}"#)),
        message_attributes: HashMap::new(),
    }
}

fn batch_of(count: usize) -> QueueEvent {
    QueueEvent {
        records: (1..=count)
            .map(|n| well_formed_record(&format!("msg-{n:03}")))
            .collect(),
    }
}

fn summary_of(response: &icebox::BatchResponse) -> BatchSummary {
    serde_json::from_str(&response.body).unwrap()
}

mod batch_tests {
    use super::*;

    #[tokio::test]
    async fn test_healthy_batch_archives_every_message() {
        let store = Arc::new(InstrumentedStore::healthy());
        let archiver = archiver_over(store.clone());

        let response = run_batch(batch_of(5), archiver).await.unwrap();

        assert_eq!(response.status_code, 200);
        assert!(response.batch_item_failures.is_empty());

        let summary = summary_of(&response);
        assert_eq!(summary.processed_messages, 5);
        assert_eq!(summary.error_count, 0);
        assert_eq!(summary.total_messages, 5);

        // Every message became exactly one object
        let mut listing = store.list(None);
        let mut objects = 0;
        while let Some(meta) = futures::StreamExt::next(&mut listing).await {
            meta.unwrap();
            objects += 1;
        }
        assert_eq!(objects, 5);
    }

    #[tokio::test]
    async fn test_single_store_failure_reports_only_that_message() {
        let store = Arc::new(InstrumentedStore::failing_keys_containing("msg-002"));
        let archiver = archiver_over(store);

        let response = run_batch(batch_of(4), archiver).await.unwrap();

        assert_eq!(response.status_code, 200);
        assert_eq!(response.batch_item_failures.len(), 1);
        assert_eq!(response.batch_item_failures[0].item_identifier, "msg-002");

        let summary = summary_of(&response);
        assert_eq!(summary.processed_messages, 3);
        assert_eq!(summary.error_count, 1);
        assert_eq!(summary.total_messages, 4);
    }

    #[tokio::test]
    async fn test_total_store_failure_lists_all_ids_with_status_200() {
        let store = Arc::new(InstrumentedStore::failing_everything());
        let archiver = archiver_over(store);

        let response = run_batch(batch_of(6), archiver).await.unwrap();

        assert_eq!(response.status_code, 200);
        assert_eq!(response.batch_item_failures.len(), 6);

        // Completion order is not input order; compare as sets
        let mut ids: Vec<_> = response
            .batch_item_failures
            .iter()
            .map(|f| f.item_identifier.clone())
            .collect();
        ids.sort();
        let mut expected: Vec<_> = (1..=6).map(|n| format!("msg-{n:03}")).collect();
        expected.sort();
        assert_eq!(ids, expected);

        let summary = summary_of(&response);
        assert_eq!(summary.processed_messages, 0);
        assert_eq!(summary.error_count, 6);
    }

    #[tokio::test]
    async fn test_concurrency_capped_at_ten_workers() {
        let store = Arc::new(InstrumentedStore::healthy());
        let archiver = archiver_over(store.clone());

        let response = run_batch(batch_of(50), archiver).await.unwrap();

        let summary = summary_of(&response);
        assert_eq!(summary.processed_messages, 50);

        let peak = store.peak_concurrent_puts();
        assert!(peak <= 10, "peak concurrent puts was {peak}");
        assert!(peak > 1, "expected overlapping writes, peak was {peak}");
    }

    #[tokio::test]
    async fn test_empty_batch_short_circuits() {
        let store = Arc::new(InstrumentedStore::healthy());
        let archiver = archiver_over(store);

        let response = run_batch(QueueEvent { records: vec![] }, archiver)
            .await
            .unwrap();

        assert_eq!(response.status_code, 200);
        assert!(response.batch_item_failures.is_empty());

        let summary = summary_of(&response);
        assert_eq!(summary.total_messages, 0);
        assert_eq!(summary.processed_messages, 0);
        assert_eq!(summary.error_count, 0);
    }

    #[tokio::test]
    async fn test_malformed_record_fails_without_aborting_siblings() {
        let store = Arc::new(InstrumentedStore::healthy());
        let archiver = archiver_over(store);

        let mut event = batch_of(3);
        // Record with no id at all: counted as an error, but not
        // reportable for redelivery
        event.records.push(QueueRecord::default());

        let response = run_batch(event, archiver).await.unwrap();

        let summary = summary_of(&response);
        assert_eq!(summary.total_messages, 4);
        assert_eq!(summary.processed_messages, 3);
        assert_eq!(summary.error_count, 1);
        assert!(response.batch_item_failures.is_empty());
    }
}

mod storage_layout_tests {
    use super::*;
    use chrono::{Datelike, Utc};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_archives_land_under_date_folders() {
        let temp_dir = TempDir::new().unwrap();
        let storage = Arc::new(
            StorageProvider::for_url(temp_dir.path().to_str().unwrap())
                .await
                .unwrap(),
        );
        let archiver = Arc::new(Archiver::new(storage, test_context()));

        let response = run_batch(batch_of(3), archiver).await.unwrap();
        assert!(response.batch_item_failures.is_empty());

        let now = Utc::now();
        let date_dir = temp_dir
            .path()
            .join(format!("{:04}", now.year()))
            .join(format!("{:02}", now.month()))
            .join(format!("{:02}", now.day()));
        assert!(date_dir.is_dir(), "expected {}", date_dir.display());

        let mut files: Vec<_> = std::fs::read_dir(&date_dir)
            .unwrap()
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        files.sort();
        assert_eq!(files.len(), 3);
        for file in &files {
            assert!(file.ends_with(".json"));
        }

        // Stored record carries the full message and invocation context
        let contents =
            std::fs::read_to_string(date_dir.join(&files[0])).unwrap();
        let record: serde_json::Value = serde_json::from_str(&contents).unwrap();
        assert!(record["message_id"].as_str().unwrap().starts_with("msg-"));
        assert_eq!(record["processing"]["request_id"], "it-request-123");
        assert!(record["timestamp"].is_string());
        assert!(record["receipt_handle"].as_str().unwrap().starts_with("receipt-"));
    }

    #[tokio::test]
    async fn test_reprocessing_same_batch_writes_new_objects() {
        let temp_dir = TempDir::new().unwrap();
        let storage = Arc::new(
            StorageProvider::for_url(temp_dir.path().to_str().unwrap())
                .await
                .unwrap(),
        );
        let archiver = Arc::new(Archiver::new(storage, test_context()));

        run_batch(batch_of(2), archiver.clone()).await.unwrap();
        run_batch(batch_of(2), archiver).await.unwrap();

        // Two runs of the same ids produce four distinct objects
        let mut count = 0;
        for entry in walkdir(temp_dir.path()) {
            if entry.ends_with(".json") {
                count += 1;
            }
        }
        assert_eq!(count, 4);
    }

    fn walkdir(root: &std::path::Path) -> Vec<String> {
        let mut files = Vec::new();
        let mut stack = vec![root.to_path_buf()];
        while let Some(dir) = stack.pop() {
            for entry in std::fs::read_dir(&dir).unwrap().filter_map(|e| e.ok()) {
                let path = entry.path();
                if path.is_dir() {
                    stack.push(path);
                } else {
                    files.push(path.to_string_lossy().into_owned());
                }
            }
        }
        files
    }
}

mod synthetic_tests {
    use super::*;
    use icebox::synthetic;

    #[tokio::test]
    async fn test_synthetic_batch_archives_end_to_end() {
        let store = Arc::new(InstrumentedStore::healthy());
        let archiver = archiver_over(store);

        let event = synthetic::generate_batch(10);
        let response = run_batch(event, archiver).await.unwrap();

        assert!(response.batch_item_failures.is_empty());
        let summary = summary_of(&response);
        assert_eq!(summary.processed_messages, 10);
    }
}
