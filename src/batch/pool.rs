//! Bounded worker pool for batch fan-out.
//!
//! Runs a set of independent work items with a fixed concurrency cap and
//! yields results in completion order. The pool never spawns tasks;
//! futures are polled on the coordinating task, so aggregation downstream
//! needs no synchronization.

use futures::stream::{self, StreamExt};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::emit;
use crate::metrics::events::ActiveWorkers;

/// A reusable, bounded worker pool.
#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    max_concurrent: usize,
}

impl WorkerPool {
    /// Create a pool with the given concurrency cap (clamped to at least 1).
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Create a pool sized for one batch: `min(cap, batch_size)`.
    pub fn for_batch(cap: usize, batch_size: usize) -> Self {
        Self::new(cap.min(batch_size))
    }

    /// The effective concurrency cap.
    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Run every item to completion, at most `max_concurrent` at a time.
    ///
    /// Results are returned in completion order, which is not input order.
    /// There is no cancellation: once an item starts it runs to completion.
    pub async fn run<T, F, Fut, R>(&self, items: Vec<T>, handler: F) -> Vec<R>
    where
        F: Fn(T) -> Fut,
        Fut: Future<Output = R>,
    {
        let active = Arc::new(AtomicUsize::new(0));

        stream::iter(items)
            .map(|item| {
                let work = handler(item);
                let active = active.clone();
                async move {
                    let count = active.fetch_add(1, Ordering::Relaxed) + 1;
                    emit!(ActiveWorkers { count });

                    let result = work.await;

                    let count = active.fetch_sub(1, Ordering::Relaxed) - 1;
                    emit!(ActiveWorkers { count });
                    result
                }
            })
            .buffer_unordered(self.max_concurrent)
            .collect()
            .await
    }
}
