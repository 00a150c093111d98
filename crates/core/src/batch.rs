//! Bounded-concurrency batch executor.
//!
//! Runs one asynchronous operation per identifier with at most `limit`
//! operations in flight. Workers share a cursor into the input; each worker
//! claims the next index, awaits the operation, records the result and loops.
//! All workers are polled by the calling task, so they interleave only while
//! awaiting remote I/O. The cursor is still an atomic so the executor stays
//! correct if the caller moves the future onto a multi-threaded runtime.
//!
//! Per-item errors (and panics) become entries in [`BatchOutcome::failed`];
//! nothing short of an invalid `limit` makes the call itself fail.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::FutureExt;

use crate::error::CoreError;

/// Why a single item failed.
#[derive(Debug, thiserror::Error)]
pub enum ItemError<E> {
    /// The operation returned an error.
    #[error(transparent)]
    Failed(E),

    /// The operation panicked. The payload message is kept for diagnostics.
    #[error("operation panicked: {0}")]
    Panicked(String),
}

/// One failed item with the error it produced.
#[derive(Debug)]
pub struct BatchFailure<Id, E> {
    pub id: Id,
    pub error: ItemError<E>,
}

/// Success/failure partition of a batch run.
///
/// `succeeded` and `failed` are disjoint and together contain every requested
/// id exactly once, both in input order.
#[derive(Debug)]
pub struct BatchOutcome<Id, E> {
    pub succeeded: Vec<Id>,
    pub failed: Vec<BatchFailure<Id, E>>,
}

impl<Id, E> Default for BatchOutcome<Id, E> {
    fn default() -> Self {
        Self {
            succeeded: Vec::new(),
            failed: Vec::new(),
        }
    }
}

impl<Id: Clone, E> BatchOutcome<Id, E> {
    /// Number of ids the batch was asked to process.
    pub fn requested(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn is_complete_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn is_total_failure(&self) -> bool {
        self.succeeded.is_empty() && !self.failed.is_empty()
    }

    pub fn failed_ids(&self) -> Vec<Id> {
        self.failed.iter().map(|f| f.id.clone()).collect()
    }
}

/// Run `operation` over `items` with at most `limit` calls in flight.
///
/// Returns once every item has either succeeded or failed. An empty `items`
/// returns an empty outcome without calling `operation`. `limit` larger than
/// `items.len()` starts every item immediately.
///
/// # Errors
///
/// [`CoreError::Validation`] when `limit` is zero.
pub async fn run_with_concurrency<Id, T, E, F, Fut>(
    items: Vec<Id>,
    limit: usize,
    operation: F,
) -> Result<BatchOutcome<Id, E>, CoreError>
where
    Id: Clone,
    F: Fn(Id) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    if limit == 0 {
        return Err(CoreError::Validation(
            "Batch concurrency limit must be at least 1".to_string(),
        ));
    }
    if items.is_empty() {
        return Ok(BatchOutcome::default());
    }

    let worker_count = limit.min(items.len());
    let cursor = AtomicUsize::new(0);
    tracing::debug!(items = items.len(), workers = worker_count, "Starting batch workers");

    let workers = (0..worker_count).map(|worker| {
        let items = &items;
        let cursor = &cursor;
        let operation = &operation;
        async move {
            let mut records = Vec::new();
            loop {
                // Claim before awaiting: no suspension point between read and advance.
                let index = cursor.fetch_add(1, Ordering::Relaxed);
                let Some(id) = items.get(index) else {
                    break;
                };
                // The call itself sits inside the guarded future so a panic
                // raised before the first await is caught too.
                let result = AssertUnwindSafe(async { operation(id.clone()).await })
                    .catch_unwind()
                    .await;
                let record = match result {
                    Ok(Ok(_)) => Ok(()),
                    Ok(Err(err)) => Err(ItemError::Failed(err)),
                    Err(payload) => Err(ItemError::Panicked(panic_message(payload.as_ref()))),
                };
                if record.is_err() {
                    tracing::debug!(worker, index, "Batch item failed");
                }
                records.push((index, record));
            }
            records
        }
    });

    let mut records: Vec<(usize, Result<(), ItemError<E>>)> =
        futures::future::join_all(workers).await.into_iter().flatten().collect();
    records.sort_by_key(|(index, _)| *index);

    let mut outcome = BatchOutcome::default();
    for (index, record) in records {
        let id = items[index].clone();
        match record {
            Ok(()) => outcome.succeeded.push(id),
            Err(error) => outcome.failed.push(BatchFailure { id, error }),
        }
    }
    Ok(outcome)
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
