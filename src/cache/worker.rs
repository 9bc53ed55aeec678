//! Queue worker: the single thread that writes batches to the backend

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use metrics::counter;

use crate::storage::StorageBackend;
use crate::{Error, Result};

use super::Shared;

const THREAD_NAME: &str = "tscache-queue";

pub(super) fn spawn(shared: Arc<Shared>, backend: Arc<dyn StorageBackend>) -> Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(THREAD_NAME.to_string())
        .spawn(move || run(&shared, backend.as_ref()))
        .map_err(Error::Spawn)
}

fn run(shared: &Shared, backend: &dyn StorageBackend) {
    tracing::debug!("Queue worker started");

    while let Some(target) = shared.queue.pop_blocking() {
        // The queue lock is released at this point; only the store lock is
        // taken while detaching.
        let values = {
            let mut state = shared.store.lock();
            match state.entries.as_mut().and_then(|e| e.lookup_mut(&target)) {
                Some(record) => record.detach(),
                None => {
                    tracing::error!(file = %target, "Queued target has no cache record");
                    continue;
                }
            }
        };

        if values.is_empty() {
            continue;
        }
        write_batch(backend, &target, &values);
    }

    // Shutdown already queued everything and refuses new inserts, so nobody
    // can look records up any more.
    shared.store.lock().entries = None;
    tracing::debug!("Queue worker exited");
}

/// Failed batches are logged and dropped, never retried. A panicking backend
/// counts as a failed batch.
fn write_batch(backend: &dyn StorageBackend, target: &str, values: &[String]) {
    let result = match panic::catch_unwind(AssertUnwindSafe(|| backend.update(target, values))) {
        Ok(result) => result,
        Err(_) => Err(Error::storage("backend update panicked")),
    };

    match result {
        Ok(()) => {
            counter!("tscache_batches_written_total", 1);
            tracing::debug!(file = %target, count = values.len(), "Wrote values");
        }
        Err(e) => {
            counter!("tscache_write_failures_total", 1);
            tracing::warn!(
                file = %target,
                count = values.len(),
                error = %e,
                "Backend update failed, dropping batch"
            );
        }
    }
}
