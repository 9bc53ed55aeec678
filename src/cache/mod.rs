//! Write-coalescing cache
//!
//! Samples are buffered per target in the entry store and handed to a single
//! worker thread through the update queue. Two locks guard the shared state:
//! the store lock (entry store and every record) and the queue lock (update
//! queue, paired with the worker's condition variable).
//!
//! Lock order: the store lock is always taken before the queue lock. Queue
//! mutations are only reachable through [`Locked`], which owns the store
//! guard, so the order cannot be inverted from outside this module. The worker
//! pops from the queue without the store lock and takes the store lock only
//! after the queue lock is released.

use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::{Mutex, MutexGuard};

use crate::clock::{Clock, SystemClock};
use crate::storage::StorageBackend;
use crate::types::Timestamp;
use crate::{Error, Result};

mod policy;
mod queue;
mod store;
mod worker;

pub use queue::UpdateQueue;
pub use store::{CacheRecord, EntryStore};

/// Timeouts driving automatic flushes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheSettings {
    /// Buffered span (newest minus oldest sample) that queues a target.
    /// Zero disables time based flushing.
    pub timeout_secs: i64,

    /// Interval between full sweeps, also the age a sweep flushes at
    pub flush_secs: i64,
}

impl CacheSettings {
    pub fn new(timeout_secs: i64, flush_secs: i64) -> Self {
        Self {
            timeout_secs,
            flush_secs,
        }
    }

    /// Apply the startup rules: a timeout below two seconds disables caching
    /// timeouts altogether, and the sweep interval is never shorter than the
    /// timeout (it defaults to ten timeouts).
    pub fn normalized(self) -> Self {
        if self.timeout_secs < 2 {
            return Self::new(0, 0);
        }

        let flush_secs = if self.flush_secs < self.timeout_secs {
            10 * self.timeout_secs
        } else {
            self.flush_secs
        };

        Self::new(self.timeout_secs, flush_secs)
    }

    pub fn is_enabled(&self) -> bool {
        self.timeout_secs > 0
    }
}

/// What a flush request did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// The target was already queued and now sits at the head
    Promoted,
    /// The target was put at the head of the queue
    Queued,
    /// The target's oldest sample is younger than the requested timeout
    Fresh,
    /// The target has nothing buffered
    Empty,
    /// A full sweep ran
    Swept { queued: usize, purged: usize },
}

/// Point-in-time counters for introspection and tests
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub records: usize,
    pub buffered_values: usize,
    pub queued_targets: usize,
}

struct StoreState {
    /// `None` once the worker has drained the queue and exited
    entries: Option<EntryStore>,
    last_sweep: Timestamp,
    accepting: bool,
}

pub(crate) struct Shared {
    settings: CacheSettings,
    store: Mutex<StoreState>,
    queue: UpdateQueue,
    clock: Arc<dyn Clock>,
}

impl Shared {
    fn new(settings: CacheSettings, clock: Arc<dyn Clock>) -> Self {
        let last_sweep = clock.now();
        Self {
            settings,
            store: Mutex::new(StoreState {
                entries: Some(EntryStore::new()),
                last_sweep,
                accepting: true,
            }),
            queue: UpdateQueue::new(),
            clock,
        }
    }

    /// Take the store lock. The queue lock may only be taken while holding
    /// the returned guard.
    fn lock(&self) -> Locked<'_> {
        Locked {
            state: self.store.lock(),
            queue: &self.queue,
            settings: &self.settings,
            clock: self.clock.as_ref(),
        }
    }
}

/// Store lock held, queue reachable.
pub(crate) struct Locked<'a> {
    state: MutexGuard<'a, StoreState>,
    queue: &'a UpdateQueue,
    settings: &'a CacheSettings,
    clock: &'a dyn Clock,
}

impl Locked<'_> {
    fn stats(&self) -> CacheStats {
        let (records, buffered_values) = match &self.state.entries {
            Some(entries) => (
                entries.len(),
                entries.iter().map(|(_, r)| r.values.len()).sum(),
            ),
            None => (0, 0),
        };
        CacheStats {
            records,
            buffered_values,
            queued_targets: self.queue.len(),
        }
    }
}

/// Buffers samples per target and writes them out from a background thread.
pub struct WriteCache {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl WriteCache {
    /// Create the entry store and spawn the queue worker.
    pub fn start(settings: CacheSettings, backend: Arc<dyn StorageBackend>) -> Result<Self> {
        Self::with_clock(settings, backend, Arc::new(SystemClock))
    }

    pub fn with_clock(
        settings: CacheSettings,
        backend: Arc<dyn StorageBackend>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let settings = settings.normalized();
        let shared = Arc::new(Shared::new(settings, clock));
        let handle = worker::spawn(shared.clone(), backend)?;

        tracing::info!(
            timeout_secs = settings.timeout_secs,
            flush_secs = settings.flush_secs,
            "Write cache started"
        );

        Ok(Self {
            shared,
            worker: Mutex::new(Some(handle)),
        })
    }

    pub fn settings(&self) -> CacheSettings {
        self.shared.settings
    }

    /// Buffer one serialized value for `target`.
    ///
    /// Fails without touching the record when `time` is not newer than the
    /// last buffered timestamp of the target.
    pub fn insert(&self, target: &str, value: &str, time: Timestamp) -> Result<()> {
        self.shared.lock().insert(target, value, time)
    }

    /// Flush one target, or sweep every target when `target` is `None`.
    ///
    /// `timeout_secs` is the minimum age of the oldest buffered sample; zero
    /// flushes regardless of age.
    pub fn flush(&self, timeout_secs: i64, target: Option<&str>) -> Result<FlushOutcome> {
        self.shared.lock().flush(timeout_secs, target)
    }

    pub fn stats(&self) -> CacheStats {
        self.shared.lock().stats()
    }

    /// Queue everything buffered, let the worker drain the queue and wait for
    /// it to exit. Later calls return once the worker is gone.
    pub fn stop(&self) -> Result<()> {
        // Held until the worker is joined, so a concurrent stop waits for it.
        let mut worker = self.worker.lock();
        let handle = match worker.take() {
            Some(handle) => handle,
            None => return Ok(()),
        };

        {
            let mut locked = self.shared.lock();
            match locked.sweep(0) {
                Ok(outcome) => tracing::debug!(?outcome, "Final flush before shutdown"),
                Err(e) => tracing::warn!(error = %e, "Final flush failed"),
            }
            locked.state.accepting = false;
        }

        self.shared.queue.request_shutdown();
        handle
            .join()
            .map_err(|_| Error::internal("queue worker panicked"))?;

        tracing::info!("Write cache stopped");
        Ok(())
    }
}

impl Drop for WriteCache {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            tracing::error!(error = %e, "Failed to stop write cache");
        }
    }
}
