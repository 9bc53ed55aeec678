//! Update queue: FIFO of targets waiting for the worker
//!
//! Normal flushes go to the back, on-demand flushes go to the front. Every
//! mutation wakes the worker.

use std::collections::VecDeque;

use metrics::gauge;
use parking_lot::{Condvar, Mutex};

use crate::{Error, Result};

#[derive(Debug, Default)]
struct QueueState {
    targets: VecDeque<String>,
    shutdown: bool,
}

#[derive(Debug, Default)]
pub struct UpdateQueue {
    state: Mutex<QueueState>,
    ready: Condvar,
}

impl UpdateQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a target. Callers must hold the store lock.
    pub(super) fn push_back(&self, target: &str) -> Result<()> {
        self.push(target, false)
    }

    /// Prepend a target. Callers must hold the store lock.
    pub(super) fn push_front(&self, target: &str) -> Result<()> {
        self.push(target, true)
    }

    fn push(&self, target: &str, front: bool) -> Result<()> {
        let mut state = self.state.lock();
        state
            .targets
            .try_reserve(1)
            .map_err(|e| Error::ResourceExhausted(format!("update queue: {}", e)))?;

        if front {
            state.targets.push_front(target.to_string());
        } else {
            state.targets.push_back(target.to_string());
        }
        gauge!("tscache_queue_depth", state.targets.len() as f64);
        self.ready.notify_one();
        drop(state);

        tracing::debug!(file = %target, front, "Put target into the update queue");
        Ok(())
    }

    /// Move a queued target to the head without duplicating it.
    ///
    /// Returns `false` when the target is not queued. A target already at the
    /// head is left where it is.
    pub(super) fn move_to_front(&self, target: &str) -> bool {
        let mut state = self.state.lock();
        let position = match state.targets.iter().position(|t| t == target) {
            Some(position) => position,
            None => return false,
        };

        if position > 0 {
            if let Some(entry) = state.targets.remove(position) {
                state.targets.push_front(entry);
            }
            self.ready.notify_one();
        }
        true
    }

    /// Block until a target is available or shutdown is requested.
    ///
    /// Returns `None` only once shutdown was requested and the queue is empty,
    /// so everything queued before shutdown is still handed out.
    pub(super) fn pop_blocking(&self) -> Option<String> {
        let mut state = self.state.lock();
        while state.targets.is_empty() && !state.shutdown {
            self.ready.wait(&mut state);
        }

        let target = state.targets.pop_front();
        gauge!("tscache_queue_depth", state.targets.len() as f64);
        target
    }

    pub(super) fn request_shutdown(&self) {
        let mut state = self.state.lock();
        state.shutdown = true;
        self.ready.notify_all();
    }

    pub fn len(&self) -> usize {
        self.state.lock().targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the queued targets, head first.
    pub fn snapshot(&self) -> Vec<String> {
        self.state.lock().targets.iter().cloned().collect()
    }
}
