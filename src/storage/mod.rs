//! Storage abstraction layer
//!
//! The cache only ever calls `update` from its worker thread. `probe` and
//! `create` are used by the caller-facing write path before the first insert.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::types::DataSource;
use crate::Result;

pub mod local;
pub mod memory;

/// What a backend knows about a target before it is written to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetState {
    Missing,
    Present,
    /// Something exists under the name but it cannot be written as a series
    NotAFile,
}

/// Schema a new target is provisioned with
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TargetSchema {
    pub step: i64,
    pub heartbeat: i64,
    pub rra_rows: u32,
    pub rra_timespans: Vec<u64>,
    pub xff: f64,
    pub sources: Vec<DataSource>,
}

/// Storage backend trait
///
/// Calls are synchronous and may block for a long time.
pub trait StorageBackend: Send + Sync {
    /// Check whether a target exists
    fn probe(&self, target: &str) -> Result<TargetState>;

    /// Provision a new target
    fn create(&self, target: &str, schema: &TargetSchema) -> Result<()>;

    /// Append a batch of serialized values, oldest first
    fn update(&self, target: &str, values: &[String]) -> Result<()>;
}

/// Funnels every call into a non-reentrant backend through one lock.
///
/// The lock is held only around the backend call and is never combined with
/// the cache's store or queue locks.
pub struct Serialized<B> {
    inner: B,
    lock: Mutex<()>,
}

impl<B: StorageBackend> Serialized<B> {
    pub fn new(inner: B) -> Self {
        Self {
            inner,
            lock: Mutex::new(()),
        }
    }

    pub fn into_inner(self) -> B {
        self.inner
    }
}

impl<B: StorageBackend> StorageBackend for Serialized<B> {
    fn probe(&self, target: &str) -> Result<TargetState> {
        let _guard = self.lock.lock();
        self.inner.probe(target)
    }

    fn create(&self, target: &str, schema: &TargetSchema) -> Result<()> {
        let _guard = self.lock.lock();
        self.inner.create(target, schema)
    }

    fn update(&self, target: &str, values: &[String]) -> Result<()> {
        let _guard = self.lock.lock();
        self.inner.update(target, values)
    }
}
