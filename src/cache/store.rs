//! Entry store: one cache record per target, ordered by target name
//!
//! The store does no locking of its own. Every access happens with the cache's
//! store lock held.

use std::collections::btree_map::{self, BTreeMap};

use crate::types::Timestamp;
use crate::{Error, Result};

/// Buffered, not yet flushed state for one target
#[derive(Debug, Default)]
pub struct CacheRecord {
    /// Serialized values in arrival order
    pub values: Vec<String>,
    pub first_value_time: Timestamp,
    pub last_value_time: Timestamp,
    /// Set while the target has an entry in the update queue
    pub queued: bool,
}

impl CacheRecord {
    /// Seconds between the oldest and the newest buffered sample.
    pub fn span(&self) -> i64 {
        self.last_value_time.saturating_sub(self.first_value_time)
    }

    /// Seconds since the oldest buffered sample.
    pub fn age(&self, now: Timestamp) -> i64 {
        now.saturating_sub(self.first_value_time)
    }

    /// Hand the buffered values over to the caller and clear the queued flag.
    pub fn detach(&mut self) -> Vec<String> {
        self.queued = false;
        std::mem::take(&mut self.values)
    }
}

#[derive(Debug, Default)]
pub struct EntryStore {
    records: BTreeMap<String, CacheRecord>,
}

impl EntryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, target: &str) -> Option<&CacheRecord> {
        self.records.get(target)
    }

    pub fn lookup_mut(&mut self, target: &str) -> Option<&mut CacheRecord> {
        self.records.get_mut(target)
    }

    /// Insert a record for a target that is not in the store yet.
    pub fn insert(&mut self, target: String, record: CacheRecord) -> Result<&mut CacheRecord> {
        match self.records.entry(target) {
            btree_map::Entry::Vacant(slot) => Ok(slot.insert(record)),
            btree_map::Entry::Occupied(slot) => Err(Error::internal(format!(
                "{} is already in the entry store",
                slot.key()
            ))),
        }
    }

    pub fn remove(&mut self, target: &str) -> Result<CacheRecord> {
        self.records
            .remove(target)
            .ok_or_else(|| Error::internal(format!("{} is not in the entry store", target)))
    }

    /// Records in ascending target order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&String, &mut CacheRecord)> {
        self.records.iter_mut()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &CacheRecord)> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
