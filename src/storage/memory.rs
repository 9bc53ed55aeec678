//! In-memory storage backend that records every update batch

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::{Error, Result};

use super::{StorageBackend, TargetSchema, TargetState};

#[derive(Default)]
struct MemoryState {
    schemas: HashMap<String, TargetSchema>,
    batches: Vec<(String, Vec<String>)>,
    failing: Option<String>,
}

/// Keeps created schemas and written batches in memory, in write order.
#[derive(Default)]
pub struct MemoryStorage {
    state: Mutex<MemoryState>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `update` of `target` fail until cleared with `None`.
    pub fn fail_updates_for(&self, target: Option<&str>) {
        self.state.lock().failing = target.map(str::to_string);
    }

    /// Every batch written so far, in write order.
    pub fn batches(&self) -> Vec<(String, Vec<String>)> {
        self.state.lock().batches.clone()
    }

    /// All values written to `target`, across batches.
    pub fn values_for(&self, target: &str) -> Vec<String> {
        self.state
            .lock()
            .batches
            .iter()
            .filter(|(t, _)| t == target)
            .flat_map(|(_, values)| values.iter().cloned())
            .collect()
    }

    pub fn schema_for(&self, target: &str) -> Option<TargetSchema> {
        self.state.lock().schemas.get(target).cloned()
    }
}

impl StorageBackend for MemoryStorage {
    fn probe(&self, target: &str) -> Result<TargetState> {
        let state = self.state.lock();
        Ok(if state.schemas.contains_key(target) {
            TargetState::Present
        } else {
            TargetState::Missing
        })
    }

    fn create(&self, target: &str, schema: &TargetSchema) -> Result<()> {
        let mut state = self.state.lock();
        if state.schemas.contains_key(target) {
            return Err(Error::storage(format!("{} already exists", target)));
        }
        state.schemas.insert(target.to_string(), schema.clone());
        Ok(())
    }

    fn update(&self, target: &str, values: &[String]) -> Result<()> {
        let mut state = self.state.lock();
        if state.failing.as_deref() == Some(target) {
            return Err(Error::storage(format!("update of {} refused", target)));
        }
        state.batches.push((target.to_string(), values.to_vec()));
        Ok(())
    }
}
