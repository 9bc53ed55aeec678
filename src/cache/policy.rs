//! Flush policy: when records are queued for the worker or purged
//!
//! Runs with the store lock held. Queue pushes happen under that lock, which
//! keeps the store-then-queue order.

use metrics::counter;

use crate::types::Timestamp;
use crate::{Error, Result};

use super::store::{CacheRecord, EntryStore};
use super::{FlushOutcome, Locked, StoreState};

impl Locked<'_> {
    /// Append a value and queue the target once its buffered span reaches the
    /// cache timeout. Also runs the periodic sweep when it is due.
    pub(super) fn insert(&mut self, target: &str, value: &str, time: Timestamp) -> Result<()> {
        let timeout = self.settings.timeout_secs;
        let queue = self.queue;

        {
            let entries = entries_mut(&mut self.state)?;

            match entries.lookup_mut(target) {
                Some(record) => {
                    if record.last_value_time >= time {
                        counter!("tscache_values_rejected_total", 1);
                        tracing::warn!(
                            file = %target,
                            last = record.last_value_time,
                            given = time,
                            "Rejecting value that is not newer than the last buffered one"
                        );
                        return Err(Error::OutOfOrder {
                            target: target.to_string(),
                            last: record.last_value_time,
                            given: time,
                        });
                    }
                    append(record, target, value, time)?;
                }
                None => {
                    let mut record = CacheRecord::default();
                    append(&mut record, target, value, time)?;
                    entries.insert(target.to_string(), record)?;
                }
            }

            let record = entries
                .lookup_mut(target)
                .ok_or_else(|| Error::internal(format!("{} vanished during insert", target)))?;
            counter!("tscache_values_buffered_total", 1);
            tracing::debug!(
                file = %target,
                values = record.values.len(),
                span = record.span(),
                "Buffered value"
            );

            if timeout > 0 && record.span() >= timeout {
                if record.queued {
                    tracing::debug!(file = %target, "Target is already queued");
                } else {
                    match queue.push_back(target) {
                        Ok(()) => record.queued = true,
                        Err(e) => {
                            tracing::warn!(file = %target, error = %e, "Failed to queue target")
                        }
                    }
                }
            }
        }

        let flush_secs = self.settings.flush_secs;
        let since_sweep = self.clock.now().saturating_sub(self.state.last_sweep);
        if timeout > 0 && since_sweep > flush_secs {
            if let Err(e) = self.sweep(flush_secs) {
                tracing::warn!(error = %e, "Periodic sweep failed");
            }
        }

        Ok(())
    }

    /// Flush one target, or sweep everything when no target is given.
    pub(super) fn flush(&mut self, timeout: i64, target: Option<&str>) -> Result<FlushOutcome> {
        match target {
            None => self.sweep(timeout),
            Some(target) => self.flush_target(timeout, target),
        }
    }

    /// One pass over every record, in target order. Each record is either
    /// skipped (already queued, or younger than `timeout`), queued (has
    /// values) or purged (nothing buffered).
    pub(super) fn sweep(&mut self, timeout: i64) -> Result<FlushOutcome> {
        let now = self.clock.now();
        let queue = self.queue;
        let state: &mut StoreState = &mut self.state;

        tracing::debug!(timeout, "Sweeping cache");

        let entries = entries_mut(state)?;
        let mut stale: Vec<String> = Vec::new();
        let mut queued = 0;

        for (target, record) in entries.iter_mut() {
            if record.queued {
                continue;
            }
            if timeout > 0 && record.age(now) < timeout {
                continue;
            }

            if !record.values.is_empty() {
                match queue.push_back(target) {
                    Ok(()) => {
                        record.queued = true;
                        queued += 1;
                    }
                    Err(e) => {
                        tracing::warn!(file = %target, error = %e, "Failed to queue target")
                    }
                }
            } else if stale.try_reserve(1).is_ok() {
                stale.push(target.clone());
            } else {
                tracing::warn!(file = %target, "Purge list is full, keeping idle record");
            }
        }

        let purged = purge(entries, &stale);
        state.last_sweep = now;

        counter!("tscache_records_purged_total", purged as u64);
        Ok(FlushOutcome::Swept { queued, purged })
    }

    fn flush_target(&mut self, timeout: i64, target: &str) -> Result<FlushOutcome> {
        let now = self.clock.now();
        let queue = self.queue;
        let entries = entries_mut(&mut self.state)?;

        let record = match entries.lookup_mut(target) {
            Some(record) => record,
            None => {
                tracing::warn!(file = %target, "Flush requested for a target with no cached values");
                return Err(Error::UnknownTarget(target.to_string()));
            }
        };

        if record.queued {
            // Not found means the worker already popped it and is waiting for
            // the store lock.
            queue.move_to_front(target);
            return Ok(FlushOutcome::Promoted);
        }
        if timeout > 0 && record.age(now) < timeout {
            return Ok(FlushOutcome::Fresh);
        }
        if record.values.is_empty() {
            return Ok(FlushOutcome::Empty);
        }

        queue.push_front(target)?;
        record.queued = true;
        Ok(FlushOutcome::Queued)
    }
}

fn entries_mut(state: &mut StoreState) -> Result<&mut EntryStore> {
    if !state.accepting {
        return Err(Error::NotRunning);
    }
    state.entries.as_mut().ok_or(Error::NotRunning)
}

fn append(record: &mut CacheRecord, target: &str, value: &str, time: Timestamp) -> Result<()> {
    record
        .values
        .try_reserve(1)
        .map_err(|e| Error::ResourceExhausted(format!("value buffer for {}: {}", target, e)))?;

    record.values.push(value.to_string());
    if record.values.len() == 1 {
        record.first_value_time = time;
    }
    record.last_value_time = time;
    Ok(())
}

fn purge(entries: &mut EntryStore, stale: &[String]) -> usize {
    let mut purged = 0;
    for target in stale {
        match entries.remove(target) {
            Ok(_) => purged += 1,
            Err(e) => tracing::debug!(file = %target, error = %e, "Purge skipped"),
        }
    }
    purged
}
