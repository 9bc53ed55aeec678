//! Caller-facing write path
//!
//! `MetricSink` turns value lists into cache inserts: it resolves the storage
//! target, serializes the sample, provisions the target on first sight and
//! hands the value to the [`WriteCache`].

use std::sync::Arc;

use crate::cache::{CacheSettings, FlushOutcome, WriteCache};
use crate::clock::{Clock, SystemClock};
use crate::format;
use crate::storage::{StorageBackend, TargetSchema, TargetState};
use crate::types::{DataSet, ValueList};
use crate::{Error, Result};

/// Parameters new targets are created with
#[derive(Debug, Clone, PartialEq)]
pub struct ProvisioningConfig {
    /// Zero or less means "use the sample interval"
    pub step_size: i64,
    /// Zero or less means "twice the step"
    pub heartbeat: i64,
    pub rra_rows: u32,
    pub rra_timespans: Vec<u64>,
    pub xff: f64,
}

impl Default for ProvisioningConfig {
    fn default() -> Self {
        Self {
            step_size: 0,
            heartbeat: 0,
            rra_rows: 1200,
            rra_timespans: Vec::new(),
            xff: 0.1,
        }
    }
}

impl ProvisioningConfig {
    pub fn normalized(mut self) -> Self {
        if self.step_size < 0 {
            self.step_size = 0;
        }
        if self.heartbeat <= 0 {
            self.heartbeat = 2 * self.step_size;
        }
        self
    }

    /// Schema for a new target holding `ds`, sampled every `interval` seconds.
    pub fn schema_for(&self, ds: &DataSet, interval: i64) -> TargetSchema {
        let step = if self.step_size > 0 {
            self.step_size
        } else {
            interval
        };
        let heartbeat = if self.heartbeat > 0 {
            self.heartbeat
        } else {
            2 * step
        };

        TargetSchema {
            step,
            heartbeat,
            rra_rows: self.rra_rows,
            rra_timespans: self.rra_timespans.clone(),
            xff: self.xff,
            sources: ds.sources.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SinkConfig {
    /// Prefix for every target
    pub data_dir: Option<String>,
    /// Global collection interval, only used for sanity warnings
    pub interval_secs: i64,
    pub cache: CacheSettings,
    pub provisioning: ProvisioningConfig,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            interval_secs: 10,
            cache: CacheSettings::default(),
            provisioning: ProvisioningConfig::default(),
        }
    }
}

pub struct MetricSink {
    config: SinkConfig,
    backend: Arc<dyn StorageBackend>,
    cache: WriteCache,
}

impl MetricSink {
    pub fn start(config: SinkConfig, backend: Arc<dyn StorageBackend>) -> Result<Self> {
        Self::with_clock(config, backend, Arc::new(SystemClock))
    }

    pub fn with_clock(
        mut config: SinkConfig,
        backend: Arc<dyn StorageBackend>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.provisioning = config.provisioning.normalized();
        warn_on_short_intervals(&config);

        let cache = WriteCache::with_clock(config.cache, backend.clone(), clock)?;

        tracing::info!(
            data_dir = config.data_dir.as_deref().unwrap_or("(none)"),
            step_size = config.provisioning.step_size,
            heartbeat = config.provisioning.heartbeat,
            rra_rows = config.provisioning.rra_rows,
            xff = config.provisioning.xff,
            "Metric sink started"
        );

        Ok(Self {
            config,
            backend,
            cache,
        })
    }

    pub fn config(&self) -> &SinkConfig {
        &self.config
    }

    pub fn cache(&self) -> &WriteCache {
        &self.cache
    }

    /// Buffer one value list.
    pub fn write(&self, ds: &DataSet, vl: &ValueList) -> Result<()> {
        if ds.type_name != vl.type_name {
            tracing::error!(
                data_set = %ds.type_name,
                value_list = %vl.type_name,
                "Data set type does not match value list type"
            );
            return Err(Error::invalid_sample(format!(
                "data set type {} does not match value list type {}",
                ds.type_name, vl.type_name
            )));
        }

        let target = format::resolve_target(self.config.data_dir.as_deref(), vl);
        let value = format::serialize_sample(ds, vl)?;

        self.ensure_target(&target, ds, vl)?;
        self.cache.insert(&target, &value, vl.time)
    }

    /// Flush a series by identifier (`host/plugin/type`), or everything.
    pub fn flush(&self, timeout_secs: i64, identifier: Option<&str>) -> Result<FlushOutcome> {
        let target =
            identifier.map(|id| format::identifier_target(self.config.data_dir.as_deref(), id));
        self.cache.flush(timeout_secs, target.as_deref())
    }

    /// Write out everything buffered and stop the worker.
    pub fn shutdown(&self) -> Result<()> {
        self.cache.stop()
    }

    fn ensure_target(&self, target: &str, ds: &DataSet, vl: &ValueList) -> Result<()> {
        match self.backend.probe(target)? {
            TargetState::Present => Ok(()),
            TargetState::NotAFile => {
                tracing::error!(file = %target, "Target exists but is not a regular file");
                Err(Error::storage(format!("{} is not a regular file", target)))
            }
            TargetState::Missing => {
                let schema = self.config.provisioning.schema_for(ds, vl.interval);
                match self.backend.create(target, &schema) {
                    Ok(()) => Ok(()),
                    // Another writer may have created it in the meantime.
                    Err(e) => match self.backend.probe(target)? {
                        TargetState::Present => Ok(()),
                        _ => Err(e),
                    },
                }
            }
        }
    }
}

fn warn_on_short_intervals(config: &SinkConfig) {
    let interval = config.interval_secs;
    let provisioning = &config.provisioning;

    if provisioning.heartbeat > 0 && provisioning.heartbeat < interval {
        tracing::warn!(
            heartbeat = provisioning.heartbeat,
            interval,
            "Heartbeat is smaller than the collection interval, this will likely cause problems"
        );
    } else if provisioning.step_size > 0 && provisioning.step_size < interval {
        tracing::warn!(
            step_size = provisioning.step_size,
            interval,
            "Step size is smaller than the collection interval, this will create needlessly big targets"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DataSource;

    fn load() -> DataSet {
        DataSet {
            type_name: "load".to_string(),
            sources: vec![DataSource::gauge("shortterm")],
        }
    }

    #[test]
    fn test_provisioning_defaults_follow_step() {
        let config = ProvisioningConfig {
            step_size: 30,
            ..Default::default()
        }
        .normalized();
        assert_eq!(config.heartbeat, 60);

        let schema = config.schema_for(&load(), 10);
        assert_eq!(schema.step, 30);
        assert_eq!(schema.heartbeat, 60);
    }

    #[test]
    fn test_provisioning_falls_back_to_sample_interval() {
        let config = ProvisioningConfig {
            step_size: -5,
            ..Default::default()
        }
        .normalized();
        assert_eq!(config.step_size, 0);
        assert_eq!(config.heartbeat, 0);

        let schema = config.schema_for(&load(), 10);
        assert_eq!(schema.step, 10);
        assert_eq!(schema.heartbeat, 20);
        assert_eq!(schema.sources, load().sources);
    }
}
