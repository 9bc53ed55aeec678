use std::env;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::cache::CacheSettings;
use crate::sink::{ProvisioningConfig, SinkConfig};

const DEFAULT_RRA_ROWS: u32 = 1200;
const DEFAULT_XFF: f64 = 0.1;
const DEFAULT_INTERVAL_SECS: i64 = 10;

/// Top-level application configuration loaded from file + environment.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub cache: CacheSection,
    pub storage: StorageSection,
    pub logging: LoggingSection,
}

impl AppConfig {
    /// Load configuration from disk and environment.
    pub fn load() -> Result<Self> {
        let config_path =
            env::var("TSCACHE_CONFIG").unwrap_or_else(|_| "tscache.toml".to_string());
        Self::load_from(Path::new(&config_path))
    }

    /// Load from `path` (skipped when missing), then `TSCACHE__SECTION__KEY`
    /// environment overrides.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut builder = config::Config::builder();

        if path.exists() {
            builder = builder.add_source(config::File::from(PathBuf::from(path)));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("TSCACHE")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder.build()?;
        let mut config: Self = settings
            .try_deserialize()
            .context("invalid configuration values")?;

        config.normalize();
        config.validate()?;

        if config.logging.level.trim().is_empty() {
            config.logging.level = "info".to_string();
        }

        Ok(config)
    }

    /// Strip trailing slashes from the data directory and tidy the timespans.
    pub fn normalize(&mut self) {
        self.storage.data_dir = self.storage.data_dir.take().and_then(|dir| {
            let trimmed = dir.trim_end_matches('/');
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        });

        self.storage.rra_timespans.retain(|span| *span != 0);
        self.storage.rra_timespans.sort_unstable();
    }

    pub fn validate(&self) -> Result<()> {
        if self.cache.timeout_secs < 0 {
            bail!("cache.timeout_secs must be greater than or equal to 0");
        }
        if self.cache.flush_secs < 0 {
            bail!("cache.flush_secs must be greater than or equal to 0");
        }
        if self.storage.rra_rows == 0 {
            bail!("storage.rra_rows must be greater than 0");
        }
        if !(0.0..1.0).contains(&self.storage.xff) {
            bail!("storage.xff must be in the range 0 to 1 (exclusive)");
        }
        if self.storage.root_path.trim().is_empty() {
            bail!("storage.root_path must be specified");
        }
        Ok(())
    }

    pub fn cache_settings(&self) -> CacheSettings {
        CacheSettings::new(self.cache.timeout_secs, self.cache.flush_secs)
    }

    /// Runtime configuration for the metric sink.
    pub fn sink_config(&self) -> SinkConfig {
        SinkConfig {
            data_dir: self.storage.data_dir.clone(),
            interval_secs: self.storage.interval_secs,
            cache: self.cache_settings(),
            provisioning: ProvisioningConfig {
                step_size: self.storage.step_size,
                heartbeat: self.storage.heartbeat,
                rra_rows: self.storage.rra_rows,
                rra_timespans: self.storage.rra_timespans.clone(),
                xff: self.storage.xff,
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct CacheSection {
    pub timeout_secs: i64,
    pub flush_secs: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    pub root_path: String,
    pub data_dir: Option<String>,
    pub step_size: i64,
    pub heartbeat: i64,
    pub rra_rows: u32,
    pub rra_timespans: Vec<u64>,
    pub xff: f64,
    pub interval_secs: i64,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            root_path: "./data".to_string(),
            data_dir: None,
            step_size: 0,
            heartbeat: 0,
            rra_rows: DEFAULT_RRA_ROWS,
            rra_timespans: Vec::new(),
            xff: DEFAULT_XFF,
            interval_secs: DEFAULT_INTERVAL_SECS,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct LoggingSection {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Text,
}
