//! tscache binary
//!
//! Reads newline-delimited JSON commands from stdin and feeds them to a
//! metric sink backed by local files. Everything buffered is written out when
//! stdin closes.

use std::io::{self, BufRead};
use std::sync::Arc;

use anyhow::Context;
use serde::Deserialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tscache::config::{AppConfig, LogFormat};
use tscache::storage::local::LocalStorage;
use tscache::types::{DataSet, ValueList};
use tscache::MetricSink;

#[derive(Debug, Deserialize)]
#[serde(tag = "cmd", rename_all = "lowercase")]
enum Command {
    Write {
        data_set: DataSet,
        value_list: ValueList,
    },
    Flush {
        #[serde(default)]
        timeout: i64,
        #[serde(default)]
        identifier: Option<String>,
    },
}

fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("failed to load configuration")?;

    init_tracing(&config)?;

    let storage = LocalStorage::new(&config.storage.root_path).with_context(|| {
        format!(
            "failed to open storage root {}",
            config.storage.root_path
        )
    })?;
    tracing::info!(root = %storage.root_path().display(), "Using local storage");

    let sink = MetricSink::start(config.sink_config(), Arc::new(storage))
        .context("failed to start metric sink")?;

    let host = default_host();
    let stdin = io::stdin();
    for (index, line) in stdin.lock().lines().enumerate() {
        let line = line.context("failed to read from stdin")?;
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<Command>(&line) {
            Ok(command) => handle_command(&sink, command, &host),
            Err(e) => tracing::warn!(line = index + 1, error = %e, "Ignoring malformed command"),
        }
    }

    sink.shutdown().context("failed to shut down metric sink")?;
    Ok(())
}

fn handle_command(sink: &MetricSink, command: Command, host: &str) {
    match command {
        Command::Write {
            data_set,
            mut value_list,
        } => {
            if value_list.host.is_empty() {
                value_list.host = host.to_string();
            }
            if let Err(e) = sink.write(&data_set, &value_list) {
                tracing::warn!(error = %e, "Write rejected");
            }
        }
        Command::Flush {
            timeout,
            identifier,
        } => match sink.flush(timeout, identifier.as_deref()) {
            Ok(outcome) => tracing::info!(?outcome, ?identifier, "Flush requested"),
            Err(e) => tracing::warn!(error = %e, ?identifier, "Flush failed"),
        },
    }
}

fn default_host() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "localhost".to_string())
}

fn init_tracing(config: &AppConfig) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.logging.level.clone()))
        .unwrap_or_else(|_| EnvFilter::new("tscache=info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    match config.logging.format {
        LogFormat::Json => {
            registry
                .with(tracing_subscriber::fmt::layer().json().with_writer(io::stderr))
                .init();
        }
        LogFormat::Text => {
            registry
                .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
                .init();
        }
    }

    Ok(())
}
