use std::fs;

use tempfile::TempDir;
use tscache::cache::CacheSettings;
use tscache::config::{AppConfig, CacheSection, StorageSection};

#[test]
fn default_config_is_valid_and_disables_timeouts() {
    let config = AppConfig::default();
    config.validate().expect("defaults should validate");

    assert_eq!(config.cache_settings().normalized(), CacheSettings::new(0, 0));
    assert_eq!(config.sink_config().provisioning.rra_rows, 1200);
}

#[test]
fn negative_timeouts_are_rejected() {
    let config = AppConfig {
        cache: CacheSection {
            timeout_secs: -1,
            flush_secs: 0,
        },
        ..Default::default()
    };
    assert!(config.validate().is_err());

    let config = AppConfig {
        cache: CacheSection {
            timeout_secs: 10,
            flush_secs: -5,
        },
        ..Default::default()
    };
    assert!(config.validate().is_err());
}

#[test]
fn xff_must_be_below_one() {
    for xff in [1.0, 1.5, -0.1] {
        let config = AppConfig {
            storage: StorageSection {
                xff,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(config.validate().is_err(), "xff {xff} should be rejected");
    }
}

#[test]
fn rra_rows_must_be_positive() {
    let config = AppConfig {
        storage: StorageSection {
            rra_rows: 0,
            ..Default::default()
        },
        ..Default::default()
    };
    assert!(config.validate().is_err());
}

#[test]
fn normalize_trims_data_dir_and_sorts_timespans() {
    let mut config = AppConfig {
        storage: StorageSection {
            data_dir: Some("/var/lib/tscache//".into()),
            rra_timespans: vec![86400, 0, 3600],
            ..Default::default()
        },
        ..Default::default()
    };
    config.normalize();

    assert_eq!(config.storage.data_dir.as_deref(), Some("/var/lib/tscache"));
    assert_eq!(config.storage.rra_timespans, vec![3600, 86400]);

    config.storage.data_dir = Some("///".into());
    config.normalize();
    assert_eq!(config.storage.data_dir, None);
}

#[test]
fn load_from_reads_toml_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("tscache.toml");
    fs::write(
        &path,
        r#"
[cache]
timeout_secs = 120

[storage]
root_path = "/srv/rrd"
data_dir = "hosts/"
step_size = 30
rra_timespans = [604800, 3600]

[logging]
format = "text"
"#,
    )
    .unwrap();

    let config = AppConfig::load_from(&path).expect("config should load");
    assert_eq!(config.logging.level, "info");

    let sink = config.sink_config();
    assert_eq!(sink.cache.normalized(), CacheSettings::new(120, 1200));
    assert_eq!(sink.data_dir.as_deref(), Some("hosts"));
    assert_eq!(sink.provisioning.step_size, 30);
    assert_eq!(sink.provisioning.rra_timespans, vec![3600, 604800]);
    assert_eq!(sink.interval_secs, 10);
}

#[test]
fn load_from_rejects_invalid_values() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("tscache.toml");
    fs::write(&path, "[storage]\nxff = 1.5\n").unwrap();

    assert!(AppConfig::load_from(&path).is_err());
}
