//! Target naming and value serialization
//!
//! A target is the storage identifier a series is written to, laid out as
//! `[data_dir/]host/plugin[-instance]/type[-instance].rrd`. Buffered values are
//! `time:v1:v2...` strings, which the cache treats as opaque.

use crate::types::{DataSet, Value, ValueList};
use crate::{Error, Result};

const TARGET_SUFFIX: &str = ".rrd";

/// Build the storage target for a value list.
pub fn resolve_target(data_dir: Option<&str>, vl: &ValueList) -> String {
    let mut target = String::new();
    if let Some(dir) = data_dir {
        target.push_str(dir);
        target.push('/');
    }

    target.push_str(&vl.host);
    target.push('/');

    push_with_instance(&mut target, &vl.plugin, &vl.plugin_instance);
    target.push('/');

    push_with_instance(&mut target, &vl.type_name, &vl.type_instance);
    target.push_str(TARGET_SUFFIX);
    target
}

/// Map a flush identifier (`host/plugin/type` style, no suffix) to its target.
pub fn identifier_target(data_dir: Option<&str>, identifier: &str) -> String {
    match data_dir {
        Some(dir) => format!("{}/{}{}", dir, identifier, TARGET_SUFFIX),
        None => format!("{}{}", identifier, TARGET_SUFFIX),
    }
}

/// Serialize a value list into the `time:v1:v2...` update string.
pub fn serialize_sample(ds: &DataSet, vl: &ValueList) -> Result<String> {
    if ds.sources.len() != vl.values.len() {
        return Err(Error::invalid_sample(format!(
            "data set {} has {} sources but {} values were given",
            ds.type_name,
            ds.sources.len(),
            vl.values.len()
        )));
    }

    let mut out = vl.time.to_string();
    for (source, value) in ds.sources.iter().zip(&vl.values) {
        if source.kind != value.kind() {
            return Err(Error::invalid_sample(format!(
                "data source {} expects {:?}, got {:?}",
                source.name,
                source.kind,
                value.kind()
            )));
        }

        out.push(':');
        match value {
            Value::Counter(c) => out.push_str(&c.to_string()),
            Value::Gauge(g) if g.is_nan() => out.push('U'),
            Value::Gauge(g) => out.push_str(&format!("{:.6}", g)),
        }
    }

    Ok(out)
}

fn push_with_instance(target: &mut String, name: &str, instance: &str) {
    target.push_str(name);
    if !instance.is_empty() {
        target.push('-');
        target.push_str(instance);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DataSource;

    fn cpu_list() -> ValueList {
        ValueList {
            host: "host".to_string(),
            plugin: "cpu".to_string(),
            plugin_instance: "0".to_string(),
            type_name: "cpu".to_string(),
            type_instance: "idle".to_string(),
            time: 1_200_000_000,
            interval: 10,
            values: vec![Value::Counter(42)],
        }
    }

    #[test]
    fn test_resolve_target_with_instances() {
        let vl = cpu_list();
        assert_eq!(resolve_target(None, &vl), "host/cpu-0/cpu-idle.rrd");
        assert_eq!(
            resolve_target(Some("/var/lib/tscache"), &vl),
            "/var/lib/tscache/host/cpu-0/cpu-idle.rrd"
        );
    }

    #[test]
    fn test_resolve_target_without_instances() {
        let vl = ValueList {
            plugin_instance: String::new(),
            type_instance: String::new(),
            type_name: "load".to_string(),
            plugin: "load".to_string(),
            ..cpu_list()
        };
        assert_eq!(resolve_target(None, &vl), "host/load/load.rrd");
    }

    #[test]
    fn test_identifier_target() {
        assert_eq!(identifier_target(None, "host/cpu/cpu"), "host/cpu/cpu.rrd");
        assert_eq!(
            identifier_target(Some("data"), "host/cpu/cpu"),
            "data/host/cpu/cpu.rrd"
        );
    }

    #[test]
    fn test_serialize_sample() {
        let ds = DataSet {
            type_name: "load".to_string(),
            sources: vec![
                DataSource::counter("rx"),
                DataSource::gauge("short"),
                DataSource::gauge("long"),
            ],
        };
        let vl = ValueList {
            type_name: "load".to_string(),
            values: vec![Value::Counter(7), Value::Gauge(0.25), Value::Gauge(f64::NAN)],
            ..cpu_list()
        };
        assert_eq!(
            serialize_sample(&ds, &vl).unwrap(),
            "1200000000:7:0.250000:U"
        );
    }

    #[test]
    fn test_serialize_rejects_mismatch() {
        let ds = DataSet {
            type_name: "cpu".to_string(),
            sources: vec![DataSource::gauge("value")],
        };
        let err = serialize_sample(&ds, &cpu_list()).unwrap_err();
        assert!(matches!(err, Error::InvalidSample(_)));

        let vl = ValueList {
            values: vec![],
            ..cpu_list()
        };
        assert!(serialize_sample(&ds, &vl).is_err());
    }
}
