//! Core types for tscache

use serde::{Deserialize, Serialize};

/// Unix timestamp in seconds
pub type Timestamp = i64;

/// Kind of a data source
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DataSourceKind {
    Counter,
    Gauge,
}

/// One column of a data set
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DataSource {
    pub name: String,
    pub kind: DataSourceKind,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
}

impl DataSource {
    pub fn counter(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: DataSourceKind::Counter,
            min: Some(0.0),
            max: None,
        }
    }

    pub fn gauge(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: DataSourceKind::Gauge,
            min: None,
            max: None,
        }
    }
}

/// Describes the layout of every value list of a given type
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DataSet {
    pub type_name: String,
    pub sources: Vec<DataSource>,
}

/// A single measured value
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Value {
    Counter(u64),
    Gauge(f64),
}

impl Value {
    pub fn kind(&self) -> DataSourceKind {
        match self {
            Value::Counter(_) => DataSourceKind::Counter,
            Value::Gauge(_) => DataSourceKind::Gauge,
        }
    }
}

/// A timestamped sample for one metric series
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValueList {
    #[serde(default)]
    pub host: String,
    pub plugin: String,
    #[serde(default)]
    pub plugin_instance: String,
    pub type_name: String,
    #[serde(default)]
    pub type_instance: String,
    pub time: Timestamp,
    /// Collection interval in seconds
    #[serde(default)]
    pub interval: i64,
    pub values: Vec<Value>,
}
