//! Error types for tscache

use thiserror::Error;

use crate::types::Timestamp;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Out of order sample for {target}: last buffered time {last} >= {given}")]
    OutOfOrder {
        target: String,
        last: Timestamp,
        given: Timestamp,
    },

    #[error("Unknown target: {0}")]
    UnknownTarget(String),

    #[error("Write cache is not running")]
    NotRunning,

    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("Invalid sample: {0}")]
    InvalidSample(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Failed to spawn queue worker: {0}")]
    Spawn(std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn storage(msg: impl Into<String>) -> Self {
        Error::Storage(msg.into())
    }

    pub fn invalid_sample(msg: impl Into<String>) -> Self {
        Error::InvalidSample(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Error::Internal(msg.into())
    }
}
