//! tscache - a write-coalescing cache for time-series storage
//!
//! Samples are buffered per storage target and handed to a single background
//! worker that writes whole batches to the backend:
//! - Per-target buffering with strictly increasing timestamps
//! - Age-based auto flush plus a periodic sweep that purges idle targets
//! - On-demand flush with queue promotion
//! - Pluggable, synchronous storage backends

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod format;
pub mod sink;
pub mod storage;
pub mod types;

pub use cache::{CacheSettings, FlushOutcome, WriteCache};
pub use error::{Error, Result};
pub use sink::MetricSink;
