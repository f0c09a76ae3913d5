//! Environmental inference trigger.
//!
//! Sensor devices report temperature, humidity and short audio clips.  The
//! crate ingests them into a time-series store, and a periodic poller decides
//! per device when the readings have moved far enough (by Z-score against a
//! multi-day baseline) to ask an external model for a new window position.

pub mod audio;
pub mod config;
pub mod ingest;
pub mod model;
pub mod pipeline;
pub mod queue;
pub mod store;
pub mod transport;
pub mod trigger;
