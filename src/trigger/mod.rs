//! Statistical inference trigger.
//!
//! [`DeviceTracker`] lists the devices to poll, [`zscore`] compares windows,
//! and [`TriggerEngine`] runs the periodic poll and emits requests.

pub mod engine;
pub mod tracker;
pub mod zscore;

pub use engine::{Decision, PollSummary, TriggerEngine};
pub use tracker::DeviceTracker;
pub use zscore::{evaluate, z_score, Evaluation};
