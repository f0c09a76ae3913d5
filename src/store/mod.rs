//! Time-series persistence contract.
//!
//! # Overview
//!
//! [`TimeSeriesStore`] is the only interface the ingestion service and the
//! trigger engine see.  It is object-safe and `Send + Sync` so the
//! orchestrator can hand out one `Arc<dyn TimeSeriesStore>` to every task.
//!
//! [`MemoryStore`] is the in-process implementation used by the binary and
//! the tests.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::{
    AudioMeta, BaselineStats, SensorReading, TriggerRecord, WindowAggregate, WindowControl,
};

pub use memory::{DeviceRecord, MemoryStore};

// ---------------------------------------------------------------------------
// StoreError
// ---------------------------------------------------------------------------

/// Errors surfaced by a [`TimeSeriesStore`] backend.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The backend could not be reached (connection refused, pool exhausted).
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A write was rejected by the backend.
    #[error("store write failed: {0}")]
    Write(String),

    /// A read query failed.
    #[error("store query failed: {0}")]
    Query(String),
}

// ---------------------------------------------------------------------------
// TimeSeriesStore trait
// ---------------------------------------------------------------------------

/// Persistence for readings, audio metadata, device identity and trigger
/// audit records, plus the aggregate queries the trigger engine needs.
///
/// Windows are half-open on the left: a window of width `w` anchored at `t`
/// covers `(t - w, t]`.  A `None` anchor means "now".
#[async_trait]
pub trait TimeSeriesStore: Send + Sync {
    async fn save_reading(&self, reading: &SensorReading) -> Result<(), StoreError>;

    async fn save_audio_meta(&self, meta: &AudioMeta) -> Result<(), StoreError>;

    /// Register the device on first sight, otherwise refresh its last-seen time.
    async fn upsert_device(&self, device_id: &str, seen_at: DateTime<Utc>)
        -> Result<(), StoreError>;

    /// Timestamp of the most recent [`TriggerRecord`] for the device.
    async fn last_trigger_timestamp(
        &self,
        device_id: &str,
    ) -> Result<Option<DateTime<Utc>>, StoreError>;

    async fn window_aggregate(
        &self,
        device_id: &str,
        window_secs: u64,
        anchor: Option<DateTime<Utc>>,
    ) -> Result<WindowAggregate, StoreError>;

    /// Standard deviation per feature over the last `lookback_days` days.
    async fn baseline_stddev(
        &self,
        device_id: &str,
        lookback_days: u32,
    ) -> Result<BaselineStats, StoreError>;

    async fn save_trigger_record(&self, record: &TriggerRecord) -> Result<(), StoreError>;

    async fn save_control_response(&self, control: &WindowControl) -> Result<(), StoreError>;
}

// Compile-time check that TimeSeriesStore is object-safe.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn TimeSeriesStore>) {}
};
