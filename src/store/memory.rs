//! In-process [`TimeSeriesStore`] backed by per-device sample queues.
//!
//! Good enough for a single gateway process and for tests; everything lives
//! behind one `std::sync::Mutex` that is never held across an `.await`.
//!
//! Every queue is kept sorted by timestamp.  Writes evict entries older than
//! the retention span, so memory stays bounded by what the trigger queries
//! can still reach.  The last trigger time per device outlives eviction.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::config::TriggerConfig;
use crate::model::{
    AudioMeta, BaselineStats, Feature, SensorKind, SensorReading, TriggerRecord, WindowAggregate,
    WindowControl,
};
use crate::store::{StoreError, TimeSeriesStore};

// ---------------------------------------------------------------------------
// DeviceRecord
// ---------------------------------------------------------------------------

/// Store-side registry row for a device.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceRecord {
    pub device_id: String,
    pub registered_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Inner state
// ---------------------------------------------------------------------------

trait Timestamped {
    fn at(&self) -> DateTime<Utc>;
}

impl Timestamped for (DateTime<Utc>, f64) {
    fn at(&self) -> DateTime<Utc> {
        self.0
    }
}

impl Timestamped for AudioMeta {
    fn at(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

impl Timestamped for TriggerRecord {
    fn at(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

impl Timestamped for WindowControl {
    fn at(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Insert after any entry with the same timestamp, so ties keep arrival order.
fn insert_sorted<T: Timestamped>(queue: &mut VecDeque<T>, item: T) {
    let at = item.at();
    let idx = queue.partition_point(|e| e.at() <= at);
    queue.insert(idx, item);
}

/// Drop entries at or before `cutoff`.
fn evict<T: Timestamped>(queue: &mut VecDeque<T>, cutoff: DateTime<Utc>) {
    while queue.front().is_some_and(|e| e.at() <= cutoff) {
        queue.pop_front();
    }
}

/// Entries in `(start, end]`.
fn between<'a, T: Timestamped>(
    queue: &'a VecDeque<T>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> impl Iterator<Item = &'a T> {
    let lo = queue.partition_point(|e| e.at() <= start);
    let hi = queue.partition_point(|e| e.at() <= end).max(lo);
    queue.range(lo..hi)
}

#[derive(Default)]
struct Series {
    temperature: VecDeque<(DateTime<Utc>, f64)>,
    humidity: VecDeque<(DateTime<Utc>, f64)>,
    audio: VecDeque<AudioMeta>,
}

impl Series {
    fn values(&self, feature: Feature, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<f64> {
        match feature {
            Feature::Temperature => between(&self.temperature, start, end).map(|s| s.1).collect(),
            Feature::Humidity => between(&self.humidity, start, end).map(|s| s.1).collect(),
            Feature::Volume => between(&self.audio, start, end).map(|m| m.volume_db).collect(),
        }
    }

    fn evict(&mut self, cutoff: DateTime<Utc>) {
        evict(&mut self.temperature, cutoff);
        evict(&mut self.humidity, cutoff);
        evict(&mut self.audio, cutoff);
    }
}

#[derive(Default)]
struct Inner {
    series: BTreeMap<String, Series>,
    devices: BTreeMap<String, DeviceRecord>,
    last_trigger: BTreeMap<String, DateTime<Utc>>,
    triggers: VecDeque<TriggerRecord>,
    controls: VecDeque<WindowControl>,
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

pub struct MemoryStore {
    inner: Mutex<Inner>,
    /// `None` keeps everything.
    retention: Option<Duration>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::with_retention(TriggerConfig::default().retention())
    }
}

impl MemoryStore {
    /// Store retaining enough history for the default trigger settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that evicts entries older than `retention` on every write.
    /// A span beyond chrono's range disables eviction.
    pub fn with_retention(retention: std::time::Duration) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            retention: Duration::from_std(retention).ok(),
        }
    }

    fn with_inner<R>(&self, f: impl FnOnce(&mut Inner) -> R) -> R {
        let mut guard = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }

    fn cutoff(&self) -> Option<DateTime<Utc>> {
        self.retention.and_then(|span| Utc::now().checked_sub_signed(span))
    }

    /// Scalar readings still retained, oldest first.
    pub fn readings(&self) -> Vec<SensorReading> {
        let mut readings: Vec<SensorReading> = self.with_inner(|inner| {
            inner
                .series
                .iter()
                .flat_map(|(device, series)| {
                    let temps = series.temperature.iter().map(move |&(ts, v)| {
                        SensorReading::new(device.as_str(), SensorKind::Temperature, v, ts)
                    });
                    let hums = series.humidity.iter().map(move |&(ts, v)| {
                        SensorReading::new(device.as_str(), SensorKind::Humidity, v, ts)
                    });
                    temps.chain(hums)
                })
                .collect()
        });
        readings.sort_by_key(|r| r.timestamp);
        readings
    }

    /// Audio metadata still retained, oldest first.
    pub fn audio_metas(&self) -> Vec<AudioMeta> {
        let mut metas: Vec<AudioMeta> = self.with_inner(|inner| {
            inner
                .series
                .values()
                .flat_map(|series| series.audio.iter().cloned())
                .collect()
        });
        metas.sort_by_key(|m| m.timestamp);
        metas
    }

    pub fn device(&self, device_id: &str) -> Option<DeviceRecord> {
        self.with_inner(|inner| inner.devices.get(device_id).cloned())
    }

    pub fn trigger_records(&self) -> Vec<TriggerRecord> {
        self.with_inner(|inner| inner.triggers.iter().cloned().collect())
    }

    pub fn control_responses(&self) -> Vec<WindowControl> {
        self.with_inner(|inner| inner.controls.iter().cloned().collect())
    }
}

fn window_span(secs: u64) -> Result<Duration, StoreError> {
    i64::try_from(secs)
        .ok()
        .and_then(Duration::try_seconds)
        .ok_or_else(|| StoreError::Query(format!("window of {secs}s is out of range")))
}

fn lookback_span(days: u32) -> Result<Duration, StoreError> {
    Duration::try_days(i64::from(days))
        .ok_or_else(|| StoreError::Query(format!("lookback of {days} days is out of range")))
}

/// `end - span`, or a query error when that falls outside chrono's range.
fn span_start(end: DateTime<Utc>, span: Duration) -> Result<DateTime<Utc>, StoreError> {
    end.checked_sub_signed(span)
        .ok_or_else(|| StoreError::Query(format!("{span} before {end} is out of range")))
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation; `0.0` below two samples.
fn population_stddev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt()
}

#[async_trait]
impl TimeSeriesStore for MemoryStore {
    async fn save_reading(&self, reading: &SensorReading) -> Result<(), StoreError> {
        let cutoff = self.cutoff();
        self.with_inner(|inner| {
            let series = inner.series.entry(reading.device_id.clone()).or_default();
            let sample = (reading.timestamp, reading.value);
            match reading.kind {
                SensorKind::Temperature => insert_sorted(&mut series.temperature, sample),
                SensorKind::Humidity => insert_sorted(&mut series.humidity, sample),
            }
            if let Some(cutoff) = cutoff {
                series.evict(cutoff);
            }
        });
        Ok(())
    }

    async fn save_audio_meta(&self, meta: &AudioMeta) -> Result<(), StoreError> {
        let cutoff = self.cutoff();
        self.with_inner(|inner| {
            let series = inner.series.entry(meta.device_id.clone()).or_default();
            insert_sorted(&mut series.audio, meta.clone());
            if let Some(cutoff) = cutoff {
                series.evict(cutoff);
            }
        });
        Ok(())
    }

    async fn upsert_device(
        &self,
        device_id: &str,
        seen_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.with_inner(|inner| {
            inner
                .devices
                .entry(device_id.to_string())
                .and_modify(|d| d.last_seen = d.last_seen.max(seen_at))
                .or_insert_with(|| DeviceRecord {
                    device_id: device_id.to_string(),
                    registered_at: seen_at,
                    last_seen: seen_at,
                });
        });
        Ok(())
    }

    async fn last_trigger_timestamp(
        &self,
        device_id: &str,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        Ok(self.with_inner(|inner| inner.last_trigger.get(device_id).copied()))
    }

    async fn window_aggregate(
        &self,
        device_id: &str,
        window_secs: u64,
        anchor: Option<DateTime<Utc>>,
    ) -> Result<WindowAggregate, StoreError> {
        let end = anchor.unwrap_or_else(Utc::now);
        let start = span_start(end, window_span(window_secs)?)?;

        Ok(self.with_inner(|inner| {
            let Some(series) = inner.series.get(device_id) else {
                return WindowAggregate::default();
            };
            let mean_of = |f| mean(&series.values(f, start, end));
            WindowAggregate {
                mean_temperature: mean_of(Feature::Temperature),
                mean_humidity: mean_of(Feature::Humidity),
                mean_volume: mean_of(Feature::Volume),
            }
        }))
    }

    async fn baseline_stddev(
        &self,
        device_id: &str,
        lookback_days: u32,
    ) -> Result<BaselineStats, StoreError> {
        let end = Utc::now();
        let start = span_start(end, lookback_span(lookback_days)?)?;

        Ok(self.with_inner(|inner| {
            let Some(series) = inner.series.get(device_id) else {
                return BaselineStats::default();
            };
            let stddev_of = |f| population_stddev(&series.values(f, start, end));
            BaselineStats {
                stddev_temperature: stddev_of(Feature::Temperature),
                stddev_humidity: stddev_of(Feature::Humidity),
                stddev_volume: stddev_of(Feature::Volume),
            }
        }))
    }

    async fn save_trigger_record(&self, record: &TriggerRecord) -> Result<(), StoreError> {
        let cutoff = self.cutoff();
        self.with_inner(|inner| {
            inner
                .last_trigger
                .entry(record.device_id.clone())
                .and_modify(|ts| *ts = (*ts).max(record.timestamp))
                .or_insert(record.timestamp);
            insert_sorted(&mut inner.triggers, record.clone());
            if let Some(cutoff) = cutoff {
                evict(&mut inner.triggers, cutoff);
            }
        });
        Ok(())
    }

    async fn save_control_response(&self, control: &WindowControl) -> Result<(), StoreError> {
        let cutoff = self.cutoff();
        self.with_inner(|inner| {
            insert_sorted(&mut inner.controls, control.clone());
            if let Some(cutoff) = cutoff {
                evict(&mut inner.controls, cutoff);
            }
        });
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
