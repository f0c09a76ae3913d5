//! Inbound sensor data as it travels from the transport to the store.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// SensorKind
// ---------------------------------------------------------------------------

/// Scalar sensor kinds.  Audio travels separately as an [`AudioBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    Temperature,
    Humidity,
}

impl SensorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SensorKind::Temperature => "temperature",
            SensorKind::Humidity => "humidity",
        }
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// SensorReading
// ---------------------------------------------------------------------------

/// A single temperature or humidity sample.  Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub device_id: String,
    pub kind: SensorKind,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

impl SensorReading {
    pub fn new(
        device_id: impl Into<String>,
        kind: SensorKind,
        value: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            kind,
            value,
            timestamp,
        }
    }
}

// ---------------------------------------------------------------------------
// AudioBuffer
// ---------------------------------------------------------------------------

/// Raw 16-bit little-endian PCM clip from a device.
///
/// Consumed exactly once by the ingestion service, which derives a volume
/// and an [`AudioMeta`] record and then drops the bytes.
#[derive(Clone, PartialEq)]
pub struct AudioBuffer {
    pub device_id: String,
    pub pcm: Vec<u8>,
    /// Sample rate in Hz as reported by the device.
    pub sample_rate: u32,
    /// Clip duration in seconds as reported by the device.
    pub duration: f64,
    pub timestamp: DateTime<Utc>,
}

// Keep multi-kilobyte PCM payloads out of debug logs.
impl fmt::Debug for AudioBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioBuffer")
            .field("device_id", &self.device_id)
            .field("pcm_len", &self.pcm.len())
            .field("sample_rate", &self.sample_rate)
            .field("duration", &self.duration)
            .field("timestamp", &self.timestamp)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// AudioMeta
// ---------------------------------------------------------------------------

/// Compact metadata persisted in place of the raw audio bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioMeta {
    pub device_id: String,
    pub timestamp: DateTime<Utc>,
    pub sample_rate: u32,
    pub duration: f64,
    /// Lower-case hex SHA-256 of the PCM bytes.
    pub hash: String,
    pub volume_db: f64,
    pub peak_amplitude: u16,
    pub clipping: bool,
}
