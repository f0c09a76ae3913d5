//! Types exchanged between the store, the trigger engine and the publisher.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Feature
// ---------------------------------------------------------------------------

/// The three features that make up an inference feature vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Feature {
    Temperature,
    Humidity,
    Volume,
}

impl Feature {
    /// Evaluation order.  Trigger reasons are joined in this order.
    pub const ALL: [Feature; 3] = [Feature::Temperature, Feature::Humidity, Feature::Volume];

    pub fn as_str(&self) -> &'static str {
        match self {
            Feature::Temperature => "temperature",
            Feature::Humidity => "humidity",
            Feature::Volume => "volume",
        }
    }

    /// Reason tag recorded when this feature's Z-score crosses the threshold.
    pub fn zscore_tag(&self) -> &'static str {
        match self {
            Feature::Temperature => "temperature_zscore",
            Feature::Humidity => "humidity_zscore",
            Feature::Volume => "volume_zscore",
        }
    }
}

// ---------------------------------------------------------------------------
// FeatureVector
// ---------------------------------------------------------------------------

/// One value per feature.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FeatureVector {
    pub temperature: f64,
    pub humidity: f64,
    pub volume: f64,
}

impl FeatureVector {
    pub fn new(temperature: f64, humidity: f64, volume: f64) -> Self {
        Self {
            temperature,
            humidity,
            volume,
        }
    }

    pub fn get(&self, feature: Feature) -> f64 {
        match feature {
            Feature::Temperature => self.temperature,
            Feature::Humidity => self.humidity,
            Feature::Volume => self.volume,
        }
    }
}

// ---------------------------------------------------------------------------
// WindowAggregate
// ---------------------------------------------------------------------------

/// Mean feature values over a bounded time window.
///
/// Each mean is `None` when the window holds no samples of that feature.
/// The aggregate only counts as having data when **all three** means are
/// present; a window with temperature but no humidity is treated exactly
/// like an empty one.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WindowAggregate {
    pub mean_temperature: Option<f64>,
    pub mean_humidity: Option<f64>,
    pub mean_volume: Option<f64>,
}

impl WindowAggregate {
    pub fn has_data(&self) -> bool {
        self.mean_temperature.is_some() && self.mean_humidity.is_some() && self.mean_volume.is_some()
    }

    /// All three means, or `None` if any is missing.
    pub fn means(&self) -> Option<FeatureVector> {
        Some(FeatureVector::new(
            self.mean_temperature?,
            self.mean_humidity?,
            self.mean_volume?,
        ))
    }

    /// The means with missing features reported as `0.0`.
    pub fn means_or_zero(&self) -> FeatureVector {
        FeatureVector::new(
            self.mean_temperature.unwrap_or(0.0),
            self.mean_humidity.unwrap_or(0.0),
            self.mean_volume.unwrap_or(0.0),
        )
    }
}

// ---------------------------------------------------------------------------
// BaselineStats
// ---------------------------------------------------------------------------

/// Historical standard deviation per feature.  `0.0` when a feature has
/// fewer than two samples in the lookback or never varies.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BaselineStats {
    pub stddev_temperature: f64,
    pub stddev_humidity: f64,
    pub stddev_volume: f64,
}

impl BaselineStats {
    pub fn stddev(&self, feature: Feature) -> f64 {
        match feature {
            Feature::Temperature => self.stddev_temperature,
            Feature::Humidity => self.stddev_humidity,
            Feature::Volume => self.stddev_volume,
        }
    }
}

// ---------------------------------------------------------------------------
// TriggerReason
// ---------------------------------------------------------------------------

/// Why an inference request was fired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerReason {
    /// The device has never triggered before.
    FirstInference,
    /// The window around the previous trigger holds no data to compare against.
    MissingLastData,
    /// One or more features moved by at least the Z-score threshold.
    /// Always non-empty and in [`Feature::ALL`] order.
    ZScore(Vec<Feature>),
}

impl TriggerReason {
    /// The individual tags making up this reason.
    pub fn tags(&self) -> Vec<&'static str> {
        match self {
            TriggerReason::FirstInference => vec!["first_inference"],
            TriggerReason::MissingLastData => vec!["missing_last_data"],
            TriggerReason::ZScore(features) => features.iter().map(Feature::zscore_tag).collect(),
        }
    }
}

impl fmt::Display for TriggerReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tags().join(","))
    }
}

// ---------------------------------------------------------------------------
// TriggerRecord
// ---------------------------------------------------------------------------

/// Audit entry written once per trigger decision.  Never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerRecord {
    pub device_id: String,
    pub timestamp: DateTime<Utc>,
    pub reason: TriggerReason,
    pub z_temperature: f64,
    pub z_humidity: f64,
    pub z_volume: f64,
}

impl TriggerRecord {
    pub fn z_scores(&self) -> FeatureVector {
        FeatureVector::new(self.z_temperature, self.z_humidity, self.z_volume)
    }
}

// ---------------------------------------------------------------------------
// InferenceRequest
// ---------------------------------------------------------------------------

/// Feature vector handed to the external ML process.
///
/// Serialises to the wire format
/// `{"device_id", "timestamp", "temperature", "humidity", "volume"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceRequest {
    pub device_id: String,
    pub timestamp: DateTime<Utc>,
    pub temperature: f64,
    pub humidity: f64,
    pub volume: f64,
}

impl InferenceRequest {
    pub fn new(device_id: impl Into<String>, timestamp: DateTime<Utc>, values: FeatureVector) -> Self {
        Self {
            device_id: device_id.into(),
            timestamp,
            temperature: values.temperature,
            humidity: values.humidity,
            volume: values.volume,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_aggregate_has_no_data() {
        let agg = WindowAggregate {
            mean_temperature: Some(21.0),
            mean_humidity: None,
            mean_volume: Some(-40.0),
        };
        assert!(!agg.has_data());
        assert!(agg.means().is_none());
        assert_eq!(agg.means_or_zero(), FeatureVector::new(21.0, 0.0, -40.0));
    }

    #[test]
    fn complete_aggregate_has_data() {
        let agg = WindowAggregate {
            mean_temperature: Some(21.0),
            mean_humidity: Some(55.0),
            mean_volume: Some(-40.0),
        };
        assert!(agg.has_data());
        assert_eq!(agg.means(), Some(FeatureVector::new(21.0, 55.0, -40.0)));
    }

    #[test]
    fn zscore_reason_joins_tags_in_order() {
        let reason = TriggerReason::ZScore(vec![Feature::Temperature, Feature::Volume]);
        assert_eq!(reason.to_string(), "temperature_zscore,volume_zscore");
        assert_eq!(TriggerReason::FirstInference.to_string(), "first_inference");
        assert_eq!(TriggerReason::MissingLastData.to_string(), "missing_last_data");
    }

    #[test]
    fn inference_request_wire_format() {
        let ts = DateTime::parse_from_rfc3339("2026-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let req = InferenceRequest::new("d1", ts, FeatureVector::new(21.5, 40.0, -35.0));
        let json: serde_json::Value = serde_json::to_value(&req).unwrap();

        assert_eq!(json["device_id"], "d1");
        assert_eq!(json["temperature"], 21.5);
        assert_eq!(json["humidity"], 40.0);
        assert_eq!(json["volume"], -35.0);
        assert!(json["timestamp"].as_str().unwrap().starts_with("2026-03-01T12:00:00"));
    }
}
