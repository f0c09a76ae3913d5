//! Application settings structs, defaults, validation and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and handed to each task.
//! Every section is `#[serde(default)]`, so a partial `settings.toml` only
//! needs the values it overrides.

use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::AppPaths;

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// A setting that would make the pipeline misbehave.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be greater than zero (got {value})")]
    NotPositive { field: &'static str, value: String },

    #[error("{field} must be at most {max} (got {value})")]
    TooLarge {
        field: &'static str,
        value: u64,
        max: u64,
    },

    #[error("audio floor_db ({floor}) must be below ceiling_db ({ceiling})")]
    InvertedDbRange { floor: f64, ceiling: f64 },

    #[error("topic pattern `{field}` must contain {placeholder}: {pattern:?}")]
    MissingPlaceholder {
        field: &'static str,
        placeholder: &'static str,
        pattern: String,
    },
}

fn require_positive_f64(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::NotPositive {
            field,
            value: value.to_string(),
        })
    }
}

fn require_positive_u64(field: &'static str, value: u64) -> Result<(), ConfigError> {
    if value > 0 {
        Ok(())
    } else {
        Err(ConfigError::NotPositive {
            field,
            value: value.to_string(),
        })
    }
}

fn require_at_most(field: &'static str, value: u64, max: u64) -> Result<(), ConfigError> {
    if value <= max {
        Ok(())
    } else {
        Err(ConfigError::TooLarge { field, value, max })
    }
}

// ---------------------------------------------------------------------------
// TriggerConfig
// ---------------------------------------------------------------------------

/// Settings for the Z-score poller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerConfig {
    /// Seconds between polls of every tracked device.
    pub poll_interval_secs: f64,
    /// Width of the "current" and "last trigger" windows in seconds.
    pub window_secs: u64,
    /// Days of history used for the baseline standard deviation.
    pub baseline_days: u32,
    /// Absolute Z-score at or above which a feature triggers inference.
    pub z_threshold: f64,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 60.0,
            window_secs: 120,
            baseline_days: 7,
            z_threshold: 1.5,
        }
    }
}

impl TriggerConfig {
    /// Upper bound on `window_secs` (30 days).
    pub const MAX_WINDOW_SECS: u64 = 30 * 86_400;
    /// Upper bound on `baseline_days` (10 years).
    pub const MAX_BASELINE_DAYS: u32 = 3_650;

    /// Falls back to the default 60 s when the configured value is zero,
    /// negative or not a number.
    pub fn poll_interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.poll_interval_secs)
            .ok()
            .filter(|d| !d.is_zero())
            .unwrap_or(Duration::from_secs(60))
    }

    /// How far back any trigger query reaches: the baseline lookback plus
    /// one window.
    pub fn retention(&self) -> Duration {
        let baseline = u64::from(self.baseline_days).saturating_mul(86_400);
        Duration::from_secs(baseline.saturating_add(self.window_secs))
    }
}

// ---------------------------------------------------------------------------
// AudioConfig
// ---------------------------------------------------------------------------

/// Settings for volume extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Amplitude mapped to 0 dB (max magnitude of a 16-bit sample).
    pub reference_level: f64,
    /// RMS floor applied before taking the logarithm.
    pub min_rms: f64,
    /// Lowest reported volume (practical silence).
    pub floor_db: f64,
    /// Highest reported volume (full scale).
    pub ceiling_db: f64,
    /// Sample magnitude above which a clip is flagged as clipping.
    pub clipping_threshold: u16,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            reference_level: 32_768.0,
            min_rms: 1.0,
            floor_db: -80.0,
            ceiling_db: 0.0,
            clipping_threshold: 32_000,
        }
    }
}

// ---------------------------------------------------------------------------
// QueueConfig
// ---------------------------------------------------------------------------

/// Capacities of the bounded queues and how long a producer waits on a full
/// one before dropping the item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Raw transport messages awaiting decoding.
    pub inbound: usize,
    pub temperature: usize,
    pub humidity: usize,
    /// Smaller than the scalar queues since each item carries a PCM clip.
    pub audio: usize,
    pub control: usize,
    pub inference: usize,
    /// Wait applied to temperature, humidity and control handoffs.
    pub scalar_send_timeout_ms: u64,
    pub audio_send_timeout_ms: u64,
    pub inference_send_timeout_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            inbound: 256,
            temperature: 100,
            humidity: 100,
            audio: 50,
            control: 50,
            inference: 50,
            scalar_send_timeout_ms: 1_000,
            audio_send_timeout_ms: 2_000,
            inference_send_timeout_ms: 1_000,
        }
    }
}

impl QueueConfig {
    pub fn scalar_send_timeout(&self) -> Duration {
        Duration::from_millis(self.scalar_send_timeout_ms)
    }

    pub fn audio_send_timeout(&self) -> Duration {
        Duration::from_millis(self.audio_send_timeout_ms)
    }

    pub fn inference_send_timeout(&self) -> Duration {
        Duration::from_millis(self.inference_send_timeout_ms)
    }
}

// ---------------------------------------------------------------------------
// TopicConfig
// ---------------------------------------------------------------------------

/// Topic patterns.  Inbound patterns use `+` for the device-id segment;
/// the outbound pattern uses a `{device_id}` placeholder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicConfig {
    pub temperature: String,
    pub humidity: String,
    pub audio: String,
    pub control: String,
    pub inference_request: String,
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            temperature: "sensor/+/temperature".into(),
            humidity: "sensor/+/humidity".into(),
            audio: "sensor/+/audio".into(),
            control: "window/+/control".into(),
            inference_request: "inference/request/{device_id}".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level configuration, serialised as `settings.toml`.
///
/// ```rust,no_run
/// use env_trigger::config::AppConfig;
///
/// // Load (returns Default when the file is missing)
/// let config = AppConfig::load().unwrap();
/// config.validate().unwrap();
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// How long shutdown waits for tasks to finish in-flight work.
    pub shutdown_grace_secs: u64,
    pub trigger: TriggerConfig,
    pub audio: AudioConfig,
    pub queues: QueueConfig,
    pub topics: TopicConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            shutdown_grace_secs: 2,
            trigger: TriggerConfig::default(),
            audio: AudioConfig::default(),
            queues: QueueConfig::default(),
            topics: TopicConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests and `--config`).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    /// Reject settings that would stall or break the pipeline.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.trigger;
        require_positive_f64("trigger.poll_interval_secs", t.poll_interval_secs)?;
        require_positive_u64("trigger.window_secs", t.window_secs)?;
        require_positive_u64("trigger.baseline_days", u64::from(t.baseline_days))?;
        require_at_most("trigger.window_secs", t.window_secs, TriggerConfig::MAX_WINDOW_SECS)?;
        require_at_most(
            "trigger.baseline_days",
            u64::from(t.baseline_days),
            u64::from(TriggerConfig::MAX_BASELINE_DAYS),
        )?;
        require_positive_f64("trigger.z_threshold", t.z_threshold)?;

        let a = &self.audio;
        require_positive_f64("audio.reference_level", a.reference_level)?;
        require_positive_f64("audio.min_rms", a.min_rms)?;
        if a.floor_db >= a.ceiling_db {
            return Err(ConfigError::InvertedDbRange {
                floor: a.floor_db,
                ceiling: a.ceiling_db,
            });
        }

        let q = &self.queues;
        for (field, capacity) in [
            ("queues.inbound", q.inbound),
            ("queues.temperature", q.temperature),
            ("queues.humidity", q.humidity),
            ("queues.audio", q.audio),
            ("queues.control", q.control),
            ("queues.inference", q.inference),
        ] {
            require_positive_u64(field, capacity as u64)?;
        }

        let topics = &self.topics;
        for (field, pattern) in [
            ("topics.temperature", &topics.temperature),
            ("topics.humidity", &topics.humidity),
            ("topics.audio", &topics.audio),
            ("topics.control", &topics.control),
        ] {
            if !pattern.split('/').any(|segment| segment == "+") {
                return Err(ConfigError::MissingPlaceholder {
                    field,
                    placeholder: "a `+` segment",
                    pattern: pattern.clone(),
                });
            }
        }
        if !topics.inference_request.contains("{device_id}") {
            return Err(ConfigError::MissingPlaceholder {
                field: "topics.inference_request",
                placeholder: "`{device_id}`",
                pattern: topics.inference_request.clone(),
            });
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn round_trip_toml() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");

        let original = AppConfig::default();
        original.save_to(&path).expect("save");

        let loaded = AppConfig::load_from(&path).expect("load");
        assert_eq!(original, loaded);
    }

    #[test]
    fn load_missing_returns_default() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nonexistent.toml");

        let config = AppConfig::load_from(&path).expect("should not error");
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("partial.toml");
        std::fs::write(&path, "[trigger]\nz_threshold = 2.5\n").unwrap();

        let config = AppConfig::load_from(&path).expect("load");
        assert_eq!(config.trigger.z_threshold, 2.5);
        assert_eq!(config.trigger.window_secs, 120);
        assert_eq!(config.queues.audio, 50);
    }

    #[test]
    fn default_values() {
        let cfg = AppConfig::default();

        assert_eq!(cfg.trigger.poll_interval_secs, 60.0);
        assert_eq!(cfg.trigger.window_secs, 120);
        assert_eq!(cfg.trigger.baseline_days, 7);
        assert_eq!(cfg.trigger.z_threshold, 1.5);
        assert_eq!(cfg.audio.reference_level, 32_768.0);
        assert_eq!(cfg.audio.floor_db, -80.0);
        assert_eq!(cfg.queues.scalar_send_timeout(), Duration::from_secs(1));
        assert_eq!(cfg.queues.audio_send_timeout(), Duration::from_secs(2));
        assert_eq!(cfg.topics.inference_request, "inference/request/{device_id}");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn zero_threshold_rejected() {
        let mut cfg = AppConfig::default();
        cfg.trigger.z_threshold = 0.0;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::NotPositive { field: "trigger.z_threshold", .. })
        ));
    }

    #[test]
    fn zero_capacity_rejected() {
        let mut cfg = AppConfig::default();
        cfg.queues.inference = 0;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::NotPositive { field: "queues.inference", .. })
        ));
    }

    #[test]
    fn inverted_db_range_rejected() {
        let mut cfg = AppConfig::default();
        cfg.audio.floor_db = 0.0;
        cfg.audio.ceiling_db = -10.0;
        assert!(matches!(cfg.validate(), Err(ConfigError::InvertedDbRange { .. })));
    }

    #[test]
    fn topic_without_wildcard_rejected() {
        let mut cfg = AppConfig::default();
        cfg.topics.audio = "sensor/all/audio".into();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("topics.audio"), "{err}");
    }

    #[test]
    fn oversized_spans_rejected() {
        let mut cfg = AppConfig::default();
        cfg.trigger.baseline_days = 100_000_000;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::TooLarge { field: "trigger.baseline_days", .. })
        ));

        let mut cfg = AppConfig::default();
        cfg.trigger.window_secs = 10_000_000_000_000;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::TooLarge { field: "trigger.window_secs", .. })
        ));

        let mut cfg = AppConfig::default();
        cfg.trigger.window_secs = TriggerConfig::MAX_WINDOW_SECS;
        cfg.trigger.baseline_days = TriggerConfig::MAX_BASELINE_DAYS;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn retention_spans_baseline_and_window() {
        let cfg = TriggerConfig::default();
        assert_eq!(cfg.retention(), Duration::from_secs(7 * 86_400 + 120));
    }
}
