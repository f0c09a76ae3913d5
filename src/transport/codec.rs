//! Wire formats for every topic the core subscribes or publishes to.
//!
//! | Topic kind  | Payload                                                |
//! |-------------|--------------------------------------------------------|
//! | temperature | bare float string, e.g. `21.5`                         |
//! | humidity    | bare float string                                      |
//! | audio       | JSON `{data: base64 PCM, sample_rate, duration}`       |
//! | control     | JSON `{device_id?, timestamp?, position, confidence, features_used?}` |
//! | inference   | JSON [`InferenceRequest`] (outgoing)                   |
//!
//! Readings are stamped with the decode time; device clocks are not trusted.

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

use crate::config::TopicConfig;
use crate::model::{AudioBuffer, InferenceRequest, SensorKind, SensorReading, WindowControl};
use crate::transport::topics::device_id as topic_device;

// ---------------------------------------------------------------------------
// PayloadError
// ---------------------------------------------------------------------------

/// Reasons an inbound message is discarded.
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("no subscription matches topic {0:?}")]
    UnknownTopic(String),

    #[error("payload is not valid UTF-8")]
    NotUtf8,

    #[error("invalid sensor value {0:?}")]
    InvalidNumber(String),

    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid base64 audio data: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("{field} out of range: {value}")]
    OutOfRange { field: &'static str, value: f64 },
}

// ---------------------------------------------------------------------------
// Decoded
// ---------------------------------------------------------------------------

/// A successfully decoded inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Reading(SensorReading),
    Audio(AudioBuffer),
    Control(WindowControl),
}

impl Decoded {
    pub fn device_id(&self) -> &str {
        match self {
            Decoded::Reading(r) => &r.device_id,
            Decoded::Audio(a) => &a.device_id,
            Decoded::Control(c) => &c.device_id,
        }
    }
}

/// Route `topic` through the configured subscriptions and decode `payload`.
pub fn decode(
    topics: &TopicConfig,
    topic: &str,
    payload: &[u8],
    now: DateTime<Utc>,
) -> Result<Decoded, PayloadError> {
    if let Some(device) = topic_device(&topics.temperature, topic) {
        let value = parse_scalar(payload)?;
        return Ok(Decoded::Reading(SensorReading::new(
            device,
            SensorKind::Temperature,
            value,
            now,
        )));
    }
    if let Some(device) = topic_device(&topics.humidity, topic) {
        let value = parse_scalar(payload)?;
        return Ok(Decoded::Reading(SensorReading::new(
            device,
            SensorKind::Humidity,
            value,
            now,
        )));
    }
    if let Some(device) = topic_device(&topics.audio, topic) {
        return parse_audio(device, payload, now).map(Decoded::Audio);
    }
    if let Some(device) = topic_device(&topics.control, topic) {
        return parse_control(device, payload, now).map(Decoded::Control);
    }
    Err(PayloadError::UnknownTopic(topic.to_string()))
}

// ---------------------------------------------------------------------------
// Scalar readings
// ---------------------------------------------------------------------------

/// Parse a bare float string.  Surrounding whitespace is ignored; NaN and
/// infinities are rejected.
pub fn parse_scalar(payload: &[u8]) -> Result<f64, PayloadError> {
    let text = std::str::from_utf8(payload).map_err(|_| PayloadError::NotUtf8)?;
    let trimmed = text.trim();
    match trimmed.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(PayloadError::InvalidNumber(trimmed.to_string())),
    }
}

// ---------------------------------------------------------------------------
// Audio
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct AudioPayload {
    data: String,
    sample_rate: u32,
    #[serde(default)]
    duration: f64,
}

pub fn parse_audio(
    device_id: &str,
    payload: &[u8],
    now: DateTime<Utc>,
) -> Result<AudioBuffer, PayloadError> {
    let wire: AudioPayload = serde_json::from_slice(payload)?;
    let pcm = BASE64_STANDARD.decode(wire.data.as_bytes())?;
    Ok(AudioBuffer {
        device_id: device_id.to_string(),
        pcm,
        sample_rate: wire.sample_rate,
        duration: wire.duration,
        timestamp: now,
    })
}

// ---------------------------------------------------------------------------
// Window control
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct ControlPayload {
    #[serde(default)]
    device_id: String,
    #[serde(default)]
    timestamp: Option<DateTime<Utc>>,
    position: f64,
    confidence: f64,
    #[serde(default)]
    features_used: BTreeMap<String, serde_json::Value>,
}

/// Decode a control response.  `fallback_device` (taken from the topic)
/// fills in a missing device id; a missing timestamp becomes `now`.
pub fn parse_control(
    fallback_device: &str,
    payload: &[u8],
    now: DateTime<Utc>,
) -> Result<WindowControl, PayloadError> {
    let wire: ControlPayload = serde_json::from_slice(payload)?;

    let control = WindowControl {
        device_id: if wire.device_id.is_empty() {
            fallback_device.to_string()
        } else {
            wire.device_id
        },
        timestamp: wire.timestamp.unwrap_or(now),
        position: wire.position,
        confidence: wire.confidence,
        features_used: wire.features_used,
    };

    if !control.in_range() {
        let (field, value) = if (0.0..=100.0).contains(&control.position) {
            ("confidence", control.confidence)
        } else {
            ("position", control.position)
        };
        return Err(PayloadError::OutOfRange { field, value });
    }
    Ok(control)
}

// ---------------------------------------------------------------------------
// Outgoing
// ---------------------------------------------------------------------------

pub fn encode_inference_request(request: &InferenceRequest) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(request)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::pcm;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-05-01T08:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn decodes_scalar_topics() {
        let topics = TopicConfig::default();
        let decoded = decode(&topics, "sensor/d1/temperature", b" 21.5\n", now()).unwrap();
        assert_eq!(
            decoded,
            Decoded::Reading(SensorReading::new("d1", SensorKind::Temperature, 21.5, now()))
        );

        let decoded = decode(&topics, "sensor/d1/humidity", b"40", now()).unwrap();
        assert!(matches!(decoded, Decoded::Reading(r) if r.kind == SensorKind::Humidity));
    }

    #[test]
    fn rejects_bad_scalars() {
        assert!(matches!(parse_scalar(b"warm"), Err(PayloadError::InvalidNumber(_))));
        assert!(matches!(parse_scalar(b"NaN"), Err(PayloadError::InvalidNumber(_))));
        assert!(matches!(parse_scalar(b""), Err(PayloadError::InvalidNumber(_))));
        assert!(matches!(parse_scalar(&[0xff, 0xfe]), Err(PayloadError::NotUtf8)));
    }

    #[test]
    fn decodes_audio_payload() {
        let bytes = pcm::encode(&[1000, -1000, 1000, -1000]);
        let json = serde_json::json!({
            "data": BASE64_STANDARD.encode(&bytes),
            "sample_rate": 16000,
            "duration": 0.25,
        });
        let payload = serde_json::to_vec(&json).unwrap();

        let decoded = decode(&TopicConfig::default(), "sensor/mic-1/audio", &payload, now()).unwrap();
        let Decoded::Audio(audio) = decoded else {
            panic!("expected audio, got {decoded:?}");
        };
        assert_eq!(audio.device_id, "mic-1");
        assert_eq!(audio.pcm, bytes);
        assert_eq!(audio.sample_rate, 16000);
        assert_eq!(audio.duration, 0.25);
        assert_eq!(audio.timestamp, now());
    }

    #[test]
    fn rejects_bad_audio() {
        let bad_b64 = br#"{"data":"***","sample_rate":16000,"duration":1.0}"#;
        assert!(matches!(parse_audio("d1", bad_b64, now()), Err(PayloadError::Base64(_))));

        let missing_rate = br#"{"data":"AAA="}"#;
        assert!(matches!(parse_audio("d1", missing_rate, now()), Err(PayloadError::Json(_))));
    }

    #[test]
    fn control_device_falls_back_to_topic() {
        let payload = br#"{"position":55.0,"confidence":0.8,"features_used":{"temperature":21.0}}"#;
        let decoded = decode(&TopicConfig::default(), "window/d7/control", payload, now()).unwrap();
        let Decoded::Control(control) = decoded else {
            panic!("expected control");
        };
        assert_eq!(control.device_id, "d7");
        assert_eq!(control.timestamp, now());
        assert_eq!(control.features_used["temperature"], 21.0);

        let payload = br#"{"device_id":"d8","position":10.0,"confidence":0.1}"#;
        let control = parse_control("d7", payload, now()).unwrap();
        assert_eq!(control.device_id, "d8");
    }

    #[test]
    fn control_out_of_range_is_rejected() {
        let payload = br#"{"position":120.0,"confidence":0.5}"#;
        assert!(matches!(
            parse_control("d1", payload, now()),
            Err(PayloadError::OutOfRange { field: "position", .. })
        ));
        let payload = br#"{"position":20.0,"confidence":1.5}"#;
        assert!(matches!(
            parse_control("d1", payload, now()),
            Err(PayloadError::OutOfRange { field: "confidence", .. })
        ));
    }

    #[test]
    fn unknown_topic_is_rejected() {
        let err = decode(&TopicConfig::default(), "sensor/d1/pressure", b"1", now()).unwrap_err();
        assert!(matches!(err, PayloadError::UnknownTopic(t) if t == "sensor/d1/pressure"));
    }

    #[test]
    fn encodes_inference_request_as_json() {
        let req = InferenceRequest {
            device_id: "d2".into(),
            timestamp: now(),
            temperature: 21.0,
            humidity: 40.0,
            volume: -35.5,
        };
        let bytes = encode_inference_request(&req).unwrap();
        let back: InferenceRequest = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(back, req);
    }
}
