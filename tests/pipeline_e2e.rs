//! End-to-end runs of the full orchestrator against the in-memory store.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};

use env_trigger::audio::pcm;
use env_trigger::config::AppConfig;
use env_trigger::model::{
    AudioMeta, InferenceRequest, SensorKind, SensorReading, TriggerReason, TriggerRecord,
};
use env_trigger::pipeline::{Orchestrator, RunningPipeline};
use env_trigger::store::{MemoryStore, TimeSeriesStore};
use env_trigger::transport::{InboundMessage, MessageSink, TransportError};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

#[derive(Default)]
struct RecordingSink {
    sent: Mutex<Vec<(String, InferenceRequest)>>,
}

impl RecordingSink {
    fn sent(&self) -> Vec<(String, InferenceRequest)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageSink for RecordingSink {
    async fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), TransportError> {
        let request: InferenceRequest = serde_json::from_slice(payload)?;
        self.sent.lock().unwrap().push((topic.to_string(), request));
        Ok(())
    }
}

fn fast_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.trigger.poll_interval_secs = 0.05;
    config
}

fn start(store: Arc<MemoryStore>, sink: Arc<RecordingSink>) -> RunningPipeline {
    Orchestrator::new(fast_config(), store, sink).start()
}

async fn send(running: &RunningPipeline, topic: &str, payload: &str) {
    running
        .inbound()
        .send(InboundMessage::new(topic, payload))
        .await
        .unwrap();
}

async fn wait_for_device(running: &RunningPipeline, device_id: &str) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !running.tracker().contains(device_id) {
        assert!(
            tokio::time::Instant::now() < deadline,
            "{device_id} was never registered"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

fn ago(secs: i64) -> DateTime<Utc> {
    Utc::now() - chrono::Duration::seconds(secs)
}

async fn seed(store: &MemoryStore, device: &str, ts: DateTime<Utc>, t: f64, h: f64, v: f64) {
    store
        .save_reading(&SensorReading::new(device, SensorKind::Temperature, t, ts))
        .await
        .unwrap();
    store
        .save_reading(&SensorReading::new(device, SensorKind::Humidity, h, ts))
        .await
        .unwrap();
    store
        .save_audio_meta(&AudioMeta {
            device_id: device.to_string(),
            timestamp: ts,
            sample_rate: 16_000,
            duration: 1.0,
            hash: String::new(),
            volume_db: v,
            peak_amplitude: 0,
            clipping: false,
        })
        .await
        .unwrap();
}

fn audio_payload(amplitude: i16, samples: usize) -> String {
    let bytes = pcm::encode(&vec![amplitude; samples]);
    serde_json::json!({
        "data": BASE64_STANDARD.encode(bytes),
        "sample_rate": 16_000,
        "duration": samples as f64 / 16_000.0,
    })
    .to_string()
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn new_device_gets_exactly_one_first_inference() {
    let store = Arc::new(MemoryStore::new());
    let sink = Arc::new(RecordingSink::default());

    // Temperature and humidity are already stored, so the window is complete
    // the moment the audio clip registers the device.
    let now = Utc::now();
    store
        .save_reading(&SensorReading::new("d2", SensorKind::Temperature, 21.5, now))
        .await
        .unwrap();
    store
        .save_reading(&SensorReading::new("d2", SensorKind::Humidity, 48.0, now))
        .await
        .unwrap();

    let running = start(store.clone(), sink.clone());
    send(&running, "sensor/d2/audio", &audio_payload(3277, 1600)).await;
    wait_for_device(&running, "d2").await;

    tokio::time::sleep(Duration::from_millis(400)).await;
    running.shutdown().await;

    let sent = sink.sent();
    assert_eq!(sent.len(), 1, "expected one request, got {sent:?}");
    let (topic, request) = &sent[0];
    assert_eq!(topic, "inference/request/d2");
    assert_eq!(request.device_id, "d2");
    assert_eq!(request.temperature, 21.5);
    assert_eq!(request.humidity, 48.0);
    assert!((request.volume - (-20.0)).abs() < 0.1, "volume {}", request.volume);

    let records = store.trigger_records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].reason, TriggerReason::FirstInference);
}

#[tokio::test]
async fn small_drift_after_previous_trigger_does_not_fire() {
    let store = Arc::new(MemoryStore::new());
    let sink = Arc::new(RecordingSink::default());

    // History with real spread, one complete window before the last trigger.
    let two_days_ago = Utc::now() - chrono::Duration::days(2);
    seed(&store, "d1", two_days_ago, 16.0, 30.0, -50.0).await;
    seed(&store, "d1", two_days_ago + chrono::Duration::minutes(5), 24.0, 50.0, -30.0).await;
    seed(&store, "d1", ago(60), 20.0, 40.0, -40.0).await;
    store
        .save_trigger_record(&TriggerRecord {
            device_id: "d1".into(),
            timestamp: ago(30),
            reason: TriggerReason::FirstInference,
            z_temperature: 0.0,
            z_humidity: 0.0,
            z_volume: 0.0,
        })
        .await
        .unwrap();

    let running = start(store.clone(), sink.clone());
    send(&running, "sensor/d1/temperature", "20.1").await;
    send(&running, "sensor/d1/humidity", "40").await;
    send(&running, "sensor/d1/audio", &audio_payload(328, 1600)).await;
    wait_for_device(&running, "d1").await;

    tokio::time::sleep(Duration::from_millis(400)).await;
    running.shutdown().await;

    assert!(sink.sent().is_empty(), "unexpected requests: {:?}", sink.sent());
    assert_eq!(store.trigger_records().len(), 1);
    assert_eq!(store.audio_metas().len(), 4);
}

#[tokio::test]
async fn large_jump_fires_with_matching_reason() {
    let store = Arc::new(MemoryStore::new());
    let sink = Arc::new(RecordingSink::default());

    // Last-trigger window sits well outside the current one.
    let trigger_at = ago(600);
    seed(&store, "d3", trigger_at - chrono::Duration::seconds(10), 20.0, 40.0, -40.0).await;
    seed(&store, "d3", trigger_at - chrono::Duration::seconds(20), 22.0, 40.0, -40.0).await;
    store
        .save_trigger_record(&TriggerRecord {
            device_id: "d3".into(),
            timestamp: trigger_at,
            reason: TriggerReason::FirstInference,
            z_temperature: 0.0,
            z_humidity: 0.0,
            z_volume: 0.0,
        })
        .await
        .unwrap();
    // Current window: temperature far above, humidity and volume unchanged.
    seed(&store, "d3", ago(5), 40.0, 40.0, -40.0).await;

    let running = start(store.clone(), sink.clone());
    send(&running, "sensor/d3/humidity", "40").await;
    wait_for_device(&running, "d3").await;

    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while sink.sent().is_empty() && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    running.shutdown().await;

    let sent = sink.sent();
    assert!(!sent.is_empty(), "no request published");
    assert_eq!(sent[0].1.temperature, 40.0);

    let records = store.trigger_records();
    let fired = &records[1];
    assert_eq!(fired.reason.to_string(), "temperature_zscore");
    assert!(fired.z_temperature >= 1.5);
    assert_eq!(fired.z_humidity, 0.0);
}

#[tokio::test]
async fn malformed_traffic_is_ignored() {
    let store = Arc::new(MemoryStore::new());
    let sink = Arc::new(RecordingSink::default());
    let running = start(store.clone(), sink);

    send(&running, "sensor/d4/temperature", "not-a-number").await;
    send(&running, "sensor/d4/audio", "{\"data\": 5}").await;
    send(&running, "window/d4/control", "{\"position\": 500, \"confidence\": 0.5}").await;
    send(&running, "sensor/d4/temperature", "19.5").await;
    send(&running, "window/d4/control", "{\"position\": 50, \"confidence\": 0.5}").await;
    wait_for_device(&running, "d4").await;

    tokio::time::sleep(Duration::from_millis(100)).await;
    running.shutdown().await;

    assert_eq!(store.readings().len(), 1);
    assert!(store.audio_metas().is_empty());
    assert_eq!(store.control_responses().len(), 1);
    assert_eq!(store.control_responses()[0].device_id, "d4");
}
