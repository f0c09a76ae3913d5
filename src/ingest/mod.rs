//! Ingestion service: drains the typed queues into the store.
//!
//! # Loops
//!
//! ```text
//! temperature rx ─┐
//! humidity rx    ─┼─▶ save_reading      ─┐
//! audio rx       ───▶ volume + AudioMeta ─┼─▶ upsert_device (best effort) ─▶ DeviceTracker
//! control rx     ───▶ log + save_control_response (best effort)
//! ```
//!
//! Each loop is its own task.  A loop ends when its queue is closed and
//! empty; after cancellation it stops waiting for new items but still
//! processes whatever is already buffered.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::audio::{AudioQuality, VolumeExtractor};
use crate::config::AudioConfig;
use crate::model::{AudioBuffer, AudioMeta, SensorReading, WindowControl};
use crate::store::TimeSeriesStore;
use crate::trigger::DeviceTracker;

/// Consumer ends of the ingestion queues.
pub struct IngestReceivers {
    pub temperature: mpsc::Receiver<SensorReading>,
    pub humidity: mpsc::Receiver<SensorReading>,
    pub audio: mpsc::Receiver<AudioBuffer>,
    pub control: mpsc::Receiver<WindowControl>,
}

/// Next queued item.  Once `cancel` has fired this never waits: it returns
/// buffered items until the queue is empty, then `None`.
async fn next_item<T>(rx: &mut mpsc::Receiver<T>, cancel: &CancellationToken) -> Option<T> {
    if cancel.is_cancelled() {
        return rx.try_recv().ok();
    }
    tokio::select! {
        biased;
        item = rx.recv() => item,
        _ = cancel.cancelled() => rx.try_recv().ok(),
    }
}

/// Lower-case hex SHA-256 of `bytes`.
pub fn content_hash(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

#[derive(Clone)]
pub struct IngestionService {
    store: Arc<dyn TimeSeriesStore>,
    tracker: DeviceTracker,
    extractor: VolumeExtractor,
    quality: AudioQuality,
}

impl IngestionService {
    pub fn new(store: Arc<dyn TimeSeriesStore>, tracker: DeviceTracker, audio: &AudioConfig) -> Self {
        Self {
            store,
            tracker,
            extractor: VolumeExtractor::from_config(audio),
            quality: AudioQuality::new(audio.clipping_threshold),
        }
    }

    /// Spawn one task per queue.
    pub fn spawn(&self, queues: IngestReceivers, cancel: &CancellationToken) -> Vec<JoinHandle<()>> {
        let IngestReceivers {
            temperature,
            humidity,
            audio,
            control,
        } = queues;

        vec![
            tokio::spawn(self.clone().reading_loop("temperature", temperature, cancel.clone())),
            tokio::spawn(self.clone().reading_loop("humidity", humidity, cancel.clone())),
            tokio::spawn(self.clone().audio_loop(audio, cancel.clone())),
            tokio::spawn(self.clone().control_loop(control, cancel.clone())),
        ]
    }

    async fn reading_loop(
        self,
        label: &'static str,
        mut rx: mpsc::Receiver<SensorReading>,
        cancel: CancellationToken,
    ) {
        let mut saved = 0usize;
        while let Some(reading) = next_item(&mut rx, &cancel).await {
            if self.ingest_reading(&reading).await {
                saved += 1;
            }
        }
        log::info!("ingest: {label} loop stopped after {saved} readings");
    }

    async fn audio_loop(self, mut rx: mpsc::Receiver<AudioBuffer>, cancel: CancellationToken) {
        let mut saved = 0usize;
        while let Some(clip) = next_item(&mut rx, &cancel).await {
            if self.ingest_audio(clip).await.is_some() {
                saved += 1;
            }
        }
        log::info!("ingest: audio loop stopped after {saved} clips");
    }

    async fn control_loop(self, mut rx: mpsc::Receiver<WindowControl>, cancel: CancellationToken) {
        let mut seen = 0usize;
        while let Some(control) = next_item(&mut rx, &cancel).await {
            self.record_control(&control).await;
            seen += 1;
        }
        log::info!("ingest: control loop stopped after {seen} responses");
    }

    /// Persist one scalar reading.  Returns `false` if the store rejected it,
    /// in which case the device is not registered.
    pub async fn ingest_reading(&self, reading: &SensorReading) -> bool {
        if let Err(e) = self.store.save_reading(reading).await {
            log::error!(
                "ingest: lost {} reading from {}: {e}",
                reading.kind,
                reading.device_id
            );
            return false;
        }
        log::debug!(
            "ingest: saved {} {:.2} from {}",
            reading.kind,
            reading.value,
            reading.device_id
        );
        self.touch_device(&reading.device_id, reading.timestamp).await;
        true
    }

    /// Derive the volume and metadata for a clip, persist the metadata and
    /// drop the PCM bytes.
    pub async fn ingest_audio(&self, clip: AudioBuffer) -> Option<AudioMeta> {
        let metrics = self.quality.analyze(&clip.pcm, &self.extractor);
        if metrics.clipping {
            log::debug!(
                "ingest: clip from {} is clipping (peak {})",
                clip.device_id,
                metrics.peak_amplitude
            );
        }
        if metrics.silent {
            log::debug!(
                "ingest: clip from {} is silent ({} samples, rms {:.2})",
                clip.device_id,
                metrics.sample_count,
                metrics.rms
            );
        }

        let meta = AudioMeta {
            hash: content_hash(&clip.pcm),
            device_id: clip.device_id,
            timestamp: clip.timestamp,
            sample_rate: clip.sample_rate,
            duration: clip.duration,
            volume_db: metrics.volume_db,
            peak_amplitude: metrics.peak_amplitude,
            clipping: metrics.clipping,
        };

        if let Err(e) = self.store.save_audio_meta(&meta).await {
            log::error!("ingest: lost audio metadata from {}: {e}", meta.device_id);
            return None;
        }
        log::debug!(
            "ingest: saved audio from {} ({:.2} dB, {:.2}s, hash {})",
            meta.device_id,
            meta.volume_db,
            meta.duration,
            &meta.hash[..8]
        );
        self.touch_device(&meta.device_id, meta.timestamp).await;
        Some(meta)
    }

    pub async fn record_control(&self, control: &WindowControl) {
        log::info!(
            "ingest: window control for {}: position {:.1}% (confidence {:.2})",
            control.device_id,
            control.position,
            control.confidence
        );
        if let Err(e) = self.store.save_control_response(control).await {
            log::warn!(
                "ingest: could not record control response for {}: {e}",
                control.device_id
            );
        }
    }

    async fn touch_device(&self, device_id: &str, seen_at: DateTime<Utc>) {
        if let Err(e) = self.store.upsert_device(device_id, seen_at).await {
            log::warn!("ingest: device upsert failed for {device_id}: {e}");
        }
        if self.tracker.register(device_id) {
            log::info!("ingest: new device {device_id}");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
