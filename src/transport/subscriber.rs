//! Inbound router: raw transport messages → typed, bounded ingestion queues.
//!
//! The connection layer (stdio pump, broker client) only has to push
//! [`InboundMessage`]s onto the inbound queue.  [`Router`] decodes each one
//! and offers it to the queue for its kind with that kind's send timeout.
//! Malformed payloads are logged and discarded.

use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::{QueueConfig, TopicConfig};
use crate::model::{AudioBuffer, SensorKind, SensorReading, WindowControl};
use crate::queue::{offer, Offer};
use crate::transport::codec::{decode, Decoded};

/// One message as received from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl InboundMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// Producer ends of the ingestion queues.  Owned by the router and dropped
/// when it exits, which is what lets the ingestion loops finish.
pub struct IngestSenders {
    pub temperature: mpsc::Sender<SensorReading>,
    pub humidity: mpsc::Sender<SensorReading>,
    pub audio: mpsc::Sender<AudioBuffer>,
    pub control: mpsc::Sender<WindowControl>,
}

/// What happened to the messages the router saw.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouterStats {
    pub routed: usize,
    pub malformed: usize,
    pub dropped: usize,
}

pub struct Router {
    topics: TopicConfig,
    senders: IngestSenders,
    scalar_timeout: Duration,
    audio_timeout: Duration,
}

impl Router {
    pub fn new(topics: TopicConfig, queues: &QueueConfig, senders: IngestSenders) -> Self {
        Self {
            topics,
            senders,
            scalar_timeout: queues.scalar_send_timeout(),
            audio_timeout: queues.audio_send_timeout(),
        }
    }

    /// Route until the inbound queue closes or `cancel` fires.  After
    /// cancellation, messages already buffered are still routed.
    pub async fn run(
        self,
        mut inbound: mpsc::Receiver<InboundMessage>,
        cancel: CancellationToken,
    ) -> RouterStats {
        let mut stats = RouterStats::default();
        log::info!("router: started");

        loop {
            let msg = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    let mut drained = 0usize;
                    while let Ok(msg) = inbound.try_recv() {
                        self.route(msg, &mut stats).await;
                        drained += 1;
                    }
                    if drained > 0 {
                        log::info!("router: routed {drained} buffered message(s) after cancel");
                    }
                    break;
                }
                msg = inbound.recv() => match msg {
                    Some(msg) => msg,
                    None => break,
                },
            };
            self.route(msg, &mut stats).await;
        }

        log::info!(
            "router: stopped ({} routed, {} malformed, {} dropped)",
            stats.routed,
            stats.malformed,
            stats.dropped
        );
        stats
    }

    async fn route(&self, msg: InboundMessage, stats: &mut RouterStats) {
        let decoded = match decode(&self.topics, &msg.topic, &msg.payload, Utc::now()) {
            Ok(d) => d,
            Err(e) => {
                log::warn!("router: discarding message on {}: {e}", msg.topic);
                stats.malformed += 1;
                return;
            }
        };
        log::debug!("router: {} → {}", msg.topic, decoded.device_id());

        let outcome = match decoded {
            Decoded::Reading(reading) => {
                let device = reading.device_id.clone();
                let (tx, label) = match reading.kind {
                    SensorKind::Temperature => (&self.senders.temperature, "temperature"),
                    SensorKind::Humidity => (&self.senders.humidity, "humidity"),
                };
                offer(tx, reading, self.scalar_timeout, label, &device).await
            }
            Decoded::Audio(audio) => {
                let device = audio.device_id.clone();
                offer(&self.senders.audio, audio, self.audio_timeout, "audio", &device).await
            }
            Decoded::Control(control) => {
                let device = control.device_id.clone();
                offer(&self.senders.control, control, self.scalar_timeout, "control", &device)
                    .await
            }
        };

        match outcome {
            Offer::Delivered => stats.routed += 1,
            Offer::Full | Offer::Closed => stats.dropped += 1,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
