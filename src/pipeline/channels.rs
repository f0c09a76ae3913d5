//! Every bounded queue in the pipeline, created in one place.

use tokio::sync::mpsc;

use crate::config::QueueConfig;
use crate::ingest::IngestReceivers;
use crate::model::InferenceRequest;
use crate::transport::{InboundMessage, IngestSenders};

/// Both ends of every queue, ready to be split up and injected.
pub struct Queues {
    pub inbound_tx: mpsc::Sender<InboundMessage>,
    pub inbound_rx: mpsc::Receiver<InboundMessage>,
    pub ingest_tx: IngestSenders,
    pub ingest_rx: IngestReceivers,
    pub inference_tx: mpsc::Sender<InferenceRequest>,
    pub inference_rx: mpsc::Receiver<InferenceRequest>,
}

impl Queues {
    /// Zero capacities are raised to 1; `AppConfig::validate` rejects them
    /// before this point in normal startup.
    pub fn new(config: &QueueConfig) -> Self {
        let bounded = |n: usize| n.max(1);

        let (inbound_tx, inbound_rx) = mpsc::channel(bounded(config.inbound));
        let (temperature_tx, temperature_rx) = mpsc::channel(bounded(config.temperature));
        let (humidity_tx, humidity_rx) = mpsc::channel(bounded(config.humidity));
        let (audio_tx, audio_rx) = mpsc::channel(bounded(config.audio));
        let (control_tx, control_rx) = mpsc::channel(bounded(config.control));
        let (inference_tx, inference_rx) = mpsc::channel(bounded(config.inference));

        Self {
            inbound_tx,
            inbound_rx,
            ingest_tx: IngestSenders {
                temperature: temperature_tx,
                humidity: humidity_tx,
                audio: audio_tx,
                control: control_tx,
            },
            ingest_rx: IngestReceivers {
                temperature: temperature_rx,
                humidity: humidity_rx,
                audio: audio_rx,
                control: control_rx,
            },
            inference_tx,
            inference_rx,
        }
    }
}
