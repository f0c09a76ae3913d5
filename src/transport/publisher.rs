//! Outgoing side: drains inference requests and hands them to a [`MessageSink`].

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::model::InferenceRequest;
use crate::transport::codec::encode_inference_request;
use crate::transport::topics::format_topic;

// ---------------------------------------------------------------------------
// TransportError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("publish failed: {0}")]
    Publish(String),

    #[error("transport closed")]
    Closed,
}

// ---------------------------------------------------------------------------
// MessageSink trait
// ---------------------------------------------------------------------------

/// Whatever actually moves bytes to the broker.  Reconnects and delivery
/// guarantees are the implementor's business.
#[async_trait]
pub trait MessageSink: Send + Sync {
    async fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), TransportError>;
}

// Compile-time check that MessageSink is object-safe.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn MessageSink>) {}
};

// ---------------------------------------------------------------------------
// Publisher
// ---------------------------------------------------------------------------

pub struct Publisher {
    sink: Arc<dyn MessageSink>,
    topic_pattern: String,
}

impl Publisher {
    /// `topic_pattern` must contain `{device_id}`.
    pub fn new(sink: Arc<dyn MessageSink>, topic_pattern: impl Into<String>) -> Self {
        Self {
            sink,
            topic_pattern: topic_pattern.into(),
        }
    }

    /// Publish until the request queue is closed and empty.  Returns the
    /// number of requests successfully published.
    ///
    /// Takes no cancellation token.  The loop ends once the poller has
    /// dropped its sender and everything already queued is flushed.
    pub async fn run(self, mut requests: mpsc::Receiver<InferenceRequest>) -> usize {
        let mut published = 0;
        log::info!("publisher: started");

        while let Some(req) = requests.recv().await {
            match self.publish(&req).await {
                Ok(()) => {
                    published += 1;
                    log::info!("publisher: inference request sent for {}", req.device_id);
                }
                Err(e) => log::error!("publisher: {} request lost: {e}", req.device_id),
            }
        }

        log::info!("publisher: stopped after {published} requests");
        published
    }

    pub async fn publish(&self, request: &InferenceRequest) -> Result<(), TransportError> {
        let topic = format_topic(&self.topic_pattern, &request.device_id);
        let payload = encode_inference_request(request)?;
        self.sink.publish(&topic, &payload).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use chrono::Utc;

    use crate::model::FeatureVector;

    #[derive(Default)]
    struct RecordingSink {
        sent: Mutex<Vec<(String, Vec<u8>)>>,
        fail_for: Option<String>,
    }

    #[async_trait]
    impl MessageSink for RecordingSink {
        async fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), TransportError> {
            if self.fail_for.as_deref().is_some_and(|t| topic.ends_with(t)) {
                return Err(TransportError::Publish("broker down".into()));
            }
            self.sent
                .lock()
                .unwrap()
                .push((topic.to_string(), payload.to_vec()));
            Ok(())
        }
    }

    fn request(device: &str) -> InferenceRequest {
        InferenceRequest::new(device, Utc::now(), FeatureVector::new(21.0, 40.0, -30.0))
    }

    #[tokio::test]
    async fn publishes_to_device_topic_until_closed() {
        let sink = Arc::new(RecordingSink::default());
        let publisher = Publisher::new(sink.clone(), "inference/request/{device_id}");
        let (tx, rx) = mpsc::channel(4);

        tx.send(request("d1")).await.unwrap();
        tx.send(request("d2")).await.unwrap();
        drop(tx);

        assert_eq!(publisher.run(rx).await, 2);

        let sent = sink.sent.lock().unwrap();
        assert_eq!(sent[0].0, "inference/request/d1");
        assert_eq!(sent[1].0, "inference/request/d2");
        let body: InferenceRequest = serde_json::from_slice(&sent[0].1).unwrap();
        assert_eq!(body.device_id, "d1");
        assert_eq!(body.volume, -30.0);
    }

    #[tokio::test]
    async fn sink_failure_does_not_stop_the_loop() {
        let sink = Arc::new(RecordingSink {
            fail_for: Some("/d1".into()),
            ..Default::default()
        });
        let publisher = Publisher::new(sink.clone(), "inference/request/{device_id}");
        let (tx, rx) = mpsc::channel(4);

        tx.send(request("d1")).await.unwrap();
        tx.send(request("d2")).await.unwrap();
        drop(tx);

        assert_eq!(publisher.run(rx).await, 1);
        assert_eq!(sink.sent.lock().unwrap().len(), 1);
    }
}
