//! Line-oriented transport for running the core without a broker.
//!
//! Each input line is `<topic> <payload>`; each published message is written
//! the same way.  Handy for piping recorded sensor traffic through the core
//! or bridging to `mosquitto_sub` / `mosquitto_pub`.

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use crate::queue::{offer, Offer};
use crate::transport::publisher::{MessageSink, TransportError};
use crate::transport::subscriber::InboundMessage;

/// Split `<topic> <payload>`.  `None` for blank lines or a missing payload.
pub fn parse_line(line: &str) -> Option<InboundMessage> {
    let line = line.trim();
    let (topic, payload) = line.split_once(char::is_whitespace)?;
    let payload = payload.trim_start();
    if payload.is_empty() {
        return None;
    }
    Some(InboundMessage::new(topic, payload))
}

/// Feed lines from `reader` into the inbound queue until EOF or cancellation.
/// Returns the number of messages queued.
pub async fn pump_lines<R>(
    reader: R,
    inbound: mpsc::Sender<InboundMessage>,
    wait: std::time::Duration,
    cancel: CancellationToken,
) -> usize
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut queued = 0;

    loop {
        let line = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            line = lines.next_line() => line,
        };

        match line {
            Ok(Some(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                let Some(msg) = parse_line(&line) else {
                    log::warn!("stdio: ignoring line without payload: {line:?}");
                    continue;
                };
                let topic = msg.topic.clone();
                match offer(&inbound, msg, wait, "inbound", &topic).await {
                    Offer::Delivered => queued += 1,
                    Offer::Full => {}
                    Offer::Closed => break,
                }
            }
            Ok(None) => {
                log::info!("stdio: input closed");
                break;
            }
            Err(e) => {
                log::error!("stdio: read failed: {e}");
                break;
            }
        }
    }

    queued
}

/// [`MessageSink`] writing `<topic> <payload>\n` to any async writer.
pub struct LineSink<W> {
    writer: Mutex<W>,
}

impl<W> LineSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

pub type StdoutSink = LineSink<tokio::io::Stdout>;

impl StdoutSink {
    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }
}

#[async_trait]
impl<W> MessageSink for LineSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), TransportError> {
        let mut line = Vec::with_capacity(topic.len() + payload.len() + 2);
        line.extend_from_slice(topic.as_bytes());
        line.push(b' ');
        line.extend_from_slice(payload);
        line.push(b'\n');

        let mut writer = self.writer.lock().await;
        writer
            .write_all(&line)
            .await
            .map_err(|e| TransportError::Publish(e.to_string()))?;
        writer
            .flush()
            .await
            .map_err(|e| TransportError::Publish(e.to_string()))
    }
}
