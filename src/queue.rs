//! Bounded handoff between tasks: wait briefly on a full queue, then drop.
//!
//! Every producer in the pipeline (router → ingestion, poller → publisher)
//! goes through [`offer`] so that a stalled consumer costs at most one
//! timeout per item and never blocks the producer indefinitely.

use std::time::Duration;

use tokio::sync::mpsc::{self, error::SendTimeoutError};

/// Outcome of [`offer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offer {
    /// The item was queued.
    Delivered,
    /// The queue stayed full for the whole wait; the item was dropped.
    Full,
    /// The consumer has gone away; the item was dropped.
    Closed,
}

impl Offer {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Offer::Delivered)
    }
}

/// Send `item` on `tx`, waiting at most `wait` for capacity.
///
/// Dropped items are logged at `warn` under `label` (e.g. `"temperature"`)
/// together with `device_id`.
pub async fn offer<T>(
    tx: &mpsc::Sender<T>,
    item: T,
    wait: Duration,
    label: &str,
    device_id: &str,
) -> Offer {
    match tx.send_timeout(item, wait).await {
        Ok(()) => Offer::Delivered,
        Err(SendTimeoutError::Timeout(_)) => {
            log::warn!(
                "{label} queue full for {}ms, dropping item from {device_id}",
                wait.as_millis()
            );
            Offer::Full
        }
        Err(SendTimeoutError::Closed(_)) => {
            log::warn!("{label} queue closed, dropping item from {device_id}");
            Offer::Closed
        }
    }
}
