//! Periodic poller that decides when a device needs a fresh inference.
//!
//! # Per-device decision
//!
//! ```text
//! no previous trigger            → first_inference (current means, 0 for gaps)
//! current window incomplete      → skip this tick
//! last-trigger window incomplete → missing_last_data
//! any |Z| >= threshold           → <feature>_zscore[,<feature>_zscore...]
//! otherwise                      → nothing
//! ```
//!
//! A firing decision writes one [`TriggerRecord`] and then offers one
//! [`InferenceRequest`] to the outgoing queue.  Store read failures skip the
//! device for the current tick only.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::config::TriggerConfig;
use crate::model::{FeatureVector, InferenceRequest, TriggerReason, TriggerRecord};
use crate::queue::{offer, Offer};
use crate::store::{StoreError, TimeSeriesStore};
use crate::trigger::tracker::DeviceTracker;
use crate::trigger::zscore::evaluate;

// ---------------------------------------------------------------------------
// Decision / PollSummary
// ---------------------------------------------------------------------------

/// A positive trigger decision for one device.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub reason: TriggerReason,
    /// Z-scores that were computed; zero where the path never got that far.
    pub z: FeatureVector,
    /// Values sent to the ML process.
    pub current: FeatureVector,
}

/// Counters for one pass over the tracked devices.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollSummary {
    pub checked: usize,
    pub triggered: usize,
    /// Triggered, but the inference request could not be queued.
    pub dropped: usize,
    /// Skipped because a store read failed.
    pub failed: usize,
}

// ---------------------------------------------------------------------------
// TriggerEngine
// ---------------------------------------------------------------------------

pub struct TriggerEngine {
    store: Arc<dyn TimeSeriesStore>,
    tracker: DeviceTracker,
    config: TriggerConfig,
    requests: mpsc::Sender<InferenceRequest>,
    send_timeout: Duration,
}

impl TriggerEngine {
    pub fn new(
        store: Arc<dyn TimeSeriesStore>,
        tracker: DeviceTracker,
        config: TriggerConfig,
        requests: mpsc::Sender<InferenceRequest>,
        send_timeout: Duration,
    ) -> Self {
        Self {
            store,
            tracker,
            config,
            requests,
            send_timeout,
        }
    }

    /// Poll every `poll_interval` until `cancel` fires.  The first poll runs
    /// immediately.  The request sender is dropped on return, which closes
    /// the outgoing queue once the publisher has drained it.
    pub async fn run(self, cancel: CancellationToken) {
        let period = self.config.poll_interval();
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        log::info!(
            "trigger: polling every {:.1}s (window {}s, baseline {}d, threshold {})",
            period.as_secs_f64(),
            self.config.window_secs,
            self.config.baseline_days,
            self.config.z_threshold
        );

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let summary = self.poll_once(&cancel).await;
                    log::debug!("trigger: poll finished {summary:?}");
                }
            }
        }

        log::info!("trigger: poller stopped");
    }

    /// One pass over every tracked device, strictly sequential per device.
    pub async fn poll_once(&self, cancel: &CancellationToken) -> PollSummary {
        let mut summary = PollSummary::default();
        if self.tracker.is_empty() {
            log::trace!("trigger: no devices tracked yet");
            return summary;
        }

        for device_id in self.tracker.list() {
            if cancel.is_cancelled() {
                break;
            }
            summary.checked += 1;

            match self.check_device(&device_id).await {
                Ok(Some(decision)) => {
                    summary.triggered += 1;
                    if !self.fire(&device_id, decision).await.is_delivered() {
                        summary.dropped += 1;
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    log::warn!("trigger: skipping {device_id} this tick: {e}");
                    summary.failed += 1;
                }
            }
        }

        summary
    }

    /// Decide whether `device_id` should trigger, without side effects.
    pub async fn check_device(&self, device_id: &str) -> Result<Option<Decision>, StoreError> {
        let window = self.config.window_secs;

        let Some(last_trigger) = self.store.last_trigger_timestamp(device_id).await? else {
            let current = self.store.window_aggregate(device_id, window, None).await?;
            return Ok(Some(Decision {
                reason: TriggerReason::FirstInference,
                z: FeatureVector::default(),
                current: current.means_or_zero(),
            }));
        };

        let Some(current) = self
            .store
            .window_aggregate(device_id, window, None)
            .await?
            .means()
        else {
            log::debug!("trigger: {device_id} has an incomplete current window");
            return Ok(None);
        };

        let Some(last) = self
            .store
            .window_aggregate(device_id, window, Some(last_trigger))
            .await?
            .means()
        else {
            return Ok(Some(Decision {
                reason: TriggerReason::MissingLastData,
                z: FeatureVector::default(),
                current,
            }));
        };

        let baseline = self
            .store
            .baseline_stddev(device_id, self.config.baseline_days)
            .await?;

        let eval = evaluate(current, last, baseline, self.config.z_threshold);
        log::debug!("trigger: {device_id} z={:?}", eval.z);

        if !eval.is_triggered() {
            return Ok(None);
        }
        Ok(Some(Decision {
            reason: TriggerReason::ZScore(eval.triggered),
            z: eval.z,
            current,
        }))
    }

    /// Record the decision, then hand the request to the publisher.
    async fn fire(&self, device_id: &str, decision: Decision) -> Offer {
        let now = Utc::now();
        let record = TriggerRecord {
            device_id: device_id.to_string(),
            timestamp: now,
            reason: decision.reason.clone(),
            z_temperature: decision.z.temperature,
            z_humidity: decision.z.humidity,
            z_volume: decision.z.volume,
        };

        if let Err(e) = self.store.save_trigger_record(&record).await {
            log::error!("trigger: could not record trigger for {device_id}: {e}");
        }

        log::info!("trigger: {device_id} fired ({})", decision.reason);

        let request = InferenceRequest::new(device_id, now, decision.current);
        offer(&self.requests, request, self.send_timeout, "inference", device_id).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
