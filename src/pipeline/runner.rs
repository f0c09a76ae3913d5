//! Orchestrator: builds the queues, spawns every task, coordinates shutdown.
//!
//! # Task graph
//!
//! ```text
//! inbound_tx ─▶ Router ─▶ temperature ─▶ ingest ─┐
//!                     ├─▶ humidity    ─▶ ingest ─┤
//!                     ├─▶ audio       ─▶ ingest ─┼─▶ TimeSeriesStore ◀─ TriggerEngine
//!                     └─▶ control     ─▶ ingest ─┘                          │
//!                                                                 inference queue
//!                                                                          │
//!                                                              Publisher ─▶ MessageSink
//! ```
//!
//! # Shutdown
//!
//! [`RunningPipeline::shutdown`] fires the shared [`CancellationToken`] and
//! drops the orchestrator's inbound sender.  Each task drops its own output
//! senders when its loop exits, so queues close front to back.  Tasks still
//! running when the grace period ends are aborted.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;
use crate::ingest::IngestionService;
use crate::pipeline::channels::Queues;
use crate::store::TimeSeriesStore;
use crate::transport::{InboundMessage, MessageSink, Publisher, Router};
use crate::trigger::{DeviceTracker, TriggerEngine};

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

pub struct Orchestrator {
    config: AppConfig,
    store: Arc<dyn TimeSeriesStore>,
    sink: Arc<dyn MessageSink>,
}

impl Orchestrator {
    pub fn new(config: AppConfig, store: Arc<dyn TimeSeriesStore>, sink: Arc<dyn MessageSink>) -> Self {
        Self {
            config,
            store,
            sink,
        }
    }

    /// Spawn every task on the current tokio runtime.
    pub fn start(self) -> RunningPipeline {
        let Orchestrator {
            config,
            store,
            sink,
        } = self;

        let cancel = CancellationToken::new();
        let tracker = DeviceTracker::new();
        let queues = Queues::new(&config.queues);
        let mut handles: Vec<(&'static str, JoinHandle<()>)> = Vec::new();

        let router = Router::new(config.topics.clone(), &config.queues, queues.ingest_tx);
        let inbound_rx = queues.inbound_rx;
        let router_cancel = cancel.clone();
        handles.push((
            "router",
            tokio::spawn(async move {
                router.run(inbound_rx, router_cancel).await;
            }),
        ));

        let ingest = IngestionService::new(store.clone(), tracker.clone(), &config.audio);
        for handle in ingest.spawn(queues.ingest_rx, &cancel) {
            handles.push(("ingest", handle));
        }

        let engine = TriggerEngine::new(
            store,
            tracker.clone(),
            config.trigger.clone(),
            queues.inference_tx,
            config.queues.inference_send_timeout(),
        );
        handles.push(("trigger", tokio::spawn(engine.run(cancel.clone()))));

        let publisher = Publisher::new(sink, config.topics.inference_request.clone());
        let inference_rx = queues.inference_rx;
        handles.push((
            "publisher",
            tokio::spawn(async move {
                publisher.run(inference_rx).await;
            }),
        ));

        log::info!("pipeline: started {} tasks", handles.len());

        RunningPipeline {
            inbound: queues.inbound_tx,
            tracker,
            cancel,
            handles,
            grace: config.shutdown_grace(),
        }
    }
}

// ---------------------------------------------------------------------------
// RunningPipeline
// ---------------------------------------------------------------------------

/// Handle to a started pipeline.
pub struct RunningPipeline {
    inbound: mpsc::Sender<InboundMessage>,
    tracker: DeviceTracker,
    cancel: CancellationToken,
    handles: Vec<(&'static str, JoinHandle<()>)>,
    grace: Duration,
}

impl RunningPipeline {
    /// Sender for raw transport messages.  Clones held elsewhere must be
    /// dropped for the router to see the queue close.
    pub fn inbound(&self) -> mpsc::Sender<InboundMessage> {
        self.inbound.clone()
    }

    pub fn tracker(&self) -> &DeviceTracker {
        &self.tracker
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancel every task and wait up to the grace period for them to finish.
    /// Returns the number of tasks that had to be aborted.
    pub async fn shutdown(self) -> usize {
        log::info!("pipeline: shutting down (grace {:?})", self.grace);
        self.cancel.cancel();
        drop(self.inbound);

        let deadline = tokio::time::Instant::now() + self.grace;
        let mut aborted = 0;

        for (name, mut handle) in self.handles {
            match tokio::time::timeout_at(deadline, &mut handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => log::error!("pipeline: {name} task failed: {e}"),
                Err(_) => {
                    log::warn!("pipeline: {name} task did not stop in time, aborting");
                    handle.abort();
                    aborted += 1;
                }
            }
        }

        log::info!("pipeline: stopped ({} device(s) tracked)", self.tracker.len());
        aborted
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
