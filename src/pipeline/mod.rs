//! Pipeline wiring.
//!
//! [`Orchestrator`] owns construction: it creates every bounded queue
//! ([`Queues`]), hands each task its ends, and spawns router, ingestion
//! loops, trigger poller and publisher on the current runtime.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use env_trigger::config::AppConfig;
//! use env_trigger::pipeline::Orchestrator;
//! use env_trigger::store::MemoryStore;
//! use env_trigger::transport::{InboundMessage, StdoutSink};
//!
//! #[tokio::main]
//! async fn main() {
//!     let running = Orchestrator::new(
//!         AppConfig::default(),
//!         Arc::new(MemoryStore::new()),
//!         Arc::new(StdoutSink::stdout()),
//!     )
//!     .start();
//!
//!     running
//!         .inbound()
//!         .send(InboundMessage::new("sensor/d1/temperature", "21.0"))
//!         .await
//!         .unwrap();
//!
//!     running.shutdown().await;
//! }
//! ```

pub mod channels;
pub mod runner;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use channels::Queues;
pub use runner::{Orchestrator, RunningPipeline};
