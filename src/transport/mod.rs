//! Transport adapter.
//!
//! ```text
//! connection ──InboundMessage──▶ inbound queue ──▶ Router ──▶ ingestion queues
//! TriggerEngine ──InferenceRequest──▶ request queue ──▶ Publisher ──▶ MessageSink
//! ```
//!
//! Only [`codec`] knows payload formats and only [`topics`] knows topic
//! layout.  [`stdio`] is the line-based connection used by the binary.

pub mod codec;
pub mod publisher;
pub mod stdio;
pub mod subscriber;
pub mod topics;

pub use codec::{Decoded, PayloadError};
pub use publisher::{MessageSink, Publisher, TransportError};
pub use stdio::{pump_lines, LineSink, StdoutSink};
pub use subscriber::{InboundMessage, IngestSenders, Router, RouterStats};
