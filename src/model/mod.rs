//! Shared data model for the ingestion pipeline and the trigger engine.
//!
//! | Type | Produced by | Consumed by |
//! |------|-------------|-------------|
//! | [`SensorReading`] | transport router | ingestion |
//! | [`AudioBuffer`] | transport router | ingestion (once, then dropped) |
//! | [`AudioMeta`] | ingestion | store |
//! | [`WindowAggregate`] / [`BaselineStats`] | store | trigger engine |
//! | [`TriggerRecord`] | trigger engine | store (append-only) |
//! | [`InferenceRequest`] | trigger engine | transport publisher |
//! | [`WindowControl`] | transport router | ingestion (logged + recorded) |

pub mod control;
pub mod reading;
pub mod trigger;

pub use control::WindowControl;
pub use reading::{AudioBuffer, AudioMeta, SensorKind, SensorReading};
pub use trigger::{
    BaselineStats, Feature, FeatureVector, InferenceRequest, TriggerReason, TriggerRecord,
    WindowAggregate,
};
