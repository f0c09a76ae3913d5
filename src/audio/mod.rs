//! Audio signal extraction: raw device PCM → ambient volume + clip metrics.
//!
//! # Pipeline
//!
//! ```text
//! AudioBuffer.pcm (16-bit LE) → pcm::rms → VolumeExtractor (dB, clamped)
//!                             → AudioQuality (peak, clipping, silence)
//! ```
//!
//! Everything here is pure and safe to call from any number of tasks.

pub mod pcm;
pub mod quality;
pub mod volume;

pub use quality::{AudioMetrics, AudioQuality};
pub use volume::{volume_db, VolumeExtractor};
