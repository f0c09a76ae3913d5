//! Per-clip audio metrics recorded alongside the extracted volume.
//!
//! [`AudioQuality`] inspects a 16-bit PCM clip and reports:
//!
//! | Metric | Description |
//! |--------|-------------|
//! | RMS / volume | Same values the [`VolumeExtractor`] derives |
//! | Peak | Largest absolute sample |
//! | Clipping | Any sample magnitude above `clipping_threshold` |
//! | Silent | RMS below the extractor's `min_rms`, or an unusable buffer |
//!
//! None of these reject a clip; they only enrich the stored metadata.
//!
//! # Example
//!
//! ```rust
//! use env_trigger::audio::{pcm, AudioQuality, VolumeExtractor};
//!
//! let quality = AudioQuality::default();
//! let clip = pcm::encode(&[32_500, -32_500, 100, -100]);
//! let metrics = quality.analyze(&clip, &VolumeExtractor::default());
//! assert!(metrics.clipping);
//! assert_eq!(metrics.peak_amplitude, 32_500);
//! ```

use crate::audio::pcm;
use crate::audio::volume::VolumeExtractor;

// ---------------------------------------------------------------------------
// AudioMetrics
// ---------------------------------------------------------------------------

/// Result of [`AudioQuality::analyze`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioMetrics {
    /// Number of whole 16-bit samples in the clip.
    pub sample_count: usize,
    /// RMS in raw sample units, after the `min_rms` floor.
    pub rms: f64,
    pub volume_db: f64,
    pub peak_amplitude: u16,
    pub clipping: bool,
    pub silent: bool,
}

// ---------------------------------------------------------------------------
// AudioQuality
// ---------------------------------------------------------------------------

/// Clip analyser.  The `Default` threshold sits just below 16-bit full scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioQuality {
    /// Sample magnitude above which a sample counts as clipped
    /// (default: `32000`).
    pub clipping_threshold: u16,
}

impl Default for AudioQuality {
    fn default() -> Self {
        Self {
            clipping_threshold: 32_000,
        }
    }
}

impl AudioQuality {
    pub fn new(clipping_threshold: u16) -> Self {
        Self { clipping_threshold }
    }

    /// Analyse `clip`.  Malformed buffers (empty / odd length) come back
    /// silent at the extractor's floor rather than as an error.
    pub fn analyze(&self, clip: &[u8], extractor: &VolumeExtractor) -> AudioMetrics {
        let sample_count = clip.len() / pcm::BYTES_PER_SAMPLE;

        let Some(raw_rms) = pcm::rms(clip) else {
            return AudioMetrics {
                sample_count,
                rms: extractor.min_rms,
                volume_db: extractor.floor_db,
                peak_amplitude: pcm::peak_amplitude(clip),
                clipping: false,
                silent: true,
            };
        };

        let peak_amplitude = pcm::peak_amplitude(clip);

        AudioMetrics {
            sample_count,
            rms: raw_rms.max(extractor.min_rms),
            volume_db: extractor.rms_to_db(raw_rms),
            peak_amplitude,
            clipping: peak_amplitude > self.clipping_threshold,
            silent: raw_rms < extractor.min_rms,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
