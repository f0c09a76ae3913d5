//! Ambient-volume extraction: raw PCM clip → one decibel value.
//!
//! ## Algorithm
//!
//! 1. Interpret the bytes as little-endian signed 16-bit samples.
//! 2. RMS = `sqrt(mean(sample²))` over every sample.
//! 3. Clamp RMS to `min_rms` so silence never reaches `log10(0)`.
//! 4. dB = `20 · log10(RMS / reference_level)`.
//! 5. Clamp to `[floor_db, ceiling_db]` (default `[-80, 0]`).
//!
//! Empty and odd-length buffers degrade to `floor_db` instead of erroring.
//!
//! # Example
//!
//! ```rust
//! use env_trigger::audio::{pcm, volume_db};
//!
//! let silence = pcm::encode(&[0; 1_600]);
//! assert_eq!(volume_db(&silence, 16_000), -80.0);
//!
//! let loud: Vec<i16> = (0..1_600).map(|i| if i % 2 == 0 { 10_000 } else { -10_000 }).collect();
//! let db = volume_db(&pcm::encode(&loud), 16_000);
//! assert!((db - (-10.31)).abs() < 0.1);
//! ```

use crate::audio::pcm;
use crate::config::AudioConfig;

// ---------------------------------------------------------------------------
// VolumeExtractor
// ---------------------------------------------------------------------------

/// Stateless PCM → dB converter.  `Copy`, so every ingestion loop can hold
/// its own instance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeExtractor {
    /// Amplitude that maps to 0 dB (default: `32768.0`).
    pub reference_level: f64,
    /// RMS floor applied before the logarithm (default: `1.0`).
    pub min_rms: f64,
    /// Lowest reported value (default: `-80.0`).
    pub floor_db: f64,
    /// Highest reported value (default: `0.0`).
    pub ceiling_db: f64,
}

impl Default for VolumeExtractor {
    fn default() -> Self {
        Self {
            reference_level: pcm::FULL_SCALE,
            min_rms: 1.0,
            floor_db: -80.0,
            ceiling_db: 0.0,
        }
    }
}

impl VolumeExtractor {
    pub fn from_config(config: &AudioConfig) -> Self {
        Self {
            reference_level: config.reference_level,
            min_rms: config.min_rms,
            floor_db: config.floor_db,
            ceiling_db: config.ceiling_db,
        }
    }

    /// Ambient volume of `pcm` in dB.
    ///
    /// `_sample_rate` is part of the contract for callers that track clip
    /// metadata; loudness does not depend on it.
    pub fn volume_db(&self, pcm: &[u8], _sample_rate: u32) -> f64 {
        match pcm::rms(pcm) {
            Some(rms) => self.rms_to_db(rms),
            None => self.floor_db,
        }
    }

    /// Convert a raw RMS amplitude to a clamped dB value.
    pub fn rms_to_db(&self, rms: f64) -> f64 {
        let rms = rms.max(self.min_rms);
        let db = 20.0 * (rms / self.reference_level).log10();
        if !db.is_finite() {
            return self.floor_db;
        }
        db.max(self.floor_db).min(self.ceiling_db)
    }
}

/// [`VolumeExtractor::volume_db`] with default settings.
pub fn volume_db(pcm: &[u8], sample_rate: u32) -> f64 {
    VolumeExtractor::default().volume_db(pcm, sample_rate)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn square_wave(amplitude: i16, samples: usize) -> Vec<u8> {
        let wave: Vec<i16> = (0..samples)
            .map(|i| if i % 2 == 0 { amplitude } else { -amplitude })
            .collect();
        pcm::encode(&wave)
    }

    #[test]
    fn silence_hits_floor() {
        let silence = vec![0u8; 3_200];
        assert_eq!(volume_db(&silence, 16_000), -80.0);
    }

    #[test]
    fn full_scale_square_wave_approaches_zero() {
        let db = volume_db(&square_wave(32_767, 1_600), 16_000);
        assert!(db <= 0.0, "got {db}");
        assert!(db > -0.01, "got {db}");
    }

    #[test]
    fn ten_thousand_amplitude_is_about_minus_ten_db() {
        let db = volume_db(&square_wave(10_000, 1_600), 16_000);
        let expected = 20.0 * (10_000.0_f64 / 32_768.0).log10();
        assert!((db - expected).abs() < 0.1, "got {db}, expected {expected}");
        assert!((db - (-10.3)).abs() < 0.1);
    }

    #[test]
    fn empty_buffer_degrades_to_floor() {
        assert_eq!(volume_db(&[], 16_000), -80.0);
    }

    #[test]
    fn odd_length_buffer_degrades_to_floor() {
        let mut pcm = square_wave(10_000, 100);
        pcm.push(0x7F);
        assert_eq!(volume_db(&pcm, 16_000), -80.0);
    }

    #[test]
    fn custom_floor_is_respected() {
        let extractor = VolumeExtractor {
            floor_db: -60.0,
            ..VolumeExtractor::default()
        };
        assert_eq!(extractor.volume_db(&[0u8; 64], 8_000), -60.0);
    }

    #[test]
    fn ceiling_clamps_louder_than_reference() {
        // Reference below the signal level would give a positive dB.
        let extractor = VolumeExtractor {
            reference_level: 1_000.0,
            ..VolumeExtractor::default()
        };
        assert_eq!(extractor.volume_db(&square_wave(20_000, 64), 8_000), 0.0);
    }

    #[test]
    fn tiny_signal_is_lifted_to_min_rms() {
        // RMS 0.5 < min_rms 1.0 → same as silence at default settings.
        let extractor = VolumeExtractor {
            floor_db: -120.0,
            ..VolumeExtractor::default()
        };
        let expected = 20.0 * (1.0_f64 / 32_768.0).log10();
        let db = extractor.rms_to_db(0.5);
        assert!((db - expected).abs() < 1e-9);
    }
}
