//! 16-bit little-endian PCM helpers.

/// Bytes per 16-bit sample.
pub const BYTES_PER_SAMPLE: usize = 2;

/// Magnitude of the most negative 16-bit sample; the 0 dBFS reference.
pub const FULL_SCALE: f64 = 32768.0;

/// `true` when `pcm` holds at least one sample and no trailing half-sample.
pub fn is_well_formed(pcm: &[u8]) -> bool {
    !pcm.is_empty() && pcm.len() % BYTES_PER_SAMPLE == 0
}

/// Iterate the signed samples in `pcm`.  A trailing odd byte is ignored.
pub fn samples(pcm: &[u8]) -> impl Iterator<Item = i16> + '_ {
    pcm.chunks_exact(BYTES_PER_SAMPLE)
        .map(|b| i16::from_le_bytes([b[0], b[1]]))
}

/// Root-mean-square amplitude of `pcm`, in raw sample units.
///
/// Returns `None` for empty or odd-length buffers.
pub fn rms(pcm: &[u8]) -> Option<f64> {
    if !is_well_formed(pcm) {
        return None;
    }
    let count = pcm.len() / BYTES_PER_SAMPLE;
    let sum_sq: f64 = samples(pcm).map(|s| f64::from(s) * f64::from(s)).sum();
    Some((sum_sq / count as f64).sqrt())
}

/// Largest absolute sample value.  `0` for an empty buffer.
pub fn peak_amplitude(pcm: &[u8]) -> u16 {
    samples(pcm).map(i16::unsigned_abs).max().unwrap_or(0)
}

/// Encode samples as little-endian bytes.  Handy for building test clips.
pub fn encode(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_little_endian() {
        let pcm = [0x01, 0x00, 0xFF, 0xFF, 0x00, 0x80];
        let decoded: Vec<i16> = samples(&pcm).collect();
        assert_eq!(decoded, vec![1, -1, i16::MIN]);
    }

    #[test]
    fn rms_of_constant_magnitude() {
        let pcm = encode(&[300, -300, 300, -300]);
        let r = rms(&pcm).unwrap();
        assert!((r - 300.0).abs() < 1e-9);
    }

    #[test]
    fn rms_rejects_empty_and_odd() {
        assert!(rms(&[]).is_none());
        assert!(rms(&[0x00, 0x01, 0x02]).is_none());
    }

    #[test]
    fn peak_handles_i16_min() {
        let pcm = encode(&[10, i16::MIN, 20]);
        assert_eq!(peak_amplitude(&pcm), 32768);
    }
}
