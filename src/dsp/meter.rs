//! Level estimators shared by the limiter stage and the quality analyzer
//!
//! Loudness here is an approximation: full-buffer RMS in dB with a fixed
//! -0.691 dB offset standing in for LUFS. It is not ITU-R BS.1770 (no
//! K-weighting, no gating). Both the limiter and the analyzer use these
//! functions so a mastered buffer always measures at the level it was
//! normalized to.

use crate::engine::{calculate_peak, calculate_rms, AudioBuffer};

/// Offset applied to RMS dB to approximate LUFS
pub const LUFS_OFFSET_DB: f32 = -0.691;

/// Approximate integrated loudness in LUFS
///
/// Returns -f32::INFINITY for empty or silent buffers.
pub fn estimate_loudness(buffer: &AudioBuffer) -> f32 {
    calculate_rms(buffer) + LUFS_OFFSET_DB
}

/// Sample peak in dBFS
pub fn estimate_peak(buffer: &AudioBuffer) -> f32 {
    calculate_peak(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::generate_test_tone;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_loudness_of_sine() {
        // 0.5 amplitude sine: RMS -9.03 dB, loudness -9.72
        let tone = generate_test_tone(1000.0, 0.5, 1.0, 48000);
        assert_abs_diff_eq!(estimate_loudness(&tone), -9.72, epsilon = 0.05);
        assert_abs_diff_eq!(estimate_peak(&tone), -6.02, epsilon = 0.05);
    }

    #[test]
    fn test_silence_is_negative_infinity() {
        let silent = generate_test_tone(1000.0, 0.0, 0.5, 48000);
        assert!(estimate_loudness(&silent).is_infinite());
    }
}
