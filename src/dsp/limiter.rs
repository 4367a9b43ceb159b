//! Loudness normalization and soft limiting stage
//!
//! Brings the buffer to the profile's loudness target, then saturates any
//! sample approaching the peak ceiling with a tanh curve instead of
//! truncating it. The curve is the identity below the knee and approaches
//! the ceiling asymptotically above it, so the ceiling always holds.
//!
//! Clipping transients removes energy, so the limited result is measured
//! again and the gain corrected for a few passes until it lands on target.

use serde::{Deserialize, Serialize};

use super::meter::estimate_loudness;
use super::MasteringStage;
use crate::engine::{db_to_linear, AudioBuffer};
use crate::error::Result;

/// Knee used by the mastering chain, as a fraction of the ceiling
pub const DEFAULT_KNEE_RATIO: f32 = 0.9;

/// Largest boost the normalizer will apply to a very quiet mix
pub const MAX_NORMALIZATION_GAIN_DB: f32 = 40.0;

/// Extra gain/limit passes after the first one
pub const MAX_CORRECTION_PASSES: usize = 4;

/// Distance from the target at which correction stops, in dB
pub const LOUDNESS_TOLERANCE_DB: f32 = 0.1;

/// How early the soft clipper starts bending the waveform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimiterStyle {
    /// Knee close to the ceiling, touches only the loudest peaks
    Transparent,
    /// Mastering-chain default
    #[default]
    Balanced,
    /// Early knee, denser and more saturated
    Punchy,
}

impl LimiterStyle {
    /// Knee position as a fraction of the linear ceiling
    pub fn knee_ratio(&self) -> f32 {
        match self {
            LimiterStyle::Transparent => 0.95,
            LimiterStyle::Balanced => DEFAULT_KNEE_RATIO,
            LimiterStyle::Punchy => 0.8,
        }
    }
}

/// Saturate one sample against a linear ceiling
///
/// Identity for `|x| <= ceiling * knee_ratio`; above the knee the excess is
/// squashed with tanh so `|y| < ceiling`.
#[inline]
pub fn soft_clip(x: f32, ceiling: f32, knee_ratio: f32) -> f32 {
    let knee = ceiling * knee_ratio.clamp(0.0, 0.999);
    let magnitude = x.abs();
    if magnitude <= knee {
        return x;
    }
    let span = ceiling - knee;
    let shaped = knee + span * ((magnitude - knee) / span).tanh();
    shaped.min(ceiling).copysign(x)
}

/// Apply the soft clipper to a whole buffer
pub fn soft_limit(buffer: &mut AudioBuffer, ceiling_db: f32, knee_ratio: f32) {
    let ceiling = db_to_linear(ceiling_db);
    buffer.map_samples(|x| soft_clip(x, ceiling, knee_ratio));
}

/// Stage 3: loudness normalization followed by soft limiting
#[derive(Debug, Clone)]
pub struct LoudnessLimiter {
    target_lufs: f32,
    ceiling_db: f32,
    knee_ratio: f32,
}

impl LoudnessLimiter {
    pub fn new(target_lufs: f32, ceiling_db: f32) -> Self {
        Self {
            target_lufs,
            ceiling_db,
            knee_ratio: DEFAULT_KNEE_RATIO,
        }
    }

    /// Gain in dB that moves the buffer to the loudness target
    pub fn normalization_gain_db(&self, buffer: &AudioBuffer) -> f32 {
        let loudness = estimate_loudness(buffer);
        if !loudness.is_finite() {
            return 0.0;
        }
        (self.target_lufs - loudness).min(MAX_NORMALIZATION_GAIN_DB)
    }
}

impl MasteringStage for LoudnessLimiter {
    fn name(&self) -> &'static str {
        "loudness_limiter"
    }

    fn process(&self, buffer: &mut AudioBuffer) -> Result<()> {
        let source = buffer.clone();
        let mut gain_db = self.normalization_gain_db(&source);
        // (gain, measured) of the previous pass, for the secant step
        let mut previous: Option<(f32, f32)> = None;

        for pass in 0..=MAX_CORRECTION_PASSES {
            let mut candidate = source.clone();
            candidate.apply_gain(gain_db);
            soft_limit(&mut candidate, self.ceiling_db, self.knee_ratio);

            let measured = estimate_loudness(&candidate);
            let error = self.target_lufs - measured;
            tracing::debug!(
                target_lufs = self.target_lufs,
                gain_db,
                measured,
                pass,
                "Loudness normalization"
            );

            *buffer = candidate;
            if !measured.is_finite()
                || error.abs() <= LOUDNESS_TOLERANCE_DB
                || gain_db >= MAX_NORMALIZATION_GAIN_DB
            {
                break;
            }

            // Limiting flattens the gain/loudness slope; step along the
            // measured slope, kept between 1x and 4x the raw deficit.
            let slope = match previous {
                Some((last_gain, last_measured)) if gain_db != last_gain => {
                    ((measured - last_measured) / (gain_db - last_gain)).clamp(0.25, 1.0)
                }
                _ => 1.0,
            };
            previous = Some((gain_db, measured));
            gain_db = (gain_db + error / slope).min(MAX_NORMALIZATION_GAIN_DB);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::meter::{estimate_loudness, estimate_peak};
    use crate::engine::generate_test_tone;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_soft_clip_identity_below_knee() {
        assert_eq!(soft_clip(0.5, 0.9, 0.9), 0.5);
        assert_eq!(soft_clip(-0.5, 0.9, 0.9), -0.5);
    }

    #[test]
    fn test_soft_clip_never_exceeds_ceiling() {
        let ceiling = db_to_linear(-1.0);
        for i in 0..1000 {
            let x = i as f32 * 0.01;
            let y = soft_clip(x, ceiling, DEFAULT_KNEE_RATIO);
            assert!(y <= ceiling, "x={} produced {} above {}", x, y, ceiling);
            assert!(soft_clip(-x, ceiling, DEFAULT_KNEE_RATIO) >= -ceiling);
        }
    }

    #[test]
    fn test_soft_clip_is_monotonic() {
        let mut previous = 0.0;
        for i in 0..500 {
            let y = soft_clip(i as f32 * 0.01, 0.8, 0.9);
            assert!(y >= previous);
            previous = y;
        }
    }

    #[test]
    fn test_normalizes_to_target() {
        let tone = generate_test_tone(440.0, 0.05, 1.0, 48000);
        let mut processed = tone.clone();
        LoudnessLimiter::new(-14.0, -1.0)
            .process(&mut processed)
            .unwrap();
        assert_abs_diff_eq!(estimate_loudness(&processed), -14.0, epsilon = 0.05);
    }

    #[test]
    fn test_hot_signal_respects_ceiling() {
        let tone = generate_test_tone(440.0, 0.5, 1.0, 48000);
        let mut processed = tone.clone();
        LoudnessLimiter::new(-3.0, -1.0)
            .process(&mut processed)
            .unwrap();
        assert!(estimate_peak(&processed) <= -1.0 + 1e-4);
    }

    fn decaying_bursts(sample_rate: u32) -> AudioBuffer {
        let bed = db_to_linear(-34.0);
        let samples = (0..sample_rate as usize * 2)
            .map(|i| {
                let t = i as f32 / sample_rate as f32;
                let since_hit = t % 0.5;
                let burst = 0.9
                    * (-since_hit / 0.06).exp()
                    * (2.0 * std::f32::consts::PI * 80.0 * since_hit).sin();
                burst + bed * (2.0 * std::f32::consts::PI * 500.0 * t).sin()
            })
            .collect::<Vec<f32>>();
        AudioBuffer {
            samples: vec![samples.clone(), samples],
            sample_rate,
        }
    }

    #[test]
    fn test_transient_material_reaches_target() {
        let mut processed = decaying_bursts(48000);
        LoudnessLimiter::new(-14.0, -1.0)
            .process(&mut processed)
            .unwrap();
        assert_abs_diff_eq!(
            estimate_loudness(&processed),
            -14.0,
            epsilon = LOUDNESS_TOLERANCE_DB + 0.05
        );
        assert!(estimate_peak(&processed) <= -1.0 + 1e-4);
    }

    #[test]
    fn test_silence_passes_through() {
        let silent = generate_test_tone(440.0, 0.0, 0.5, 48000);
        let mut processed = silent.clone();
        LoudnessLimiter::new(-14.0, -1.0)
            .process(&mut processed)
            .unwrap();
        assert_eq!(processed, silent);
    }

    #[test]
    fn test_style_knees_are_ordered() {
        assert!(LimiterStyle::Punchy.knee_ratio() < LimiterStyle::Balanced.knee_ratio());
        assert!(LimiterStyle::Balanced.knee_ratio() < LimiterStyle::Transparent.knee_ratio());
    }
}
