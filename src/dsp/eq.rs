//! Platform EQ stage
//!
//! Static multi-band equalizer built from cascaded biquad filters. The band
//! table comes from the export profile, so each platform's tonal curve is
//! data rather than code.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use super::MasteringStage;
use crate::engine::AudioBuffer;
use crate::error::{ExportError, Result};

/// Filter type for EQ bands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterType {
    /// Bell curve boost/cut
    #[default]
    Peak,
    /// Boost/cut below frequency
    LowShelf,
    /// Boost/cut above frequency
    HighShelf,
    /// Remove above frequency (low-pass filter)
    LowPass,
    /// Remove below frequency (high-pass filter)
    HighPass,
}

/// Biquad filter coefficients, normalized by a0
#[derive(Debug, Clone, Copy, Default)]
struct BiquadCoeffs {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
}

impl BiquadCoeffs {
    /// Calculate biquad coefficients using Audio EQ Cookbook formulas
    fn calculate(
        filter_type: FilterType,
        sample_rate: f64,
        frequency: f64,
        gain_db: f64,
        q: f64,
    ) -> Self {
        // Keep the corner below Nyquist
        let freq = frequency.clamp(20.0, sample_rate / 2.0 - 1.0);
        let q = q.clamp(0.1, 10.0);

        let w0 = 2.0 * PI * freq / sample_rate;
        let cos_w0 = w0.cos();
        let sin_w0 = w0.sin();
        let alpha = sin_w0 / (2.0 * q);
        let a = (10.0_f64).powf(gain_db / 40.0);

        let (b0, b1, b2, a0, a1, a2) = match filter_type {
            FilterType::Peak => (
                1.0 + alpha * a,
                -2.0 * cos_w0,
                1.0 - alpha * a,
                1.0 + alpha / a,
                -2.0 * cos_w0,
                1.0 - alpha / a,
            ),
            FilterType::LowShelf => {
                let two_sqrt_a_alpha = 2.0 * a.sqrt() * alpha;
                (
                    a * ((a + 1.0) - (a - 1.0) * cos_w0 + two_sqrt_a_alpha),
                    2.0 * a * ((a - 1.0) - (a + 1.0) * cos_w0),
                    a * ((a + 1.0) - (a - 1.0) * cos_w0 - two_sqrt_a_alpha),
                    (a + 1.0) + (a - 1.0) * cos_w0 + two_sqrt_a_alpha,
                    -2.0 * ((a - 1.0) + (a + 1.0) * cos_w0),
                    (a + 1.0) + (a - 1.0) * cos_w0 - two_sqrt_a_alpha,
                )
            }
            FilterType::HighShelf => {
                let two_sqrt_a_alpha = 2.0 * a.sqrt() * alpha;
                (
                    a * ((a + 1.0) + (a - 1.0) * cos_w0 + two_sqrt_a_alpha),
                    -2.0 * a * ((a - 1.0) + (a + 1.0) * cos_w0),
                    a * ((a + 1.0) + (a - 1.0) * cos_w0 - two_sqrt_a_alpha),
                    (a + 1.0) - (a - 1.0) * cos_w0 + two_sqrt_a_alpha,
                    2.0 * ((a - 1.0) - (a + 1.0) * cos_w0),
                    (a + 1.0) - (a - 1.0) * cos_w0 - two_sqrt_a_alpha,
                )
            }
            FilterType::LowPass => (
                (1.0 - cos_w0) / 2.0,
                1.0 - cos_w0,
                (1.0 - cos_w0) / 2.0,
                1.0 + alpha,
                -2.0 * cos_w0,
                1.0 - alpha,
            ),
            FilterType::HighPass => (
                (1.0 + cos_w0) / 2.0,
                -(1.0 + cos_w0),
                (1.0 + cos_w0) / 2.0,
                1.0 + alpha,
                -2.0 * cos_w0,
                1.0 - alpha,
            ),
        };

        BiquadCoeffs {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }
}

/// Biquad filter state for one channel
#[derive(Debug, Clone, Copy, Default)]
struct BiquadState {
    x1: f64,
    x2: f64,
    y1: f64,
    y2: f64,
}

impl BiquadState {
    /// Direct Form I
    fn process(&mut self, input: f64, coeffs: &BiquadCoeffs) -> f64 {
        let output = coeffs.b0 * input + coeffs.b1 * self.x1 + coeffs.b2 * self.x2
            - coeffs.a1 * self.y1
            - coeffs.a2 * self.y2;

        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = output;

        output
    }
}

/// Single EQ band of a platform curve
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EqBand {
    /// Filter type
    pub filter_type: FilterType,
    /// Center/corner frequency in Hz (20-20000)
    pub frequency: f32,
    /// Gain in dB (-24 to +24), ignored by pass filters
    #[serde(default)]
    pub gain_db: f32,
    /// Q factor / bandwidth (0.1 to 10.0)
    #[serde(default = "default_q")]
    pub q: f32,
}

fn default_q() -> f32 {
    0.707
}

impl EqBand {
    /// Create a new EQ band with the specified parameters
    pub fn new(filter_type: FilterType, frequency: f32, gain_db: f32, q: f32) -> Self {
        Self {
            filter_type,
            frequency,
            gain_db,
            q,
        }
    }

    /// Validate band parameters
    pub fn validate(&self) -> Result<()> {
        if !(20.0..=20000.0).contains(&self.frequency) {
            return Err(ExportError::InvalidRequest {
                reason: format!("EQ frequency {} Hz outside 20-20000 Hz", self.frequency),
            });
        }
        if !(-24.0..=24.0).contains(&self.gain_db) {
            return Err(ExportError::InvalidRequest {
                reason: format!("EQ gain {} dB outside -24 to +24 dB", self.gain_db),
            });
        }
        if !(0.1..=10.0).contains(&self.q) {
            return Err(ExportError::InvalidRequest {
                reason: format!("EQ Q {} outside 0.1 to 10.0", self.q),
            });
        }
        Ok(())
    }
}

/// Stage 1: static platform tone curve
#[derive(Debug, Clone)]
pub struct PlatformEq {
    bands: Vec<EqBand>,
}

impl PlatformEq {
    pub fn new(bands: Vec<EqBand>) -> Self {
        Self { bands }
    }

    pub fn bands(&self) -> &[EqBand] {
        &self.bands
    }
}

impl MasteringStage for PlatformEq {
    fn name(&self) -> &'static str {
        "platform_eq"
    }

    fn process(&self, buffer: &mut AudioBuffer) -> Result<()> {
        if self.bands.is_empty() {
            return Ok(());
        }

        let sample_rate = buffer.sample_rate as f64;
        let coeffs: Vec<BiquadCoeffs> = self
            .bands
            .iter()
            .map(|band| {
                BiquadCoeffs::calculate(
                    band.filter_type,
                    sample_rate,
                    band.frequency as f64,
                    band.gain_db as f64,
                    band.q as f64,
                )
            })
            .collect();

        for channel in &mut buffer.samples {
            // Fresh filter memory per channel and per call keeps the stage pure
            let mut states = vec![BiquadState::default(); coeffs.len()];
            for sample in channel.iter_mut() {
                let mut value = *sample as f64;
                for (state, c) in states.iter_mut().zip(&coeffs) {
                    value = state.process(value, c);
                }
                *sample = value as f32;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{calculate_rms, generate_test_tone};

    #[test]
    fn test_empty_curve_is_passthrough() {
        let tone = generate_test_tone(1000.0, 0.5, 0.2, 48000);
        let mut processed = tone.clone();
        PlatformEq::new(Vec::new()).process(&mut processed).unwrap();
        assert_eq!(processed, tone);
    }

    #[test]
    fn test_peak_boost_raises_level_at_center() {
        let tone = generate_test_tone(1000.0, 0.25, 0.5, 48000);
        let mut processed = tone.clone();
        PlatformEq::new(vec![EqBand::new(FilterType::Peak, 1000.0, 6.0, 1.0)])
            .process(&mut processed)
            .unwrap();

        let gain = calculate_rms(&processed) - calculate_rms(&tone);
        assert!((gain - 6.0).abs() < 0.5, "expected ~6 dB, got {}", gain);
    }

    #[test]
    fn test_high_pass_removes_low_tone() {
        let tone = generate_test_tone(40.0, 0.5, 1.0, 48000);
        let mut processed = tone.clone();
        PlatformEq::new(vec![EqBand::new(FilterType::HighPass, 400.0, 0.0, 0.707)])
            .process(&mut processed)
            .unwrap();

        assert!(calculate_rms(&processed) < calculate_rms(&tone) - 20.0);
    }

    #[test]
    fn test_band_validation() {
        assert!(EqBand::new(FilterType::Peak, 10.0, 0.0, 1.0).validate().is_err());
        assert!(EqBand::new(FilterType::Peak, 1000.0, 30.0, 1.0).validate().is_err());
        assert!(EqBand::new(FilterType::LowShelf, 100.0, 2.0, 0.7).validate().is_ok());
    }
}
