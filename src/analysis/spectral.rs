//! Coarse spectral balance
//!
//! Splits the mono sum into five bands with cascaded one-pole crossovers and
//! reports each band's share of the total band energy. This is a band-energy
//! approximation, not an FFT.

use serde::{Deserialize, Serialize};

use crate::engine::AudioBuffer;

/// Crossover frequencies between bass/mid/treble/presence/brilliance
pub const CROSSOVERS_HZ: [f32; 4] = [250.0, 2000.0, 4000.0, 6000.0];

/// Energy ratio per band; the five values sum to 1 (all zero for silence)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SpectralBalance {
    /// Below 250 Hz
    pub bass: f32,
    /// 250 Hz to 2 kHz
    pub mid: f32,
    /// 2 kHz to 4 kHz
    pub treble: f32,
    /// 4 kHz to 6 kHz
    pub presence: f32,
    /// Above 6 kHz
    pub brilliance: f32,
}

impl SpectralBalance {
    pub fn total(&self) -> f32 {
        self.bass + self.mid + self.treble + self.presence + self.brilliance
    }
}

/// One-pole low-pass over a whole signal
fn one_pole_lowpass(input: &[f32], cutoff_hz: f32, sample_rate: u32) -> Vec<f32> {
    let coeff = (-2.0 * std::f32::consts::PI * cutoff_hz / sample_rate as f32).exp();
    let mut state = 0.0_f32;
    input
        .iter()
        .map(|&x| {
            state = (1.0 - coeff) * x + coeff * state;
            state
        })
        .collect()
}

fn energy(signal: &[f32]) -> f64 {
    signal.iter().map(|&s| (s as f64) * (s as f64)).sum()
}

/// Measure the five-band energy distribution of a buffer
pub fn spectral_balance(buffer: &AudioBuffer) -> SpectralBalance {
    if buffer.is_empty() || buffer.sample_rate == 0 {
        return SpectralBalance::default();
    }

    let channels = buffer.num_channels() as f32;
    let mono: Vec<f32> = (0..buffer.num_samples())
        .map(|i| buffer.samples.iter().map(|ch| ch[i]).sum::<f32>() / channels)
        .collect();

    // Each crossover peels its low band off the remainder
    let mut energies = [0.0_f64; 5];
    let mut remainder = mono;
    for (band, &cutoff) in CROSSOVERS_HZ.iter().enumerate() {
        let low = one_pole_lowpass(&remainder, cutoff, buffer.sample_rate);
        energies[band] = energy(&low);
        for (r, l) in remainder.iter_mut().zip(low.iter()) {
            *r -= l;
        }
    }
    energies[4] = energy(&remainder);

    let total: f64 = energies.iter().sum();
    if total <= f64::EPSILON {
        return SpectralBalance::default();
    }

    let ratio = |e: f64| (e / total) as f32;
    SpectralBalance {
        bass: ratio(energies[0]),
        mid: ratio(energies[1]),
        treble: ratio(energies[2]),
        presence: ratio(energies[3]),
        brilliance: ratio(energies[4]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::generate_test_tone;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_ratios_sum_to_one() {
        let tone = generate_test_tone(1000.0, 0.5, 0.5, 48000);
        assert_abs_diff_eq!(spectral_balance(&tone).total(), 1.0, epsilon = 1e-4);
    }

    #[test]
    fn test_low_tone_lands_in_bass() {
        let tone = generate_test_tone(60.0, 0.5, 1.0, 48000);
        let balance = spectral_balance(&tone);
        assert!(balance.bass > 0.5, "bass share {}", balance.bass);
    }

    #[test]
    fn test_high_tone_lands_in_brilliance() {
        let tone = generate_test_tone(12000.0, 0.5, 1.0, 48000);
        let balance = spectral_balance(&tone);
        assert!(balance.brilliance > balance.bass);
        assert!(balance.brilliance > balance.mid);
    }

    #[test]
    fn test_silence_is_all_zero() {
        let silent = generate_test_tone(1000.0, 0.0, 0.2, 48000);
        assert_eq!(spectral_balance(&silent), SpectralBalance::default());
    }
}
