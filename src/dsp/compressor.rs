//! Dynamics compression stage
//!
//! Feed-forward compressor with a linked-stereo envelope follower. The
//! envelope tracks the input level in dB with separate attack and release
//! smoothing; above threshold the gain reduction is
//! `(envelope - threshold) * (1 - 1/ratio)` dB.

use serde::{Deserialize, Serialize};

use super::MasteringStage;
use crate::engine::{db_to_linear, AudioBuffer};
use crate::engine::buffer::SILENCE_FLOOR_DB;
use crate::error::Result;
use crate::profiles::MasteringStyle;

/// Compressor parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompressorSettings {
    /// Threshold level in dB (-60 to 0 dB)
    pub threshold_db: f32,
    /// Compression ratio (1.0 to 20.0)
    pub ratio: f32,
    /// Attack time in milliseconds
    pub attack_ms: f32,
    /// Release time in milliseconds
    pub release_ms: f32,
}

impl CompressorSettings {
    /// Parameter set for a mastering style
    pub fn for_style(style: MasteringStyle) -> Self {
        match style {
            MasteringStyle::Commercial => Self {
                threshold_db: -14.0,
                ratio: 4.0,
                attack_ms: 5.0,
                release_ms: 80.0,
            },
            MasteringStyle::Artistic => Self {
                threshold_db: -20.0,
                ratio: 1.8,
                attack_ms: 25.0,
                release_ms: 250.0,
            },
            MasteringStyle::Podcast => Self {
                threshold_db: -22.0,
                ratio: 3.0,
                attack_ms: 8.0,
                release_ms: 150.0,
            },
            MasteringStyle::Streaming => Self {
                threshold_db: -18.0,
                ratio: 2.5,
                attack_ms: 10.0,
                release_ms: 120.0,
            },
        }
    }

    /// Gain reduction in dB (positive number) for an envelope level
    #[inline]
    pub fn gain_reduction_db(&self, envelope_db: f32) -> f32 {
        if envelope_db > self.threshold_db {
            (envelope_db - self.threshold_db) * (1.0 - 1.0 / self.ratio.max(1.0))
        } else {
            0.0
        }
    }
}

/// One-pole smoothing coefficient for a time constant
#[inline]
fn time_to_coeff(time_ms: f32, sample_rate: f32) -> f32 {
    let samples = time_ms * sample_rate / 1000.0;
    if samples > 0.0 {
        (-1.0 / samples).exp()
    } else {
        0.0
    }
}

/// Stage 2: style-driven compressor
#[derive(Debug, Clone)]
pub struct DynamicsCompressor {
    settings: CompressorSettings,
}

impl DynamicsCompressor {
    pub fn new(settings: CompressorSettings) -> Self {
        Self { settings }
    }

    pub fn for_style(style: MasteringStyle) -> Self {
        Self::new(CompressorSettings::for_style(style))
    }

    pub fn settings(&self) -> &CompressorSettings {
        &self.settings
    }
}

impl MasteringStage for DynamicsCompressor {
    fn name(&self) -> &'static str {
        "compressor"
    }

    fn process(&self, buffer: &mut AudioBuffer) -> Result<()> {
        let sample_rate = buffer.sample_rate as f32;
        let attack = time_to_coeff(self.settings.attack_ms, sample_rate);
        let release = time_to_coeff(self.settings.release_ms, sample_rate);

        let mut envelope_db = SILENCE_FLOOR_DB;

        for frame in 0..buffer.num_samples() {
            // Linked detection: loudest channel drives both
            let level = buffer
                .samples
                .iter()
                .map(|ch| ch[frame].abs())
                .fold(0.0_f32, f32::max);
            let level_db = if level > 0.0 {
                (20.0 * level.log10()).max(SILENCE_FLOOR_DB)
            } else {
                SILENCE_FLOOR_DB
            };

            let coeff = if level_db > envelope_db { attack } else { release };
            envelope_db = coeff * envelope_db + (1.0 - coeff) * level_db;

            let reduction = self.settings.gain_reduction_db(envelope_db);
            if reduction > 0.0 {
                let gain = db_to_linear(-reduction);
                for channel in &mut buffer.samples {
                    channel[frame] *= gain;
                }
            }
        }

        Ok(())
    }
}
