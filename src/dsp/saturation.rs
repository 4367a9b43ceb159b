//! Harmonic excitement
//!
//! Parallel soft saturation: `output = tanh(x * k) * a + x * (1 - a)` where
//! `k` is the drive and `a` the wet mix.

use super::MasteringStage;
use crate::engine::AudioBuffer;
use crate::error::Result;

/// Minimum drive (1.0 = tanh barely bends)
const MIN_DRIVE: f32 = 0.1;

/// Maximum drive
const MAX_DRIVE: f32 = 10.0;

/// Waveshape one sample
#[inline]
pub fn excite(x: f32, drive: f32, mix: f32) -> f32 {
    (x * drive).tanh() * mix + x * (1.0 - mix)
}

/// Stage 4b: tanh exciter blended with the dry signal
#[derive(Debug, Clone)]
pub struct HarmonicExciter {
    drive: f32,
    mix: f32,
}

impl HarmonicExciter {
    pub fn new(drive: f32, mix: f32) -> Self {
        Self {
            drive: drive.clamp(MIN_DRIVE, MAX_DRIVE),
            mix: mix.clamp(0.0, 1.0),
        }
    }
}

impl MasteringStage for HarmonicExciter {
    fn name(&self) -> &'static str {
        "harmonic_excite"
    }

    fn process(&self, buffer: &mut AudioBuffer) -> Result<()> {
        let (drive, mix) = (self.drive, self.mix);
        buffer.map_samples(|x| excite(x, drive, mix));
        Ok(())
    }
}
