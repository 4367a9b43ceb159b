//! Spectral shaping stage
//!
//! A platform-specific broadband gain multiplier. The shaping is
//! intentionally flat across frequency; the tonal work is done by the
//! platform EQ at the head of the chain.

use super::MasteringStage;
use crate::engine::AudioBuffer;
use crate::error::Result;

/// Minimum shaping gain in dB
const MIN_GAIN_DB: f32 = -12.0;

/// Maximum shaping gain in dB
const MAX_GAIN_DB: f32 = 12.0;

/// Stage 4c: broadband gain
#[derive(Debug, Clone)]
pub struct SpectralShaper {
    gain_db: f32,
}

impl SpectralShaper {
    pub fn new(gain_db: f32) -> Self {
        Self {
            gain_db: gain_db.clamp(MIN_GAIN_DB, MAX_GAIN_DB),
        }
    }

    pub fn gain_db(&self) -> f32 {
        self.gain_db
    }
}

impl MasteringStage for SpectralShaper {
    fn name(&self) -> &'static str {
        "spectral_shape"
    }

    fn process(&self, buffer: &mut AudioBuffer) -> Result<()> {
        if self.gain_db != 0.0 {
            buffer.apply_gain(self.gain_db);
        }
        Ok(())
    }
}
