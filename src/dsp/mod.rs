//! Mastering DSP
//!
//! Each mastering stage is a small transform behind the `MasteringStage`
//! trait. Stages keep no state between calls: filter memory and envelopes
//! live on the stack of `process`, so running a stage twice on the same
//! input gives bit-identical output.

mod chain;
mod compressor;
mod eq;
mod gain;
mod limiter;
pub mod meter;
mod saturation;
mod stereo;

pub use chain::{process, process_until, MasteringChain, CHAIN_VERSION};
pub use compressor::{CompressorSettings, DynamicsCompressor};
pub use eq::{EqBand, FilterType, PlatformEq};
pub use gain::SpectralShaper;
pub use limiter::{soft_clip, soft_limit, LimiterStyle, LoudnessLimiter, DEFAULT_KNEE_RATIO};
pub use saturation::{excite, HarmonicExciter};
pub use stereo::StereoWidener;

use crate::engine::AudioBuffer;
use crate::error::Result;

/// One step of the mastering chain
pub trait MasteringStage: Send + Sync {
    /// Stable identifier used in logs and error reports
    fn name(&self) -> &'static str;

    /// Transform the buffer in place
    fn process(&self, buffer: &mut AudioBuffer) -> Result<()>;
}
