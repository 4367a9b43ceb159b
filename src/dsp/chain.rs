//! Mastering chain
//!
//! Stage order is fixed and versioned:
//! 1. Platform EQ
//! 2. Dynamics compression
//! 3. Loudness normalization + soft limiting
//! 4. Enhancement (stereo widen, harmonic excite, spectral shape), each
//!    gated by the profile's enhancement flags
//!
//! Reordering changes the output, so any change here must bump
//! `CHAIN_VERSION`. With mastering disabled only stage 3 runs.

use std::sync::atomic::{AtomicBool, Ordering};

use super::{
    DynamicsCompressor, HarmonicExciter, LoudnessLimiter, MasteringStage, PlatformEq,
    SpectralShaper, StereoWidener,
};
use crate::engine::AudioBuffer;
use crate::error::{ExportError, Result};
use crate::profiles::ExportProfile;

/// Version of the stage order implemented by `MasteringChain`
pub const CHAIN_VERSION: u32 = 1;

/// Ordered list of stages built for one profile
pub struct MasteringChain {
    stages: Vec<Box<dyn MasteringStage>>,
}

impl MasteringChain {
    /// Build the chain a profile asks for
    pub fn for_profile(profile: &ExportProfile) -> Self {
        let ai = &profile.ai;
        let audio = &profile.audio;
        let mut stages: Vec<Box<dyn MasteringStage>> = Vec::new();

        if ai.mastering_enabled {
            stages.push(Box::new(PlatformEq::new(profile.eq_curve.clone())));
            stages.push(Box::new(DynamicsCompressor::for_style(ai.mastering_style)));
        }

        stages.push(Box::new(LoudnessLimiter::new(
            audio.loudness_target_lufs,
            audio.peak_limit_db,
        )));

        if ai.mastering_enabled {
            let flags = &ai.enhancement_flags;
            let tuning = &ai.tuning;
            if flags.stereo_widen {
                stages.push(Box::new(StereoWidener::new(tuning.width_factor)));
            }
            if flags.harmonic_excite {
                stages.push(Box::new(HarmonicExciter::new(
                    tuning.excite_drive,
                    tuning.excite_mix,
                )));
            }
            if flags.spectral_shape {
                stages.push(Box::new(SpectralShaper::new(tuning.spectral_gain_db)));
            }
        }

        Self { stages }
    }

    /// Names of the stages in execution order
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run every stage over a copy of `input`
    ///
    /// The input is never modified. Fails with `DspProcessingError` on an
    /// empty or non-finite input, or as soon as a stage produces NaN/Inf.
    pub fn process(&self, input: &AudioBuffer) -> Result<AudioBuffer> {
        self.process_until(input, &AtomicBool::new(false))
    }

    /// Like `process`, but returns `Cancelled` before the next stage once
    /// `cancel` is set
    pub fn process_until(&self, input: &AudioBuffer, cancel: &AtomicBool) -> Result<AudioBuffer> {
        if input.is_empty() {
            return Err(ExportError::DspProcessingError {
                stage: "input".to_string(),
                reason: "source audio contains no samples".to_string(),
            });
        }
        if !input.is_finite() {
            return Err(ExportError::DspProcessingError {
                stage: "input".to_string(),
                reason: "source audio contains NaN or infinite samples".to_string(),
            });
        }

        let mut buffer = input.clone();
        for stage in &self.stages {
            if cancel.load(Ordering::SeqCst) {
                tracing::debug!(stage = stage.name(), "Mastering cancelled");
                return Err(ExportError::Cancelled);
            }
            stage.process(&mut buffer)?;
            if !buffer.is_finite() {
                return Err(ExportError::DspProcessingError {
                    stage: stage.name().to_string(),
                    reason: "stage produced NaN or infinite samples".to_string(),
                });
            }
        }

        Ok(buffer)
    }
}

/// Master `buffer` for `profile`
pub fn process(buffer: &AudioBuffer, profile: &ExportProfile) -> Result<AudioBuffer> {
    MasteringChain::for_profile(profile).process(buffer)
}

/// Master `buffer` for `profile`, stopping between stages once `cancel` is set
pub fn process_until(
    buffer: &AudioBuffer,
    profile: &ExportProfile,
    cancel: &AtomicBool,
) -> Result<AudioBuffer> {
    MasteringChain::for_profile(profile).process_until(buffer, cancel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profiles::ProfileRegistry;
    use pretty_assertions::assert_eq;

    fn profile(id: &str) -> ExportProfile {
        let registry = ProfileRegistry::builtin().unwrap();
        registry.get(id).unwrap().as_ref().clone()
    }

    #[test]
    fn test_stage_order() {
        let mut tiktok = profile("tiktok_optimized");
        tiktok.ai.enhancement_flags.stereo_widen = true;
        tiktok.ai.enhancement_flags.harmonic_excite = true;
        tiktok.ai.enhancement_flags.spectral_shape = true;

        let chain = MasteringChain::for_profile(&tiktok);
        assert_eq!(
            chain.stage_names(),
            vec![
                "platform_eq",
                "compressor",
                "loudness_limiter",
                "stereo_widen",
                "harmonic_excite",
                "spectral_shape",
            ]
        );
    }

    #[test]
    fn test_mastering_disabled_keeps_compliance_stage() {
        let mut spotify = profile("spotify_hq");
        spotify.ai.mastering_enabled = false;
        let chain = MasteringChain::for_profile(&spotify);
        assert_eq!(chain.stage_names(), vec!["loudness_limiter"]);
    }

    #[test]
    fn test_empty_input_rejected() {
        let empty = AudioBuffer::new(0, crate::engine::ChannelLayout::Stereo);
        let result = process(&empty, &profile("spotify_hq"));
        assert!(matches!(
            result,
            Err(ExportError::DspProcessingError { ref stage, .. }) if stage == "input"
        ));
    }

    #[test]
    fn test_nan_input_rejected() {
        let mut buffer = crate::engine::generate_test_tone(440.0, 0.5, 0.1, 48000);
        buffer.samples[0][10] = f32::NAN;
        assert!(process(&buffer, &profile("spotify_hq")).is_err());
    }

    #[test]
    fn test_cancel_flag_stops_before_next_stage() {
        let tone = crate::engine::generate_test_tone(440.0, 0.3, 0.2, 48000);
        let cancel = AtomicBool::new(true);
        let result = process_until(&tone, &profile("spotify_hq"), &cancel);
        assert!(matches!(result, Err(ExportError::Cancelled)));
    }

    #[test]
    fn test_unset_flag_matches_plain_process() {
        let tone = crate::engine::generate_test_tone(440.0, 0.3, 0.2, 48000);
        let spotify = profile("spotify_hq");
        let cancel = AtomicBool::new(false);
        assert_eq!(
            process_until(&tone, &spotify, &cancel).unwrap(),
            process(&tone, &spotify).unwrap()
        );
    }
}
