//! Export profile data model
//!
//! A profile is a named, versioned bundle of a target platform's audio,
//! loudness and metadata requirements plus the tuning of the mastering
//! chain. Everything platform-specific lives here as data.

use serde::{Deserialize, Serialize};

use crate::dsp::EqBand;
use crate::engine::ChannelLayout;
use crate::error::{ExportError, Result};

/// Encoded container/codec of a rendered artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Wav,
    Flac,
    Mp3,
    Aac,
    Ogg,
}

impl AudioFormat {
    /// File extension for the delivered format
    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Wav => "wav",
            AudioFormat::Flac => "flac",
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Aac => "m4a",
            AudioFormat::Ogg => "ogg",
        }
    }

    /// Lossy formats are delivered at a constant bitrate
    pub fn is_lossy(&self) -> bool {
        matches!(self, AudioFormat::Mp3 | AudioFormat::Aac | AudioFormat::Ogg)
    }
}

impl std::fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AudioFormat::Wav => "wav",
            AudioFormat::Flac => "flac",
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Aac => "aac",
            AudioFormat::Ogg => "ogg",
        };
        f.write_str(name)
    }
}

/// Sample rates an MPEG audio stream can carry
pub const MP3_SAMPLE_RATES: [u32; 9] = [8000, 11025, 12000, 16000, 22050, 24000, 32000, 44100, 48000];

/// Acceptable dynamic range window in dB
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DynamicRangeRange {
    pub min: f32,
    pub max: f32,
}

impl DynamicRangeRange {
    pub fn contains(&self, value: f32) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Audio delivery requirements
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioSpec {
    pub sample_rate: u32,
    pub bit_depth: u16,
    pub format: AudioFormat,
    /// Constant bitrate in kbps, lossy formats only
    #[serde(default)]
    pub bitrate_kbps: Option<u32>,
    pub channel_layout: ChannelLayout,
    pub loudness_target_lufs: f32,
    pub peak_limit_db: f32,
    pub dynamic_range: DynamicRangeRange,
}

/// Cover art requirements (validated by the packaging layer, carried here)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtworkRules {
    pub min_size_px: u32,
    pub max_size_px: u32,
    pub formats: Vec<String>,
    #[serde(default)]
    pub square: bool,
}

/// Allowed track duration
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DurationLimits {
    #[serde(default)]
    pub min_secs: Option<f64>,
    #[serde(default)]
    pub max_secs: Option<f64>,
}

impl DurationLimits {
    pub fn contains(&self, duration_secs: f64) -> bool {
        self.min_secs.map_or(true, |min| duration_secs >= min)
            && self.max_secs.map_or(true, |max| duration_secs <= max)
    }
}

/// Metadata a platform insists on
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MetadataRules {
    #[serde(default)]
    pub required_fields: Vec<String>,
    #[serde(default)]
    pub artwork: Option<ArtworkRules>,
    #[serde(default)]
    pub duration_limits: DurationLimits,
}

/// Character of the dynamics stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MasteringStyle {
    Commercial,
    Artistic,
    Podcast,
    Streaming,
}

/// Optional enhancement stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EnhancementFlags {
    #[serde(default)]
    pub stereo_widen: bool,
    #[serde(default)]
    pub harmonic_excite: bool,
    #[serde(default)]
    pub spectral_shape: bool,
}

/// Parameters of the enhancement stages
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnhancementTuning {
    /// Side gain for mid/side widening (1.0 = unchanged)
    pub width_factor: f32,
    /// Exciter drive `k`
    pub excite_drive: f32,
    /// Exciter wet mix `a`
    pub excite_mix: f32,
    /// Broadband spectral shaping gain
    pub spectral_gain_db: f32,
}

impl Default for EnhancementTuning {
    fn default() -> Self {
        Self {
            width_factor: 1.1,
            excite_drive: 1.5,
            excite_mix: 0.1,
            spectral_gain_db: 0.0,
        }
    }
}

/// Automated mastering configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiOptimizations {
    pub mastering_enabled: bool,
    pub mastering_style: MasteringStyle,
    #[serde(default)]
    pub enhancement_flags: EnhancementFlags,
    #[serde(default)]
    pub tuning: EnhancementTuning,
}

/// A target platform's export profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportProfile {
    pub id: String,
    pub platform: String,
    #[serde(default = "default_version")]
    pub version: u32,
    pub audio: AudioSpec,
    #[serde(default)]
    pub metadata: MetadataRules,
    pub ai: AiOptimizations,
    /// Platform EQ table, applied as stage 1 of the mastering chain
    #[serde(default)]
    pub eq_curve: Vec<EqBand>,
}

fn default_version() -> u32 {
    1
}

impl ExportProfile {
    /// Reject profiles the pipeline cannot honour
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| ExportError::InvalidProfile {
            profile_id: self.id.clone(),
            reason,
        };

        if self.id.trim().is_empty() {
            return Err(invalid("profile id is empty".to_string()));
        }
        if !matches!(self.audio.bit_depth, 16 | 24 | 32) {
            return Err(invalid(format!(
                "bit depth {} not in 16/24/32",
                self.audio.bit_depth
            )));
        }
        if !(8000..=192000).contains(&self.audio.sample_rate) {
            return Err(invalid(format!(
                "sample rate {} outside 8000-192000 Hz",
                self.audio.sample_rate
            )));
        }
        if self.audio.format.is_lossy() && self.audio.bitrate_kbps.is_none() {
            return Err(invalid(format!(
                "{} output requires a bitrate",
                self.audio.format
            )));
        }
        if self.audio.format == AudioFormat::Mp3
            && !MP3_SAMPLE_RATES.contains(&self.audio.sample_rate)
        {
            return Err(invalid(format!(
                "MP3 cannot carry {} Hz",
                self.audio.sample_rate
            )));
        }
        if self.audio.format == AudioFormat::Flac && self.audio.bit_depth == 32 {
            return Err(invalid("FLAC output supports 16 or 24 bit".to_string()));
        }
        if self.audio.peak_limit_db > 0.0 {
            return Err(invalid(format!(
                "peak limit {} dBFS above full scale",
                self.audio.peak_limit_db
            )));
        }
        if self.audio.loudness_target_lufs >= self.audio.peak_limit_db {
            return Err(invalid(format!(
                "loudness target {} LUFS not below peak limit {} dBFS",
                self.audio.loudness_target_lufs, self.audio.peak_limit_db
            )));
        }
        if self.audio.dynamic_range.min > self.audio.dynamic_range.max {
            return Err(invalid("dynamic range min above max".to_string()));
        }
        for band in &self.eq_curve {
            band.validate().map_err(|e| invalid(e.to_string()))?;
        }
        Ok(())
    }
}
