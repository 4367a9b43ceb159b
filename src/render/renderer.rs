//! Final render of a mastered buffer into a deliverable artifact
//!
//! Order of operations:
//! 1. Metadata and duration checks against the profile
//! 2. Linear fade-in / fade-out
//! 3. Optional peak normalization
//! 4. Soft-clip safety pass at the profile's peak limit
//! 5. Channel mapping and resampling to the delivery format
//! 6. Encoding, artifact write, checksum

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::encoder::{encode, LOSSY_PCM_BIT_DEPTH};
use super::settings::{ExportMetadata, RenderSettings};
use super::sink::ArtifactSink;
use crate::dsp::soft_limit;
use crate::engine::{
    db_to_linear, pcm_full_scale, peak_linear, quantize, resample, AudioBuffer, ChannelLayout,
};
use crate::error::{ExportError, Result};
use crate::profiles::{AudioFormat, ExportProfile};

/// Highest peak the optional normalizer aims for, in dBFS
pub const NORMALIZE_CEILING_DB: f32 = -0.45;

/// Descriptor of a rendered artifact plus the audio as delivered
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderedArtifact {
    pub profile_id: String,
    pub platform: String,
    pub format: AudioFormat,
    pub sample_rate: u32,
    pub bit_depth: u16,
    pub bitrate_kbps: Option<u32>,
    pub channel_layout: ChannelLayout,
    /// Location returned by the artifact sink
    pub path: String,
    pub file_size: u64,
    pub duration_secs: f64,
    /// Hex SHA-256 of the written bytes
    pub checksum: String,
    /// Rendered samples after quantization, for quality analysis
    #[serde(skip)]
    pub audio: AudioBuffer,
}

/// Render `buffer` for `profile` and store it under `stem` in `sink`
///
/// `stem` is the artifact key without extension, e.g. `<job_id>/<profile_id>`.
pub fn render(
    buffer: &AudioBuffer,
    profile: &ExportProfile,
    metadata: &ExportMetadata,
    settings: &RenderSettings,
    sink: &dyn ArtifactSink,
    stem: &str,
) -> Result<RenderedArtifact> {
    let render_error = |reason: String| ExportError::RenderError {
        profile_id: profile.id.clone(),
        reason,
    };

    let missing = metadata.missing_fields(&profile.metadata.required_fields);
    if !missing.is_empty() {
        return Err(render_error(format!(
            "missing required metadata: {}",
            missing.join(", ")
        )));
    }

    let duration = buffer.duration_secs();
    if !profile.metadata.duration_limits.contains(duration) {
        return Err(render_error(format!(
            "duration {:.1}s outside platform limits",
            duration
        )));
    }

    let mut audio = buffer.clone();
    apply_fades(&mut audio, settings.fade_in_secs, settings.fade_out_secs);

    if settings.normalize {
        normalize_peak(&mut audio, NORMALIZE_CEILING_DB.min(profile.audio.peak_limit_db));
    }

    soft_limit(
        &mut audio,
        profile.audio.peak_limit_db,
        settings.limiter_style.knee_ratio(),
    );

    let audio = map_channels(&audio, profile.audio.channel_layout);
    let audio = resample(&audio, profile.audio.sample_rate);

    let bytes = encode(&audio, &profile.audio)?;
    let key = format!("{}.{}", stem, profile.audio.format.extension());
    let path = sink.write(&key, &bytes)?;
    let checksum = format!("{:x}", Sha256::digest(&bytes));

    let delivered_depth = if profile.audio.format.is_lossy() {
        LOSSY_PCM_BIT_DEPTH
    } else {
        profile.audio.bit_depth
    };

    tracing::debug!(
        profile_id = %profile.id,
        path = %path,
        size = bytes.len(),
        "Rendered artifact"
    );

    Ok(RenderedArtifact {
        profile_id: profile.id.clone(),
        platform: profile.platform.clone(),
        format: profile.audio.format,
        sample_rate: audio.sample_rate,
        bit_depth: profile.audio.bit_depth,
        bitrate_kbps: profile.audio.bitrate_kbps,
        channel_layout: profile.audio.channel_layout,
        path,
        file_size: bytes.len() as u64,
        duration_secs: audio.duration_secs(),
        checksum,
        audio: dequantize(audio, delivered_depth),
    })
}

/// Linear ramps at the head and tail of the buffer
pub fn apply_fades(buffer: &mut AudioBuffer, fade_in_secs: f64, fade_out_secs: f64) {
    let len = buffer.num_samples();
    let rate = buffer.sample_rate as f64;
    let fade_in = ((fade_in_secs * rate).round() as usize).min(len);
    let fade_out = ((fade_out_secs * rate).round() as usize).min(len);

    for channel in &mut buffer.samples {
        for (i, sample) in channel.iter_mut().take(fade_in).enumerate() {
            *sample *= i as f32 / fade_in as f32;
        }
        for (i, sample) in channel.iter_mut().skip(len - fade_out).enumerate() {
            *sample *= (fade_out - 1 - i) as f32 / fade_out as f32;
        }
    }
}

/// Scale so the sample peak sits at `target_db`
fn normalize_peak(buffer: &mut AudioBuffer, target_db: f32) {
    let peak = peak_linear(buffer);
    if peak > 0.0 {
        buffer.scale(db_to_linear(target_db) / peak);
    }
}

/// Downmix stereo to mono or duplicate mono to stereo
pub fn map_channels(buffer: &AudioBuffer, layout: ChannelLayout) -> AudioBuffer {
    match (buffer.num_channels(), layout) {
        (2, ChannelLayout::Mono) => {
            let mono = buffer
                .channel(0)
                .iter()
                .zip(buffer.channel(1))
                .map(|(l, r)| (l + r) * 0.5)
                .collect();
            AudioBuffer {
                samples: vec![mono],
                sample_rate: buffer.sample_rate,
            }
        }
        (1, ChannelLayout::Stereo) => AudioBuffer {
            samples: vec![buffer.samples[0].clone(), buffer.samples[0].clone()],
            sample_rate: buffer.sample_rate,
        },
        _ => buffer.clone(),
    }
}

/// Round-trip samples through integer PCM so analysis sees delivered values
fn dequantize(mut buffer: AudioBuffer, bit_depth: u16) -> AudioBuffer {
    if bit_depth == 32 {
        return buffer;
    }
    let full_scale = pcm_full_scale(bit_depth);
    buffer.map_samples(|s| quantize(s, bit_depth) as f32 / full_scale);
    buffer
}
