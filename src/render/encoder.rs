//! Artifact encoding
//!
//! - WAV through hound
//! - FLAC through flacenc
//! - MP3 through LAME (mp3lame-encoder), constant bitrate
//! - Ogg Vorbis through libvorbis (vorbis-encoder)
//! - AAC (.m4a) through an `ffmpeg` binary on the PATH
//!
//! Lossy encoders are fed 16-bit PCM.

use std::io::ErrorKind;
use std::process::Command;

use flacenc::bitsink::ByteSink;
use flacenc::component::BitRepr;
use flacenc::config;
use flacenc::error::Verify;
use flacenc::source::MemSource;
use mp3lame_encoder::{Bitrate, Builder, FlushNoGap, InterleavedPcm, Quality};

use crate::engine::{encode_wav, quantize, AudioBuffer};
use crate::error::{ExportError, Result};
use crate::profiles::{AudioFormat, AudioSpec};

/// Bit depth of the PCM handed to lossy encoders
pub const LOSSY_PCM_BIT_DEPTH: u16 = 16;

/// External encoder used for AAC
pub const FFMPEG: &str = "ffmpeg";

const FLAC_BLOCK_SIZE: usize = 4096;

/// Encode a finished buffer in the profile's delivery format
pub fn encode(buffer: &AudioBuffer, spec: &AudioSpec) -> Result<Vec<u8>> {
    match spec.format {
        AudioFormat::Wav => encode_wav(buffer, spec.bit_depth),
        AudioFormat::Flac => encode_flac(buffer, spec.bit_depth),
        AudioFormat::Mp3 => encode_mp3(buffer, required_bitrate(spec)?),
        AudioFormat::Ogg => encode_ogg(buffer, required_bitrate(spec)?),
        AudioFormat::Aac => encode_aac(buffer, required_bitrate(spec)?),
    }
}

fn required_bitrate(spec: &AudioSpec) -> Result<u32> {
    spec.bitrate_kbps
        .ok_or_else(|| ExportError::UnsupportedFormat {
            format: format!("{} without a bitrate", spec.format),
        })
}

fn encoding_error(format: &str, reason: String) -> ExportError {
    ExportError::EncodingError {
        format: format.to_string(),
        reason,
    }
}

fn pcm16(buffer: &AudioBuffer) -> Vec<i16> {
    buffer
        .to_interleaved()
        .into_iter()
        .map(|s| quantize(s, LOSSY_PCM_BIT_DEPTH) as i16)
        .collect()
}

/// Encode integer PCM as a FLAC stream
pub fn encode_flac(buffer: &AudioBuffer, bit_depth: u16) -> Result<Vec<u8>> {
    if !matches!(bit_depth, 16 | 24) {
        return Err(ExportError::UnsupportedFormat {
            format: format!("{}-bit FLAC", bit_depth),
        });
    }

    let samples: Vec<i32> = buffer
        .to_interleaved()
        .into_iter()
        .map(|s| quantize(s, bit_depth))
        .collect();

    let source = MemSource::from_samples(
        &samples,
        buffer.num_channels(),
        bit_depth as usize,
        buffer.sample_rate as usize,
    );

    let config = config::Encoder::default()
        .into_verified()
        .map_err(|(_, e)| encoding_error("flac", format!("invalid encoder config: {:?}", e)))?;

    let stream = flacenc::encode_with_fixed_block_size(&config, source, FLAC_BLOCK_SIZE)
        .map_err(|e| encoding_error("flac", format!("encoding failed: {:?}", e)))?;

    let mut sink = ByteSink::new();
    stream
        .write(&mut sink)
        .map_err(|e| encoding_error("flac", format!("failed to write stream: {:?}", e)))?;

    Ok(sink.as_slice().to_vec())
}

/// Nearest LAME bitrate at or below the requested one
fn lame_bitrate(kbps: u32) -> Bitrate {
    match kbps {
        0..=111 => Bitrate::Kbps96,
        112..=127 => Bitrate::Kbps112,
        128..=159 => Bitrate::Kbps128,
        160..=191 => Bitrate::Kbps160,
        192..=223 => Bitrate::Kbps192,
        224..=255 => Bitrate::Kbps224,
        256..=319 => Bitrate::Kbps256,
        _ => Bitrate::Kbps320,
    }
}

/// Encode a mono or stereo buffer as constant-bitrate MP3
pub fn encode_mp3(buffer: &AudioBuffer, bitrate_kbps: u32) -> Result<Vec<u8>> {
    let channels = buffer.num_channels();
    if !matches!(channels, 1 | 2) {
        return Err(ExportError::UnsupportedFormat {
            format: format!("{}-channel MP3", channels),
        });
    }

    let mut builder =
        Builder::new().ok_or_else(|| encoding_error("mp3", "LAME init failed".to_string()))?;
    builder
        .set_num_channels(channels as u8)
        .map_err(|e| encoding_error("mp3", format!("invalid channel count: {:?}", e)))?;
    builder
        .set_sample_rate(buffer.sample_rate)
        .map_err(|e| encoding_error("mp3", format!("invalid sample rate: {:?}", e)))?;
    builder
        .set_brate(lame_bitrate(bitrate_kbps))
        .map_err(|e| encoding_error("mp3", format!("invalid bitrate: {:?}", e)))?;
    builder
        .set_quality(Quality::Best)
        .map_err(|e| encoding_error("mp3", format!("invalid quality: {:?}", e)))?;
    let mut encoder = builder
        .build()
        .map_err(|e| encoding_error("mp3", format!("LAME build failed: {:?}", e)))?;

    let pcm = pcm16(buffer);
    let mut output: Vec<u8> =
        Vec::with_capacity(mp3lame_encoder::max_required_buffer_size(buffer.num_samples()));

    let written = encoder
        .encode(InterleavedPcm(&pcm), output.spare_capacity_mut())
        .map_err(|e| encoding_error("mp3", format!("encode failed: {:?}", e)))?;
    // SAFETY: LAME initialized the first `written` bytes of spare capacity
    unsafe {
        output.set_len(written);
    }

    output.reserve(7200);
    let flushed = encoder
        .flush::<FlushNoGap>(output.spare_capacity_mut())
        .map_err(|e| encoding_error("mp3", format!("flush failed: {:?}", e)))?;
    // SAFETY: LAME initialized the next `flushed` bytes of spare capacity
    unsafe {
        output.set_len(output.len() + flushed);
    }

    Ok(output)
}

/// libvorbis VBR quality that lands near a nominal bitrate
fn vorbis_quality(bitrate_kbps: u32) -> f32 {
    match bitrate_kbps {
        0..=79 => 0.0,
        80..=111 => 0.2,
        112..=143 => 0.4,
        144..=175 => 0.5,
        176..=223 => 0.6,
        224..=287 => 0.8,
        _ => 0.9,
    }
}

/// Encode an Ogg Vorbis stream
pub fn encode_ogg(buffer: &AudioBuffer, bitrate_kbps: u32) -> Result<Vec<u8>> {
    let mut encoder = vorbis_encoder::Encoder::new(
        buffer.num_channels() as u32,
        buffer.sample_rate as u64,
        vorbis_quality(bitrate_kbps),
    )
    .map_err(|e| encoding_error("ogg", format!("Vorbis init failed: {}", e)))?;

    let mut bytes = encoder
        .encode(&pcm16(buffer))
        .map_err(|e| encoding_error("ogg", format!("Vorbis encode failed: {}", e)))?;
    let tail = encoder
        .flush()
        .map_err(|e| encoding_error("ogg", format!("Vorbis flush failed: {}", e)))?;
    bytes.extend(tail);

    Ok(bytes)
}

/// True when an `ffmpeg` binary can be run
pub fn aac_available() -> bool {
    Command::new(FFMPEG)
        .arg("-version")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

/// Encode AAC in an MP4 container by running `ffmpeg`
///
/// Fails with `UnsupportedFormat` when ffmpeg is not installed.
pub fn encode_aac(buffer: &AudioBuffer, bitrate_kbps: u32) -> Result<Vec<u8>> {
    let scratch = tempfile::tempdir()?;
    let input = scratch.path().join("input.wav");
    let output = scratch.path().join("output.m4a");
    std::fs::write(&input, encode_wav(buffer, LOSSY_PCM_BIT_DEPTH)?)?;

    let result = Command::new(FFMPEG)
        .args(["-y", "-nostdin", "-loglevel", "error", "-i"])
        .arg(&input)
        .args(["-map_metadata", "-1", "-fflags", "+bitexact", "-flags:a", "+bitexact"])
        .args(["-c:a", "aac", "-b:a"])
        .arg(format!("{}k", bitrate_kbps))
        .arg(&output)
        .output()
        .map_err(|e| match e.kind() {
            ErrorKind::NotFound => ExportError::UnsupportedFormat {
                format: "aac (ffmpeg not installed)".to_string(),
            },
            _ => ExportError::Io(e),
        })?;

    if !result.status.success() {
        return Err(encoding_error(
            "aac",
            String::from_utf8_lossy(&result.stderr).trim().to_string(),
        ));
    }

    Ok(std::fs::read(&output)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{generate_stereo_test_tone, generate_test_tone, ChannelLayout};
    use crate::profiles::DynamicRangeRange;

    fn spec(format: AudioFormat, bit_depth: u16, bitrate_kbps: Option<u32>) -> AudioSpec {
        AudioSpec {
            sample_rate: 44100,
            bit_depth,
            format,
            bitrate_kbps,
            channel_layout: ChannelLayout::Stereo,
            loudness_target_lufs: -14.0,
            peak_limit_db: -1.0,
            dynamic_range: DynamicRangeRange { min: 6.0, max: 14.0 },
        }
    }

    fn is_mp3(bytes: &[u8]) -> bool {
        bytes.starts_with(b"ID3") || (bytes.len() > 1 && bytes[0] == 0xFF && bytes[1] & 0xE0 == 0xE0)
    }

    #[test]
    fn test_flac_stream_marker() {
        let tone = generate_stereo_test_tone(440.0, 660.0, 0.3, 0.2, 44100);
        let bytes = encode_flac(&tone, 16).unwrap();
        assert_eq!(&bytes[..4], b"fLaC");
    }

    #[test]
    fn test_mp3_is_real_mpeg_audio() {
        let tone = generate_stereo_test_tone(440.0, 440.0, 0.3, 2.0, 44100);
        let bytes = encode(&tone, &spec(AudioFormat::Mp3, 16, Some(320))).unwrap();
        assert!(is_mp3(&bytes), "unexpected header {:02X?}", &bytes[..4]);
        assert_ne!(&bytes[..4], b"RIFF");

        // 2 s at 320 kbps is about 80 kB plus framing
        assert!(
            (70_000..=95_000).contains(&bytes.len()),
            "size {}",
            bytes.len()
        );
    }

    #[test]
    fn test_mp3_bitrate_drives_size() {
        let tone = generate_stereo_test_tone(440.0, 440.0, 0.3, 2.0, 44100);
        let high = encode_mp3(&tone, 320).unwrap();
        let low = encode_mp3(&tone, 128).unwrap();
        assert!(low.len() * 2 < high.len(), "{} vs {}", low.len(), high.len());
    }

    #[test]
    fn test_mp3_mono() {
        let tone = generate_test_tone(440.0, 0.3, 1.0, 44100);
        let bytes = encode_mp3(&tone, 128).unwrap();
        assert!(is_mp3(&bytes));
    }

    #[test]
    fn test_ogg_page_marker() {
        let tone = generate_stereo_test_tone(440.0, 660.0, 0.3, 0.5, 44100);
        let bytes = encode(&tone, &spec(AudioFormat::Ogg, 16, Some(192))).unwrap();
        assert_eq!(&bytes[..4], b"OggS");
    }

    #[test]
    fn test_aac_uses_mp4_container_or_reports_missing_encoder() {
        let tone = generate_stereo_test_tone(440.0, 440.0, 0.3, 0.5, 48000);
        let result = encode(&tone, &spec(AudioFormat::Aac, 16, Some(256)));
        if aac_available() {
            let bytes = result.unwrap();
            assert_eq!(&bytes[4..8], b"ftyp");
        } else {
            assert_eq!(result.unwrap_err().error_code(), "UNSUPPORTED_FORMAT");
        }
    }

    #[test]
    fn test_lossy_without_bitrate_rejected() {
        let tone = generate_stereo_test_tone(440.0, 440.0, 0.3, 0.1, 44100);
        let err = encode(&tone, &spec(AudioFormat::Mp3, 16, None)).unwrap_err();
        assert_eq!(err.error_code(), "UNSUPPORTED_FORMAT");
    }

    #[test]
    fn test_flac_rejects_float_depth() {
        let tone = generate_stereo_test_tone(440.0, 440.0, 0.3, 0.1, 44100);
        assert!(encode_flac(&tone, 32).is_err());
    }
}
