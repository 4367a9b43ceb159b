//! Audio file I/O for Mixport
//!
//! Handles reading project mixes from WAV and producing PCM bytes for the
//! renderer. Sample rate conversion uses linear interpolation, which never
//! produces a sample outside the range of its two neighbours and so keeps
//! the limiter's peak ceiling intact.

use std::io::Cursor;
use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use crate::engine::buffer::{AudioBuffer, ChannelLayout};
use crate::error::{ExportError, Result};

/// Largest positive integer value for a signed PCM bit depth
#[inline]
pub fn pcm_full_scale(bit_depth: u16) -> f32 {
    match bit_depth {
        16 => 32767.0,
        24 => 8388607.0,
        _ => 2147483647.0,
    }
}

/// Import a WAV file as an AudioBuffer at its native sample rate
///
/// # Errors
/// * `InvalidAudio` - If the file is not a valid WAV file or holds no samples
/// * `UnsupportedFormat` - If the audio has more than 2 channels
pub fn import_audio(path: &Path) -> Result<AudioBuffer> {
    let reader = WavReader::open(path).map_err(|e| ExportError::InvalidAudio {
        reason: format!("Failed to open WAV file {}: {}", path.display(), e),
        source: Some(Box::new(e)),
    })?;

    let spec = reader.spec();
    let channels = spec.channels as usize;
    let layout = ChannelLayout::from_count(channels).ok_or_else(|| {
        ExportError::UnsupportedFormat {
            format: format!("{}-channel audio (only mono/stereo supported)", channels),
        }
    })?;

    let samples_f32 = read_samples_as_f32(reader, spec.bits_per_sample, spec.sample_format)?;
    if samples_f32.is_empty() {
        return Err(ExportError::InvalidAudio {
            reason: format!("{} contains no samples", path.display()),
            source: None,
        });
    }

    AudioBuffer::from_interleaved(&samples_f32, layout, spec.sample_rate)
}

/// Write an AudioBuffer to a WAV file
pub fn export_audio(buffer: &AudioBuffer, path: &Path, bit_depth: u16) -> Result<()> {
    let bytes = encode_wav(buffer, bit_depth)?;
    std::fs::write(path, bytes)?;
    Ok(())
}

/// Encode an AudioBuffer as a complete WAV file in memory
///
/// Integer depths round to the nearest code; 32-bit is written as float.
pub fn encode_wav(buffer: &AudioBuffer, bit_depth: u16) -> Result<Vec<u8>> {
    let spec = WavSpec {
        channels: buffer.num_channels() as u16,
        sample_rate: buffer.sample_rate,
        bits_per_sample: bit_depth,
        sample_format: if bit_depth == 32 {
            SampleFormat::Float
        } else {
            SampleFormat::Int
        },
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, spec).map_err(hound_to_io)?;
        let interleaved = buffer.to_interleaved();

        match bit_depth {
            16 => {
                for sample in interleaved {
                    writer
                        .write_sample(quantize(sample, 16) as i16)
                        .map_err(hound_to_io)?;
                }
            }
            24 => {
                // 24-bit stored as i32 in hound
                for sample in interleaved {
                    writer
                        .write_sample(quantize(sample, 24))
                        .map_err(hound_to_io)?;
                }
            }
            32 => {
                for sample in interleaved {
                    writer.write_sample(sample).map_err(hound_to_io)?;
                }
            }
            _ => {
                return Err(ExportError::UnsupportedFormat {
                    format: format!("{}-bit audio (only 16, 24, 32 supported)", bit_depth),
                });
            }
        }

        writer.finalize().map_err(hound_to_io)?;
    }

    Ok(cursor.into_inner())
}

/// Round a float sample to the nearest signed integer code for a bit depth
#[inline]
pub fn quantize(sample: f32, bit_depth: u16) -> i32 {
    let full_scale = pcm_full_scale(bit_depth);
    (sample * full_scale).round().clamp(-full_scale - 1.0, full_scale) as i32
}

fn hound_to_io(e: hound::Error) -> ExportError {
    match e {
        hound::Error::IoError(io) => ExportError::Io(io),
        other => ExportError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            other.to_string(),
        )),
    }
}

/// Generate a mono sine test tone at the given amplitude
pub fn generate_test_tone(
    frequency: f32,
    amplitude: f32,
    duration_secs: f32,
    sample_rate: u32,
) -> AudioBuffer {
    let num_samples = (duration_secs * sample_rate as f32) as usize;
    let mut buffer = AudioBuffer::with_sample_rate(num_samples, ChannelLayout::Mono, sample_rate);

    let angular_freq = 2.0 * std::f32::consts::PI * frequency / sample_rate as f32;
    for (i, sample) in buffer.samples[0].iter_mut().enumerate() {
        *sample = amplitude * (angular_freq * i as f32).sin();
    }

    buffer
}

/// Generate a stereo test tone with different frequencies per channel
pub fn generate_stereo_test_tone(
    freq_left: f32,
    freq_right: f32,
    amplitude: f32,
    duration_secs: f32,
    sample_rate: u32,
) -> AudioBuffer {
    let num_samples = (duration_secs * sample_rate as f32) as usize;
    let mut buffer =
        AudioBuffer::with_sample_rate(num_samples, ChannelLayout::Stereo, sample_rate);

    let angular_l = 2.0 * std::f32::consts::PI * freq_left / sample_rate as f32;
    let angular_r = 2.0 * std::f32::consts::PI * freq_right / sample_rate as f32;

    for (i, sample) in buffer.samples[0].iter_mut().enumerate() {
        *sample = amplitude * (angular_l * i as f32).sin();
    }
    for (i, sample) in buffer.samples[1].iter_mut().enumerate() {
        *sample = amplitude * (angular_r * i as f32).sin();
    }

    buffer
}

// ============================================================================
// Internal helper functions
// ============================================================================

/// Read samples from WAV reader and convert to f32
fn read_samples_as_f32<R: std::io::Read>(
    mut reader: WavReader<R>,
    bits_per_sample: u16,
    sample_format: SampleFormat,
) -> Result<Vec<f32>> {
    let scale = match (sample_format, bits_per_sample) {
        (SampleFormat::Float, _) => {
            return reader
                .samples::<f32>()
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(|e| ExportError::InvalidAudio {
                    reason: format!("Failed to read float samples: {}", e),
                    source: Some(Box::new(e)),
                });
        }
        (SampleFormat::Int, 8) => 128.0,
        (SampleFormat::Int, 16) => 32768.0,
        (SampleFormat::Int, 24) => 8388608.0,
        (SampleFormat::Int, 32) => 2147483648.0,
        (SampleFormat::Int, bits) => {
            return Err(ExportError::UnsupportedFormat {
                format: format!("{}-bit integer audio", bits),
            });
        }
    };

    reader
        .samples::<i32>()
        .map(|s| s.map(|v| v as f32 / scale))
        .collect::<std::result::Result<Vec<f32>, _>>()
        .map_err(|e| ExportError::InvalidAudio {
            reason: format!("Failed to read {}-bit samples: {}", bits_per_sample, e),
            source: Some(Box::new(e)),
        })
}

/// Resample every channel of a buffer to a new sample rate
pub fn resample(buffer: &AudioBuffer, target_rate: u32) -> AudioBuffer {
    if buffer.sample_rate == target_rate || buffer.sample_rate == 0 {
        let mut copy = buffer.clone();
        copy.sample_rate = target_rate;
        return copy;
    }

    let ratio = target_rate as f64 / buffer.sample_rate as f64;
    AudioBuffer {
        samples: buffer
            .samples
            .iter()
            .map(|channel| resample_linear(channel, ratio))
            .collect(),
        sample_rate: target_rate,
    }
}

/// Linear interpolation resampling
fn resample_linear(samples: &[f32], ratio: f64) -> Vec<f32> {
    if samples.is_empty() {
        return Vec::new();
    }

    let source_len = samples.len();
    let target_len = ((source_len as f64) * ratio).round().max(1.0) as usize;
    let mut output = Vec::with_capacity(target_len);

    for i in 0..target_len {
        let src_pos = i as f64 / ratio;
        let src_idx = src_pos.floor() as usize;
        let frac = (src_pos - src_idx as f64) as f32;

        let sample = if src_idx + 1 < source_len {
            samples[src_idx] * (1.0 - frac) + samples[src_idx + 1] * frac
        } else {
            samples[source_len - 1]
        };
        output.push(sample);
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_wav_roundtrip_through_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        let tone = generate_stereo_test_tone(440.0, 660.0, 0.5, 0.25, 44100);

        export_audio(&tone, &path, 24).unwrap();
        let loaded = import_audio(&path).unwrap();

        assert_eq!(loaded.sample_rate, 44100);
        assert_eq!(loaded.channels(), 2);
        assert_eq!(loaded.len(), tone.len());
        let diff = (loaded.samples[0][100] - tone.samples[0][100]).abs();
        assert!(diff < 1e-5, "24-bit roundtrip error too large: {}", diff);
    }

    #[test]
    fn test_import_missing_file() {
        let result = import_audio(Path::new("/nonexistent/mix.wav"));
        assert!(matches!(result, Err(ExportError::InvalidAudio { .. })));
    }

    #[test]
    fn test_encode_wav_size() {
        let tone = generate_test_tone(440.0, 0.5, 1.0, 44100);
        let bytes = encode_wav(&tone, 16).unwrap();
        // 2 bytes per sample plus a small RIFF header
        let payload = 44100 * 2;
        assert!(bytes.len() >= payload + 44);
        assert!(bytes.len() <= payload + 80);
    }

    #[test]
    fn test_encode_wav_rejects_odd_depth() {
        let tone = generate_test_tone(440.0, 0.5, 0.1, 44100);
        assert!(encode_wav(&tone, 12).is_err());
    }

    #[test]
    fn test_quantize_rounds_and_clamps() {
        assert_eq!(quantize(0.0, 16), 0);
        assert_eq!(quantize(1.0, 16), 32767);
        assert_eq!(quantize(-2.0, 16), -32768);
    }

    #[test]
    fn test_resample_length_and_bounds() {
        let tone = generate_test_tone(440.0, 0.8, 1.0, 48000);
        let resampled = resample(&tone, 44100);
        assert_eq!(resampled.sample_rate, 44100);
        assert_eq!(resampled.len(), 44100);
        let peak = resampled.samples[0].iter().fold(0.0_f32, |a, &s| a.max(s.abs()));
        assert!(peak <= 0.8 + 1e-6);
    }
}
