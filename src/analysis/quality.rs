//! Quality metrics and advisory recommendations for rendered audio

use serde::{Deserialize, Serialize};

use super::spectral::{spectral_balance, SpectralBalance};
use crate::dsp::meter::{estimate_loudness, estimate_peak};
use crate::engine::{AudioBuffer, SILENCE_FLOOR_DB};
use crate::profiles::ExportProfile;

/// Loudness above which a render is flagged as too loud
const TOO_LOUD_LUFS: f32 = -6.0;

/// Loudness below which a render is flagged as too quiet
const TOO_QUIET_LUFS: f32 = -25.0;

/// Dynamic range below which a render counts as over-compressed
const MIN_DYNAMIC_RANGE_DB: f32 = 4.0;

/// Peak above which inter-sample clipping becomes likely
const CLIPPING_RISK_DB: f32 = -0.1;

/// Allowed distance from the profile's loudness target
const TARGET_TOLERANCE_DB: f32 = 1.0;

/// Measured properties of a rendered buffer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    /// Approximate integrated loudness (RMS based)
    pub lufs: f32,
    /// Sample peak in dBFS
    pub peak_db: f32,
    /// Peak minus loudness in dB
    pub dynamic_range: f32,
    pub spectral_balance: SpectralBalance,
    /// Side energy share of mid+side energy (0 = mono)
    pub stereo_width: f32,
    /// Normalized L/R correlation in [-1, 1]
    pub phase_correlation: f32,
    pub phase_ok: bool,
}

/// Metrics plus human-readable advice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub metrics: QualityMetrics,
    pub recommendations: Vec<String>,
}

/// Measure a rendered buffer against the profile it was rendered for
pub fn analyze(buffer: &AudioBuffer, profile: &ExportProfile) -> QualityReport {
    let lufs = estimate_loudness(buffer).max(SILENCE_FLOOR_DB);
    let peak_db = estimate_peak(buffer).max(SILENCE_FLOOR_DB);
    let dynamic_range = (peak_db - lufs).max(0.0);
    let phase_correlation = phase_correlation(buffer);

    let metrics = QualityMetrics {
        lufs,
        peak_db,
        dynamic_range,
        spectral_balance: spectral_balance(buffer),
        stereo_width: stereo_width(buffer),
        phase_correlation,
        phase_ok: phase_correlation >= 0.0,
    };
    let recommendations = recommendations(&metrics, profile);

    tracing::debug!(
        profile_id = %profile.id,
        lufs = metrics.lufs,
        peak_db = metrics.peak_db,
        dynamic_range = metrics.dynamic_range,
        "Quality analysis"
    );

    QualityReport {
        metrics,
        recommendations,
    }
}

/// Side energy over mid+side energy; 0 for mono or silence
pub fn stereo_width(buffer: &AudioBuffer) -> f32 {
    if buffer.num_channels() != 2 {
        return 0.0;
    }

    let (mut mid_energy, mut side_energy) = (0.0_f64, 0.0_f64);
    for (&l, &r) in buffer.channel(0).iter().zip(buffer.channel(1)) {
        let mid = (l as f64 + r as f64) * 0.5;
        let side = (l as f64 - r as f64) * 0.5;
        mid_energy += mid * mid;
        side_energy += side * side;
    }

    let total = mid_energy + side_energy;
    if total <= f64::EPSILON {
        0.0
    } else {
        (side_energy / total) as f32
    }
}

/// Normalized cross-correlation of left and right
///
/// Mono and silent buffers report 1.0.
pub fn phase_correlation(buffer: &AudioBuffer) -> f32 {
    if buffer.num_channels() != 2 {
        return 1.0;
    }

    let (mut lr, mut ll, mut rr) = (0.0_f64, 0.0_f64, 0.0_f64);
    for (&l, &r) in buffer.channel(0).iter().zip(buffer.channel(1)) {
        let (l, r) = (l as f64, r as f64);
        lr += l * r;
        ll += l * l;
        rr += r * r;
    }

    let denominator = (ll * rr).sqrt();
    if denominator <= f64::EPSILON {
        1.0
    } else {
        (lr / denominator).clamp(-1.0, 1.0) as f32
    }
}

fn recommendations(metrics: &QualityMetrics, profile: &ExportProfile) -> Vec<String> {
    let mut advice = Vec::new();
    let target = profile.audio.loudness_target_lufs;
    let range = profile.audio.dynamic_range;

    if metrics.lufs > TOO_LOUD_LUFS {
        advice.push(format!(
            "Too loud: {:.1} LUFS, reduce overall level to avoid listener fatigue",
            metrics.lufs
        ));
    }
    if metrics.lufs < TOO_QUIET_LUFS {
        advice.push(format!(
            "Too quiet: {:.1} LUFS, raise the overall level",
            metrics.lufs
        ));
    }
    if metrics.dynamic_range < MIN_DYNAMIC_RANGE_DB {
        advice.push(format!(
            "Over-compressed: {:.1} dB dynamic range, ease off compression",
            metrics.dynamic_range
        ));
    }
    if metrics.peak_db > CLIPPING_RISK_DB {
        advice.push(format!(
            "Clipping risk: peak at {:.2} dBFS, lower the limiter ceiling",
            metrics.peak_db
        ));
    }
    if (metrics.lufs - target).abs() > TARGET_TOLERANCE_DB {
        advice.push(format!(
            "Off target: {:.1} LUFS against a {:.1} LUFS target for {}",
            metrics.lufs, target, profile.platform
        ));
    }
    if !range.contains(metrics.dynamic_range) {
        advice.push(format!(
            "Dynamic range {:.1} dB outside the {:.0}-{:.0} dB range recommended for {}",
            metrics.dynamic_range, range.min, range.max, profile.platform
        ));
    }
    if metrics.phase_correlation < 0.0 {
        advice.push(format!(
            "Phase issues: correlation {:.2}, check for polarity inversion or excessive widening",
            metrics.phase_correlation
        ));
    }

    advice
}
