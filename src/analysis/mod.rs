//! Quality analysis
//!
//! Scores a rendered buffer and produces advisory recommendations. The
//! analyzer shares its loudness and peak estimators with the limiter stage.

mod quality;
mod spectral;

pub use quality::{analyze, phase_correlation, stereo_width, QualityMetrics, QualityReport};
pub use spectral::{spectral_balance, SpectralBalance, CROSSOVERS_HZ};
