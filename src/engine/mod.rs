//! Audio Engine Module
//!
//! Core audio types shared by every stage of the export pipeline:
//! - Audio buffer management and level helpers
//! - WAV I/O, PCM quantization and resampling

pub mod buffer;
pub mod io;

pub use buffer::{
    calculate_peak, calculate_rms, db_to_linear, linear_to_db, peak_linear, AudioBuffer,
    ChannelLayout, DEFAULT_SAMPLE_RATE, SILENCE_FLOOR_DB,
};
pub use io::{
    encode_wav, export_audio, generate_stereo_test_tone, generate_test_tone, import_audio,
    pcm_full_scale, quantize, resample,
};
