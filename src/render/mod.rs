//! Rendering of mastered audio into platform deliverables

mod encoder;
mod renderer;
mod settings;
mod sink;

pub use encoder::{
    aac_available, encode, encode_aac, encode_flac, encode_mp3, encode_ogg, FFMPEG,
    LOSSY_PCM_BIT_DEPTH,
};
pub use renderer::{apply_fades, map_channels, render, RenderedArtifact, NORMALIZE_CEILING_DB};
pub use settings::{ExportMetadata, RenderSettings};
pub use sink::{ArtifactSink, DirectorySink, MemorySink};
