//! Platform export profiles
//!
//! Profiles are pure data: the mastering chain, renderer and scheduler read
//! every platform-specific decision from these types.

mod registry;
mod types;

pub use registry::ProfileRegistry;
pub use types::{
    AiOptimizations, ArtworkRules, AudioFormat, AudioSpec, DurationLimits, DynamicRangeRange,
    EnhancementFlags, EnhancementTuning, ExportProfile, MasteringStyle, MetadataRules,
    MP3_SAMPLE_RATES,
};
