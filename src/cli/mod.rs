//! CLI Module
//!
//! Command-line interface for the Mixport export pipeline.

pub mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::dsp::LimiterStyle;

/// Mixport - export a finished mix to every platform at once
#[derive(Parser, Debug)]
#[command(name = "mixport")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// JSON configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Limiter character selectable on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LimiterArg {
    Transparent,
    Balanced,
    Punchy,
}

impl From<LimiterArg> for LimiterStyle {
    fn from(arg: LimiterArg) -> Self {
        match arg {
            LimiterArg::Transparent => LimiterStyle::Transparent,
            LimiterArg::Balanced => LimiterStyle::Balanced,
            LimiterArg::Punchy => LimiterStyle::Punchy,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List registered export profiles
    #[command(name = "profiles")]
    Profiles {
        /// Print full profile definitions as JSON
        #[arg(long)]
        json: bool,
    },

    /// List projects available in the project directory
    #[command(name = "projects")]
    Projects {
        /// Directory holding <project_id>.wav mixes
        #[arg(long)]
        project_dir: Option<PathBuf>,
    },

    /// Export a project to one or more platforms
    #[command(name = "export")]
    Export {
        /// Project id (the mix is read from <project_dir>/<project_id>.wav)
        project_id: String,

        /// Comma-separated profile ids, e.g. spotify_hq,tiktok_optimized
        #[arg(short, long, value_delimiter = ',', required = true)]
        profiles: Vec<String>,

        /// Track title
        #[arg(long)]
        title: Option<String>,

        /// Track artist
        #[arg(long)]
        artist: Option<String>,

        /// Album name
        #[arg(long)]
        album: Option<String>,

        /// International Standard Recording Code
        #[arg(long)]
        isrc: Option<String>,

        /// Fade-in length in seconds
        #[arg(long, default_value_t = 0.0)]
        fade_in: f64,

        /// Fade-out length in seconds
        #[arg(long, default_value_t = 0.0)]
        fade_out: f64,

        /// Peak-normalize before the final limiter
        #[arg(long)]
        normalize: bool,

        /// Character of the final safety limiter
        #[arg(long, value_enum, default_value = "balanced")]
        limiter: LimiterArg,

        /// Directory holding project mixes
        #[arg(long)]
        project_dir: Option<PathBuf>,

        /// Directory receiving rendered artifacts
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Number of concurrent jobs
        #[arg(long)]
        max_jobs: Option<usize>,
    },

    /// Print a quality report for a WAV file against a profile
    #[command(name = "analyze")]
    Analyze {
        /// WAV file to analyze
        path: PathBuf,

        /// Profile whose targets the report is measured against
        #[arg(short, long, default_value = "spotify_hq")]
        profile: String,
    },

    /// Write a stereo test tone as a project mix
    #[command(name = "tone")]
    Tone {
        /// Output WAV path
        path: PathBuf,

        /// Frequency in Hz
        #[arg(long, default_value_t = 440.0)]
        frequency: f32,

        /// Linear amplitude (0-1)
        #[arg(long, default_value_t = 0.5)]
        amplitude: f32,

        /// Length in seconds
        #[arg(long, default_value_t = 5.0)]
        seconds: f32,

        /// Sample rate in Hz
        #[arg(long, default_value_t = 48000)]
        sample_rate: u32,
    },
}
