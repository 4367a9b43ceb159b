//! Mixport CLI - Multi-platform Audio Export
//!
//! Command-line interface for the Mixport export pipeline.

use anyhow::Result;
use clap::Parser;
use log::info;
use tracing_subscriber::EnvFilter;

use mixport::cli::commands::{self, ExportArgs};
use mixport::cli::{Cli, Commands};
use mixport::render::{ExportMetadata, RenderSettings};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    info!("Mixport v{}", env!("CARGO_PKG_VERSION"));

    let mut config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Some(cmd) => handle_command(cmd, &mut config).await,
        None => {
            println!("Mixport v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for available commands");
            Ok(())
        }
    }
}

async fn handle_command(cmd: Commands, config: &mut mixport::ExportConfig) -> Result<()> {
    match cmd {
        Commands::Profiles { json } => commands::list_profiles(config, json),
        Commands::Projects { project_dir } => {
            let dir = project_dir.unwrap_or_else(|| config.project_dir.clone());
            commands::list_projects(&dir)
        }
        Commands::Export {
            project_id,
            profiles,
            title,
            artist,
            album,
            isrc,
            fade_in,
            fade_out,
            normalize,
            limiter,
            project_dir,
            output_dir,
            max_jobs,
        } => {
            if let Some(dir) = project_dir {
                config.project_dir = dir;
            }
            if let Some(dir) = output_dir {
                config.output_dir = dir;
            }
            if let Some(jobs) = max_jobs {
                config.max_concurrent_jobs = jobs;
            }
            config.validate()?;

            let args = ExportArgs {
                project_id,
                profiles,
                metadata: ExportMetadata {
                    title,
                    artist,
                    album,
                    isrc,
                    ..Default::default()
                },
                settings: RenderSettings {
                    fade_in_secs: fade_in,
                    fade_out_secs: fade_out,
                    normalize,
                    limiter_style: limiter.into(),
                },
            };
            commands::export(config, args).await
        }
        Commands::Analyze { path, profile } => commands::analyze_file(config, &path, &profile),
        Commands::Tone {
            path,
            frequency,
            amplitude,
            seconds,
            sample_rate,
        } => commands::write_tone(&path, frequency, amplitude, seconds, sample_rate),
    }
}
