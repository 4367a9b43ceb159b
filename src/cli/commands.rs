//! CLI Command Implementations
//!
//! Implements the actual logic for each CLI command.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use log::{info, warn};

use crate::analysis::analyze;
use crate::config::ExportConfig;
use crate::engine::{export_audio, generate_stereo_test_tone, import_audio};
use crate::export::{
    ExportService, JobStatus, ProjectStore, ServiceOptions, StartExportRequest, SystemClock,
    TracingEventSink, WavProjectStore,
};
use crate::profiles::ProfileRegistry;
use crate::render::{DirectorySink, ExportMetadata, RenderSettings};

/// Load the configuration file, or defaults when none is given
pub fn load_config(path: Option<&Path>) -> Result<ExportConfig> {
    match path {
        Some(path) => {
            info!("Loading configuration: {}", path.display());
            ExportConfig::from_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))
        }
        None => Ok(ExportConfig::default()),
    }
}

/// Built-in profiles plus any configured profile file
pub fn load_registry(config: &ExportConfig) -> Result<ProfileRegistry> {
    let mut registry = ProfileRegistry::builtin().context("Built-in profiles are invalid")?;
    if let Some(path) = &config.profiles_path {
        let count = registry
            .from_json_file(path)
            .with_context(|| format!("Failed to load profiles from {}", path.display()))?;
        info!("Loaded {} custom profiles from {}", count, path.display());
    }
    Ok(registry)
}

/// List registered export profiles.
pub fn list_profiles(config: &ExportConfig, json: bool) -> Result<()> {
    let registry = load_registry(config)?;
    let profiles = registry.list();

    if json {
        println!("{}", serde_json::to_string_pretty(&profiles)?);
        return Ok(());
    }

    println!(
        "{:<20} {:<12} {:<6} {:>8} {:>6} {:>9} {:>8}",
        "ID", "PLATFORM", "FORMAT", "RATE", "BITS", "LUFS", "KBPS"
    );
    for profile in &profiles {
        let audio = &profile.audio;
        println!(
            "{:<20} {:<12} {:<6} {:>8} {:>6} {:>9.1} {:>8}",
            profile.id,
            profile.platform,
            audio.format.to_string(),
            audio.sample_rate,
            audio.bit_depth,
            audio.loudness_target_lufs,
            audio
                .bitrate_kbps
                .map(|b| b.to_string())
                .unwrap_or_else(|| "-".to_string()),
        );
    }

    Ok(())
}

/// List projects in the project directory.
pub fn list_projects(project_dir: &Path) -> Result<()> {
    info!("Scanning projects in: {}", project_dir.display());

    let store = WavProjectStore::new(project_dir);
    let projects = store
        .list_projects()
        .with_context(|| format!("Failed to list {}", project_dir.display()))?;

    if projects.is_empty() {
        println!("No projects found in {}", project_dir.display());
    }
    for project in projects {
        println!("{}", project);
    }

    Ok(())
}

/// Options of the export command
#[derive(Debug, Clone)]
pub struct ExportArgs {
    pub project_id: String,
    pub profiles: Vec<String>,
    pub metadata: ExportMetadata,
    pub settings: RenderSettings,
}

/// Run one export job to completion.
pub async fn export(config: &ExportConfig, args: ExportArgs) -> Result<()> {
    info!(
        "Exporting project {} to {}",
        args.project_id,
        args.profiles.join(", ")
    );

    let registry = Arc::new(load_registry(config)?);
    let service = ExportService::new(
        registry,
        Arc::new(WavProjectStore::new(&config.project_dir)),
        Arc::new(DirectorySink::new(&config.output_dir)),
        Arc::new(TracingEventSink),
        Arc::new(SystemClock),
        ServiceOptions::from(config),
    );

    let request = StartExportRequest {
        project_id: args.project_id,
        profile_ids: args.profiles,
        metadata: args.metadata,
        settings: args.settings,
    };
    let receipt = service
        .submit(request)
        .await
        .context("Export request rejected")?;
    let job = service.wait_for(&receipt.job_id).await?;
    service.shutdown().await;

    println!("Job {}: {}", job.id, job.status);
    for output in &job.outputs {
        match (&output.path, &output.quality) {
            (Some(path), Some(quality)) => {
                println!(
                    "  {:<20} {} ({} bytes, {:.2}s) {:.1} LUFS, peak {:.2} dBFS",
                    output.profile_id,
                    path,
                    output.file_size,
                    output.duration_secs,
                    quality.lufs,
                    quality.peak_db
                );
                for advice in &output.recommendations {
                    println!("      - {}", advice);
                }
            }
            _ => {
                let reason = output
                    .error
                    .as_ref()
                    .map(|e| e.message.as_str())
                    .unwrap_or("unknown error");
                warn!("{} failed: {}", output.profile_id, reason);
                println!("  {:<20} FAILED: {}", output.profile_id, reason);
            }
        }
    }

    match job.status {
        JobStatus::Completed => Ok(()),
        status => {
            let reason = job
                .error
                .map(|e| e.message)
                .unwrap_or_else(|| status.to_string());
            bail!("Export job {} did not complete: {}", job.id, reason)
        }
    }
}

/// Print a quality report for a WAV file.
pub fn analyze_file(config: &ExportConfig, path: &Path, profile_id: &str) -> Result<()> {
    info!("Analyzing {} against {}", path.display(), profile_id);

    let registry = load_registry(config)?;
    let profile = registry.get(profile_id)?;
    let buffer =
        import_audio(path).with_context(|| format!("Failed to read {}", path.display()))?;

    let report = analyze(&buffer, &profile);
    let metrics = &report.metrics;
    let balance = &metrics.spectral_balance;

    println!("File:            {}", path.display());
    println!("Profile:         {} ({})", profile.id, profile.platform);
    println!(
        "Loudness:        {:.1} LUFS (target {:.1})",
        metrics.lufs, profile.audio.loudness_target_lufs
    );
    println!("Peak:            {:.2} dBFS", metrics.peak_db);
    println!("Dynamic range:   {:.1} dB", metrics.dynamic_range);
    println!("Stereo width:    {:.2}", metrics.stereo_width);
    println!(
        "Phase:           {:.2} ({})",
        metrics.phase_correlation,
        if metrics.phase_ok { "ok" } else { "check" }
    );
    println!(
        "Spectrum:        bass {:.2}, mid {:.2}, treble {:.2}, presence {:.2}, brilliance {:.2}",
        balance.bass, balance.mid, balance.treble, balance.presence, balance.brilliance
    );
    if report.recommendations.is_empty() {
        println!("No recommendations");
    }
    for advice in &report.recommendations {
        println!("  - {}", advice);
    }

    Ok(())
}

/// Write a stereo sine tone usable as a project mix.
pub fn write_tone(
    path: &Path,
    frequency: f32,
    amplitude: f32,
    seconds: f32,
    sample_rate: u32,
) -> Result<()> {
    if !(0.0..=1.0).contains(&amplitude) {
        bail!("Amplitude must be between 0 and 1");
    }
    info!("Writing {:.1}s test tone to {}", seconds, path.display());

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let tone = generate_stereo_test_tone(frequency, frequency, amplitude, seconds, sample_rate);
    export_audio(&tone, path, 24).with_context(|| format!("Failed to write {}", path.display()))?;

    println!("Wrote {}", path.display());
    Ok(())
}
