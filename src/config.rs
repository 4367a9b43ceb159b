//! Service configuration
//!
//! Loaded from a JSON file; every field has a default so an empty object
//! is a valid configuration. CLI flags override file values.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ExportError, Result};

/// Worker pool size when none is configured
pub const DEFAULT_MAX_CONCURRENT_JOBS: usize = 3;

/// Job time limit when none is configured (10 minutes)
pub const DEFAULT_MAX_JOB_DURATION_SECS: u64 = 600;

/// Broadcast buffer per event subscriber
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub max_concurrent_jobs: usize,
    pub max_job_duration_secs: u64,
    /// Root directory for rendered artifacts
    pub output_dir: PathBuf,
    /// Directory holding `<project_id>.wav` mixes
    pub project_dir: PathBuf,
    /// Extra profile definitions loaded on top of the built-in catalog
    pub profiles_path: Option<PathBuf>,
    pub event_capacity: usize,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: DEFAULT_MAX_CONCURRENT_JOBS,
            max_job_duration_secs: DEFAULT_MAX_JOB_DURATION_SECS,
            output_dir: PathBuf::from("exports"),
            project_dir: PathBuf::from("projects"),
            profiles_path: None,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl ExportConfig {
    /// Read and validate a JSON configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| ExportError::Config {
            reason: format!("cannot read {}: {}", path.display(), e),
        })?;
        let config: Self = serde_json::from_str(&json).map_err(|e| ExportError::Config {
            reason: format!("invalid config {}: {}", path.display(), e),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_jobs == 0 {
            return Err(ExportError::Config {
                reason: "max_concurrent_jobs must be at least 1".to_string(),
            });
        }
        if self.max_job_duration_secs == 0 {
            return Err(ExportError::Config {
                reason: "max_job_duration_secs must be at least 1".to_string(),
            });
        }
        if self.event_capacity == 0 {
            return Err(ExportError::Config {
                reason: "event_capacity must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    pub fn max_job_duration(&self) -> Duration {
        Duration::from_secs(self.max_job_duration_secs)
    }
}
