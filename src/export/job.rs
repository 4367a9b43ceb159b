//! Export job and output records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analysis::{QualityMetrics, QualityReport};
use crate::error::ExportError;
use crate::profiles::{AudioFormat, ExportProfile};
use crate::render::{ExportMetadata, RenderSettings, RenderedArtifact};

/// Job identifier (UUID v4, hyphenated)
pub type JobId = String;

/// Lifecycle state of an export job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    Mastering,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    /// Picked up by a worker and not yet finished
    pub fn is_active(&self) -> bool {
        matches!(self, JobStatus::Processing | JobStatus::Mastering)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Mastering => "mastering",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Stable code and message of a failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureInfo {
    pub code: String,
    pub message: String,
}

impl From<&ExportError> for FailureInfo {
    fn from(err: &ExportError) -> Self {
        Self {
            code: err.error_code().to_string(),
            message: err.to_string(),
        }
    }
}

/// Result of one profile within a job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportOutput {
    pub profile_id: String,
    pub platform: String,
    pub format: AudioFormat,
    pub sample_rate: u32,
    pub bit_depth: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bitrate_kbps: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub file_size: u64,
    pub duration_secs: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<QualityMetrics>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<FailureInfo>,
}

impl ExportOutput {
    /// Output for a profile that rendered and was scored
    pub fn succeeded(artifact: RenderedArtifact, report: QualityReport) -> Self {
        Self {
            profile_id: artifact.profile_id,
            platform: artifact.platform,
            format: artifact.format,
            sample_rate: artifact.sample_rate,
            bit_depth: artifact.bit_depth,
            bitrate_kbps: artifact.bitrate_kbps,
            path: Some(artifact.path),
            file_size: artifact.file_size,
            duration_secs: artifact.duration_secs,
            checksum: Some(artifact.checksum),
            quality: Some(report.metrics),
            recommendations: report.recommendations,
            success: true,
            error: None,
        }
    }

    /// Output recording why a profile failed
    pub fn failed(profile: &ExportProfile, err: &ExportError) -> Self {
        Self {
            profile_id: profile.id.clone(),
            platform: profile.platform.clone(),
            format: profile.audio.format,
            sample_rate: profile.audio.sample_rate,
            bit_depth: profile.audio.bit_depth,
            bitrate_kbps: profile.audio.bitrate_kbps,
            path: None,
            file_size: 0,
            duration_secs: 0.0,
            checksum: None,
            quality: None,
            recommendations: Vec::new(),
            success: false,
            error: Some(FailureInfo::from(err)),
        }
    }
}

/// One export request and its progress
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportJob {
    pub id: JobId,
    pub project_id: String,
    pub profile_ids: Vec<String>,
    pub status: JobStatus,
    /// Percent complete, 0-100, never decreases
    pub progress: f32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub outputs: Vec<ExportOutput>,
    pub metadata: ExportMetadata,
    pub settings: RenderSettings,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<FailureInfo>,
}

impl ExportJob {
    pub fn new(
        id: JobId,
        project_id: String,
        profile_ids: Vec<String>,
        metadata: ExportMetadata,
        settings: RenderSettings,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            project_id,
            profile_ids,
            status: JobStatus::Queued,
            progress: 0.0,
            created_at,
            started_at: None,
            finished_at: None,
            outputs: Vec::new(),
            metadata,
            settings,
            error: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Move to a new status; terminal jobs never change
    pub fn transition(&mut self, status: JobStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.status = status;
        true
    }

    /// Raise progress to `percent`; returns false if it would not increase
    pub fn advance_progress(&mut self, percent: f32) -> bool {
        let percent = percent.clamp(0.0, 100.0);
        if self.is_terminal() || percent <= self.progress {
            return false;
        }
        self.progress = percent;
        true
    }

    /// Outputs of profiles that rendered successfully
    pub fn successful_outputs(&self) -> Vec<ExportOutput> {
        self.outputs.iter().filter(|o| o.success).cloned().collect()
    }

    pub fn failed_outputs(&self) -> impl Iterator<Item = &ExportOutput> {
        self.outputs.iter().filter(|o| !o.success)
    }
}

/// Answer to a status query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatusReport {
    pub job_id: JobId,
    pub status: JobStatus,
    pub progress: f32,
    pub outputs: Vec<ExportOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<FailureInfo>,
}

impl From<&ExportJob> for JobStatusReport {
    fn from(job: &ExportJob) -> Self {
        Self {
            job_id: job.id.clone(),
            status: job.status,
            progress: job.progress,
            outputs: job.outputs.clone(),
            error: job.error.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> ExportJob {
        ExportJob::new(
            "job-1".to_string(),
            "project-1".to_string(),
            vec!["spotify_hq".to_string()],
            ExportMetadata::default(),
            RenderSettings::default(),
            Utc::now(),
        )
    }

    #[test]
    fn test_progress_is_monotonic() {
        let mut job = job();
        assert!(job.advance_progress(40.0));
        assert!(!job.advance_progress(20.0));
        assert!(!job.advance_progress(40.0));
        assert_eq!(job.progress, 40.0);
        assert!(job.advance_progress(150.0));
        assert_eq!(job.progress, 100.0);
    }

    #[test]
    fn test_terminal_status_is_final() {
        let mut job = job();
        assert!(job.transition(JobStatus::Processing));
        assert!(job.transition(JobStatus::Cancelled));
        assert!(!job.transition(JobStatus::Completed));
        assert_eq!(job.status, JobStatus::Cancelled);
        assert!(!job.advance_progress(90.0));
    }

    #[test]
    fn test_status_serde_names() {
        assert_eq!(
            serde_json::to_string(&JobStatus::Mastering).unwrap(),
            "\"mastering\""
        );
    }
}
