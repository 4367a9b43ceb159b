//! Typed commands accepted by the export service

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::job::{FailureInfo, JobId, JobStatus, JobStatusReport};
use crate::error::{ExportError, Result};
use crate::profiles::ExportProfile;
use crate::render::{ExportMetadata, RenderSettings};

/// Request to export one project to several platforms
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StartExportRequest {
    pub project_id: String,
    pub profile_ids: Vec<String>,
    #[serde(default)]
    pub metadata: ExportMetadata,
    #[serde(default)]
    pub settings: RenderSettings,
}

impl StartExportRequest {
    pub fn new(project_id: impl Into<String>, profile_ids: &[&str]) -> Self {
        Self {
            project_id: project_id.into(),
            profile_ids: profile_ids.iter().map(|id| id.to_string()).collect(),
            metadata: ExportMetadata::default(),
            settings: RenderSettings::default(),
        }
    }

    pub fn with_metadata(mut self, metadata: ExportMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_settings(mut self, settings: RenderSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Shape checks that need no registry
    pub fn validate(&self) -> Result<()> {
        if self.project_id.trim().is_empty() {
            return Err(ExportError::InvalidRequest {
                reason: "project_id is empty".to_string(),
            });
        }
        if self.profile_ids.is_empty() {
            return Err(ExportError::InvalidRequest {
                reason: "no export profiles requested".to_string(),
            });
        }
        let mut seen = HashSet::new();
        for id in &self.profile_ids {
            if !seen.insert(id.as_str()) {
                return Err(ExportError::DuplicateProfile {
                    profile_id: id.clone(),
                });
            }
        }
        self.settings.validate()
    }
}

/// Accepted submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitReceipt {
    pub job_id: JobId,
    /// Jobs queued ahead of this one at submission time
    pub queue_position: usize,
}

/// Acknowledgement of a cancel request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancelAck {
    pub job_id: JobId,
    /// Status at the time of the request
    pub status: JobStatus,
    /// True if the job is running and will stop at the next profile boundary
    pub pending: bool,
}

/// Client-facing command set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExportCommand {
    StartExport(StartExportRequest),
    GetExportStatus { job_id: JobId },
    CancelExport { job_id: JobId },
    ListExportProfiles,
}

/// Response to an `ExportCommand`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExportResponse {
    Started(SubmitReceipt),
    Status(JobStatusReport),
    Cancelled(CancelAck),
    Profiles { profiles: Vec<ExportProfile> },
    Error(FailureInfo),
}
