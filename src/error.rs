//! Error handling for Mixport
//!
//! Every error knows its stable code and the scope it is allowed to affect:
//! submission errors reject a request before a job exists, job errors fail the
//! whole job, profile errors are recorded on a single output.

use thiserror::Error;

/// Result type alias for Mixport operations
pub type Result<T> = std::result::Result<T, ExportError>;

/// How far an error is allowed to propagate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorScope {
    /// Rejected at the boundary, no job is created
    Submission,
    /// Aborts the whole job
    Job,
    /// Isolated to one profile's output
    Profile,
}

/// Main error type for Mixport operations
#[derive(Error, Debug)]
pub enum ExportError {
    // Submission Errors
    #[error("Unknown export profile: {profile_id}")]
    UnknownProfile { profile_id: String },

    #[error("Profile listed more than once: {profile_id}")]
    DuplicateProfile { profile_id: String },

    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    #[error("Job not found: {job_id}")]
    JobNotFound { job_id: String },

    // Job Errors
    #[error("Failed to load project '{project_id}': {reason}")]
    ProjectLoadError { project_id: String, reason: String },

    #[error("Job exceeded maximum duration of {limit_secs}s")]
    Timeout { limit_secs: u64 },

    #[error("Job was cancelled")]
    Cancelled,

    // Profile Errors
    #[error("DSP processing failed in {stage}: {reason}")]
    DspProcessingError { stage: String, reason: String },

    #[error("Render failed for profile {profile_id}: {reason}")]
    RenderError { profile_id: String, reason: String },

    #[error("Failed to encode {format}: {reason}")]
    EncodingError { format: String, reason: String },

    // Audio Errors
    #[error("Invalid audio: {reason}")]
    InvalidAudio {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Unsupported audio format: {format}")]
    UnsupportedFormat { format: String },

    // Configuration Errors
    #[error("Invalid profile {profile_id}: {reason}")]
    InvalidProfile { profile_id: String, reason: String },

    #[error("Configuration error: {reason}")]
    Config { reason: String },

    // I/O Errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ExportError {
    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            ExportError::UnknownProfile { .. } => "UNKNOWN_PROFILE",
            ExportError::DuplicateProfile { .. } => "DUPLICATE_PROFILE",
            ExportError::InvalidRequest { .. } => "INVALID_REQUEST",
            ExportError::JobNotFound { .. } => "JOB_NOT_FOUND",
            ExportError::ProjectLoadError { .. } => "PROJECT_LOAD_ERROR",
            ExportError::Timeout { .. } => "TIMEOUT",
            ExportError::Cancelled => "CANCELLED",
            ExportError::DspProcessingError { .. } => "DSP_PROCESSING_ERROR",
            ExportError::RenderError { .. } => "RENDER_ERROR",
            ExportError::EncodingError { .. } => "ENCODING_ERROR",
            ExportError::InvalidAudio { .. } => "INVALID_AUDIO",
            ExportError::UnsupportedFormat { .. } => "UNSUPPORTED_FORMAT",
            ExportError::InvalidProfile { .. } => "INVALID_PROFILE",
            ExportError::Config { .. } => "CONFIG_ERROR",
            ExportError::Io(_) => "IO_ERROR",
            ExportError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Scope this error is allowed to affect once a job is running
    pub fn scope(&self) -> ErrorScope {
        match self {
            ExportError::UnknownProfile { .. }
            | ExportError::DuplicateProfile { .. }
            | ExportError::InvalidRequest { .. }
            | ExportError::JobNotFound { .. }
            | ExportError::InvalidProfile { .. }
            | ExportError::Config { .. } => ErrorScope::Submission,
            ExportError::ProjectLoadError { .. }
            | ExportError::Timeout { .. }
            | ExportError::Cancelled => ErrorScope::Job,
            ExportError::DspProcessingError { .. }
            | ExportError::RenderError { .. }
            | ExportError::EncodingError { .. }
            | ExportError::InvalidAudio { .. }
            | ExportError::UnsupportedFormat { .. }
            | ExportError::Io(_)
            | ExportError::Serialization(_) => ErrorScope::Profile,
        }
    }

    /// Cancellation is terminal but not reported to callers as a failure
    pub fn is_failure(&self) -> bool {
        !matches!(self, ExportError::Cancelled)
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            ExportError::UnknownProfile { .. } => vec![
                "Run 'mixport-cli profiles' to list registered profiles",
                "Check the profile id spelling (ids are snake_case)",
            ],
            ExportError::ProjectLoadError { .. } => vec![
                "Check the project id is correct",
                "Verify the project audio exists in the project store",
            ],
            ExportError::DspProcessingError { .. } => vec![
                "The source mix may contain invalid samples (NaN/Inf)",
                "Try re-exporting the mix from the source session",
            ],
            ExportError::RenderError { .. } => vec![
                "Check the required metadata fields for the profile",
                "Verify the output directory is writable",
            ],
            ExportError::Timeout { .. } => vec![
                "Raise max_job_duration_secs in the configuration",
                "Split the export into fewer profiles per job",
            ],
            ExportError::EncodingError { .. } => vec![
                "Check the profile's sample rate and bitrate are valid for the codec",
            ],
            ExportError::UnsupportedFormat { .. } => vec![
                "Supported source format: WAV (mono or stereo)",
                "Supported bit depths: 16, 24, 32",
                "AAC output needs ffmpeg on the PATH",
            ],
            _ => vec![],
        }
    }
}
