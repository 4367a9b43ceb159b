//! Mixport - Multi-platform Audio Export
//!
//! Takes a finished mix and delivers it to many platforms at once, each
//! with its own loudness, format and metadata requirements.
//!
//! # Architecture
//!
//! Components, leaf first:
//! - `profiles`: data-driven catalog of platform export profiles
//! - `dsp`: the mastering chain (EQ, compression, loudness/limiting, enhancement)
//! - `analysis`: quality metrics and recommendations on rendered audio
//! - `render`: fades, normalization, format conversion and encoding
//! - `export`: job scheduler with a bounded worker pool and event reporting
//!
//! # Example
//! ```no_run
//! use std::sync::Arc;
//! use mixport::export::{
//!     ExportService, ServiceOptions, StartExportRequest, SystemClock, TracingEventSink,
//!     WavProjectStore,
//! };
//! use mixport::profiles::ProfileRegistry;
//! use mixport::render::DirectorySink;
//!
//! # async fn run() -> mixport::Result<()> {
//! let service = ExportService::new(
//!     Arc::new(ProfileRegistry::builtin()?),
//!     Arc::new(WavProjectStore::new("projects")),
//!     Arc::new(DirectorySink::new("exports")),
//!     Arc::new(TracingEventSink),
//!     Arc::new(SystemClock),
//!     ServiceOptions::default(),
//! );
//! let receipt = service
//!     .submit(StartExportRequest::new("song-1", &["spotify_hq", "tiktok_optimized"]))
//!     .await?;
//! let job = service.wait_for(&receipt.job_id).await?;
//! println!("{}: {}", job.id, job.status);
//! # Ok(())
//! # }
//! ```

pub mod analysis;
pub mod cli;
pub mod config;
pub mod dsp;
pub mod engine;
pub mod error;
pub mod export;
pub mod profiles;
pub mod render;

pub use config::ExportConfig;
pub use error::{ExportError, Result};
