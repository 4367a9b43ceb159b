//! Export job pipeline
//!
//! `ExportService` accepts export requests, schedules them on a bounded
//! worker pool and drives each job through mastering, rendering and
//! quality analysis, reporting progress through `EventSink`s.

mod clock;
mod command;
mod events;
mod job;
mod service;
mod store;

pub use clock::{Clock, FixedClock, SystemClock};
pub use command::{CancelAck, ExportCommand, ExportResponse, StartExportRequest, SubmitReceipt};
pub use events::{BroadcastEventSink, CollectingEventSink, EventSink, ExportEvent, TracingEventSink};
pub use job::{ExportJob, ExportOutput, FailureInfo, JobId, JobStatus, JobStatusReport};
pub use service::{ExportService, SchedulerStats, ServiceOptions};
pub use store::{MemoryProjectStore, ProjectStore, WavProjectStore};
