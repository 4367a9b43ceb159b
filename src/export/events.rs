//! Job event reporting
//!
//! Every event for a job is emitted by the task that owns the job, so
//! events of one job reach listeners in emission order. Delivery is
//! at-least-once from the listener's point of view: consumers must treat a
//! repeated progress value as a no-op.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use super::job::{ExportOutput, JobId};

/// Notification about a job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ExportEvent {
    Progress {
        job_id: JobId,
        percent: f32,
        note: String,
    },
    Completed {
        job_id: JobId,
        outputs: Vec<ExportOutput>,
    },
    Failed {
        job_id: JobId,
        reason: String,
        code: String,
    },
    Cancelled {
        job_id: JobId,
    },
}

impl ExportEvent {
    pub fn job_id(&self) -> &str {
        match self {
            ExportEvent::Progress { job_id, .. }
            | ExportEvent::Completed { job_id, .. }
            | ExportEvent::Failed { job_id, .. }
            | ExportEvent::Cancelled { job_id } => job_id,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ExportEvent::Progress { .. })
    }
}

/// Transport-facing listener for job events
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &ExportEvent);
}

/// Fans events out to any number of tokio broadcast receivers
#[derive(Debug, Clone)]
pub struct BroadcastEventSink {
    tx: broadcast::Sender<ExportEvent>,
}

impl BroadcastEventSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ExportEvent> {
        self.tx.subscribe()
    }
}

impl EventSink for BroadcastEventSink {
    fn emit(&self, event: &ExportEvent) {
        if self.tx.send(event.clone()).is_err() {
            let job_id = event.job_id();
            tracing::trace!(job_id, "Event dropped, no subscribers");
        }
    }
}

/// Records every event, for tests and batch runs
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: Mutex<Vec<ExportEvent>>,
}

impl CollectingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ExportEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn events_for(&self, job_id: &str) -> Vec<ExportEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.job_id() == job_id)
            .collect()
    }
}

impl EventSink for CollectingEventSink {
    fn emit(&self, event: &ExportEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

/// Writes events to the tracing log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: &ExportEvent) {
        match event {
            ExportEvent::Progress {
                job_id,
                percent,
                note,
            } => tracing::info!(%job_id, percent, %note, "Export progress"),
            ExportEvent::Completed { job_id, outputs } => {
                tracing::info!(%job_id, outputs = outputs.len(), "Export completed")
            }
            ExportEvent::Failed {
                job_id,
                reason,
                code,
            } => tracing::warn!(%job_id, %code, %reason, "Export failed"),
            ExportEvent::Cancelled { job_id } => tracing::info!(%job_id, "Export cancelled"),
        }
    }
}

/// Delivers events to the service's broadcast channel and an injected sink
pub(crate) struct EventReporter {
    broadcast: BroadcastEventSink,
    sink: Arc<dyn EventSink>,
}

impl EventReporter {
    pub(crate) fn new(capacity: usize, sink: Arc<dyn EventSink>) -> Self {
        Self {
            broadcast: BroadcastEventSink::new(capacity),
            sink,
        }
    }

    pub(crate) fn emit(&self, event: ExportEvent) {
        self.sink.emit(&event);
        self.broadcast.emit(&event);
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<ExportEvent> {
        self.broadcast.subscribe()
    }
}
