//! Export job scheduler
//!
//! Submitted jobs go into a FIFO queue drained by a fixed pool of worker
//! tasks. A worker owns its job from pickup to terminal state and runs the
//! job's profiles one after another; the CPU-heavy steps (project load,
//! mastering, rendering, analysis) run on the blocking pool so submission
//! and status calls are never held up by DSP work.
//!
//! Status flow per job:
//! `Queued -> Processing -> (Mastering <-> Processing per profile) -> Completed | Failed`,
//! with `Cancelled` reachable from any non-terminal state.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, Mutex, RwLock};
use tokio::task::{JoinError, JoinHandle};
use uuid::Uuid;

use super::clock::Clock;
use super::command::{CancelAck, ExportCommand, ExportResponse, StartExportRequest, SubmitReceipt};
use super::events::{EventReporter, EventSink, ExportEvent};
use super::job::{ExportJob, ExportOutput, FailureInfo, JobId, JobStatus, JobStatusReport};
use super::store::ProjectStore;
use crate::analysis::analyze;
use crate::config::{
    ExportConfig, DEFAULT_EVENT_CAPACITY, DEFAULT_MAX_CONCURRENT_JOBS,
    DEFAULT_MAX_JOB_DURATION_SECS,
};
use crate::dsp;
use crate::engine::AudioBuffer;
use crate::error::{ErrorScope, ExportError, Result};
use crate::profiles::{ExportProfile, ProfileRegistry};
use crate::render::{render, ArtifactSink, ExportMetadata, RenderSettings};

/// Share of a profile's progress slice reached after mastering
const MASTERED_SHARE: f32 = 0.4;

/// Share of a profile's progress slice reached after rendering
const RENDERED_SHARE: f32 = 0.8;

/// Scheduler limits
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceOptions {
    pub max_concurrent_jobs: usize,
    pub max_job_duration: Duration,
    pub event_capacity: usize,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: DEFAULT_MAX_CONCURRENT_JOBS,
            max_job_duration: Duration::from_secs(DEFAULT_MAX_JOB_DURATION_SECS),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl From<&ExportConfig> for ServiceOptions {
    fn from(config: &ExportConfig) -> Self {
        Self {
            max_concurrent_jobs: config.max_concurrent_jobs,
            max_job_duration: config.max_job_duration(),
            event_capacity: config.event_capacity,
        }
    }
}

/// Snapshot of scheduler load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SchedulerStats {
    pub queued: usize,
    pub active: usize,
    /// Highest number of jobs ever running at once
    pub peak_active: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
}

struct JobEntry {
    job: ExportJob,
    cancel: Arc<AtomicBool>,
}

/// What a worker needs from a job it picked up
struct Claim {
    job_id: JobId,
    project_id: String,
    profile_ids: Vec<String>,
    metadata: ExportMetadata,
    settings: RenderSettings,
    cancel: Arc<AtomicBool>,
}

impl Claim {
    fn cancel_requested(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }
}

struct Shared {
    registry: Arc<ProfileRegistry>,
    store: Arc<dyn ProjectStore>,
    sink: Arc<dyn ArtifactSink>,
    clock: Arc<dyn Clock>,
    reporter: EventReporter,
    options: ServiceOptions,
    jobs: RwLock<HashMap<JobId, JobEntry>>,
    active: AtomicUsize,
    peak_active: AtomicUsize,
}

/// Bounded-concurrency export scheduler
///
/// Must be created inside a tokio runtime; worker tasks are spawned by
/// `new`.
pub struct ExportService {
    shared: Arc<Shared>,
    queue: Mutex<Option<mpsc::UnboundedSender<JobId>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl ExportService {
    pub fn new(
        registry: Arc<ProfileRegistry>,
        store: Arc<dyn ProjectStore>,
        sink: Arc<dyn ArtifactSink>,
        events: Arc<dyn EventSink>,
        clock: Arc<dyn Clock>,
        options: ServiceOptions,
    ) -> Self {
        let worker_count = options.max_concurrent_jobs.max(1);
        let shared = Arc::new(Shared {
            registry,
            store,
            sink,
            clock,
            reporter: EventReporter::new(options.event_capacity, events),
            options,
            jobs: RwLock::new(HashMap::new()),
            active: AtomicUsize::new(0),
            peak_active: AtomicUsize::new(0),
        });

        let (tx, rx) = mpsc::unbounded_channel();
        let rx = Arc::new(Mutex::new(rx));
        let workers = (0..worker_count)
            .map(|worker| tokio::spawn(worker_loop(Arc::clone(&shared), Arc::clone(&rx), worker)))
            .collect();

        tracing::info!(workers = worker_count, "Export service started");

        Self {
            shared,
            queue: Mutex::new(Some(tx)),
            workers: Mutex::new(workers),
        }
    }

    /// Validate and enqueue an export request
    ///
    /// Nothing is created if any profile id is unknown or repeated.
    pub async fn submit(&self, request: StartExportRequest) -> Result<SubmitReceipt> {
        request.validate()?;
        for profile_id in &request.profile_ids {
            self.shared.registry.get(profile_id)?;
        }

        let queue = self.queue.lock().await;
        let tx = queue.as_ref().ok_or_else(|| ExportError::InvalidRequest {
            reason: "export service is shut down".to_string(),
        })?;

        let job_id = Uuid::new_v4().to_string();
        let job = ExportJob::new(
            job_id.clone(),
            request.project_id,
            request.profile_ids,
            request.metadata,
            request.settings,
            self.shared.clock.now(),
        );

        let queue_position = {
            let mut jobs = self.shared.jobs.write().await;
            let ahead = jobs
                .values()
                .filter(|entry| entry.job.status == JobStatus::Queued)
                .count();
            tracing::info!(
                job_id = %job_id,
                project_id = %job.project_id,
                profiles = ?job.profile_ids,
                queue_position = ahead,
                "Export job queued"
            );
            jobs.insert(
                job_id.clone(),
                JobEntry {
                    job,
                    cancel: Arc::new(AtomicBool::new(false)),
                },
            );
            ahead
        };

        if tx.send(job_id.clone()).is_err() {
            self.shared.jobs.write().await.remove(&job_id);
            return Err(ExportError::InvalidRequest {
                reason: "export queue is closed".to_string(),
            });
        }

        Ok(SubmitReceipt {
            job_id,
            queue_position,
        })
    }

    /// Request cancellation of a job
    ///
    /// Queued jobs are cancelled at once. Running jobs stop before their
    /// next mastering stage or render step. Terminal jobs are acknowledged
    /// unchanged.
    pub async fn cancel(&self, job_id: &str) -> Result<CancelAck> {
        let (ack, event) = {
            let mut jobs = self.shared.jobs.write().await;
            let entry = jobs.get_mut(job_id).ok_or_else(|| ExportError::JobNotFound {
                job_id: job_id.to_string(),
            })?;

            match entry.job.status {
                JobStatus::Queued => {
                    entry.cancel.store(true, Ordering::SeqCst);
                    entry.job.transition(JobStatus::Cancelled);
                    entry.job.finished_at = Some(self.shared.clock.now());
                    (
                        CancelAck {
                            job_id: job_id.to_string(),
                            status: JobStatus::Cancelled,
                            pending: false,
                        },
                        Some(ExportEvent::Cancelled {
                            job_id: job_id.to_string(),
                        }),
                    )
                }
                status if status.is_active() => {
                    entry.cancel.store(true, Ordering::SeqCst);
                    (
                        CancelAck {
                            job_id: job_id.to_string(),
                            status,
                            pending: true,
                        },
                        None,
                    )
                }
                status => (
                    CancelAck {
                        job_id: job_id.to_string(),
                        status,
                        pending: false,
                    },
                    None,
                ),
            }
        };

        tracing::info!(job_id, status = %ack.status, pending = ack.pending, "Cancel requested");
        if let Some(event) = event {
            self.shared.reporter.emit(event);
        }
        Ok(ack)
    }

    /// Status, progress and outputs of a job
    pub async fn status(&self, job_id: &str) -> Result<JobStatusReport> {
        let jobs = self.shared.jobs.read().await;
        jobs.get(job_id)
            .map(|entry| JobStatusReport::from(&entry.job))
            .ok_or_else(|| ExportError::JobNotFound {
                job_id: job_id.to_string(),
            })
    }

    /// Full record of a job
    pub async fn job(&self, job_id: &str) -> Result<ExportJob> {
        let jobs = self.shared.jobs.read().await;
        jobs.get(job_id)
            .map(|entry| entry.job.clone())
            .ok_or_else(|| ExportError::JobNotFound {
                job_id: job_id.to_string(),
            })
    }

    /// Every known job, oldest first
    pub async fn jobs(&self) -> Vec<ExportJob> {
        let jobs = self.shared.jobs.read().await;
        let mut all: Vec<ExportJob> = jobs.values().map(|entry| entry.job.clone()).collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        all
    }

    /// Wait until a job reaches a terminal state
    pub async fn wait_for(&self, job_id: &str) -> Result<ExportJob> {
        let mut events = self.shared.reporter.subscribe();
        loop {
            let job = self.job(job_id).await?;
            if job.is_terminal() {
                return Ok(job);
            }
            match events.recv().await {
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return self.job(job_id).await,
            }
        }
    }

    pub fn list_profiles(&self) -> Vec<ExportProfile> {
        self.shared.registry.list()
    }

    /// Receive every event emitted after this call
    pub fn subscribe(&self) -> broadcast::Receiver<ExportEvent> {
        self.shared.reporter.subscribe()
    }

    pub async fn stats(&self) -> SchedulerStats {
        let jobs = self.shared.jobs.read().await;
        let count = |status: JobStatus| jobs.values().filter(|e| e.job.status == status).count();
        SchedulerStats {
            queued: count(JobStatus::Queued),
            active: self.shared.active.load(Ordering::SeqCst),
            peak_active: self.shared.peak_active.load(Ordering::SeqCst),
            completed: count(JobStatus::Completed),
            failed: count(JobStatus::Failed),
            cancelled: count(JobStatus::Cancelled),
        }
    }

    /// Answer a client command
    pub async fn handle(&self, command: ExportCommand) -> ExportResponse {
        let result = match command {
            ExportCommand::StartExport(request) => {
                self.submit(request).await.map(ExportResponse::Started)
            }
            ExportCommand::GetExportStatus { job_id } => {
                self.status(&job_id).await.map(ExportResponse::Status)
            }
            ExportCommand::CancelExport { job_id } => {
                self.cancel(&job_id).await.map(ExportResponse::Cancelled)
            }
            ExportCommand::ListExportProfiles => Ok(ExportResponse::Profiles {
                profiles: self.list_profiles(),
            }),
        };
        result.unwrap_or_else(|e| ExportResponse::Error(FailureInfo::from(&e)))
    }

    /// Stop accepting jobs, cancel queued ones and wait for running jobs
    pub async fn shutdown(&self) {
        self.queue.lock().await.take();

        let queued: Vec<JobId> = {
            let jobs = self.shared.jobs.read().await;
            jobs.values()
                .filter(|entry| entry.job.status == JobStatus::Queued)
                .map(|entry| entry.job.id.clone())
                .collect()
        };
        for job_id in queued {
            if let Err(e) = self.cancel(&job_id).await {
                tracing::warn!(job_id = %job_id, error = %e, "Failed to cancel queued job");
            }
        }

        let workers = std::mem::take(&mut *self.workers.lock().await);
        for worker in workers {
            if let Err(e) = worker.await {
                tracing::error!(error = %e, "Export worker terminated abnormally");
            }
        }
        tracing::info!("Export service stopped");
    }
}

async fn worker_loop(
    shared: Arc<Shared>,
    queue: Arc<Mutex<mpsc::UnboundedReceiver<JobId>>>,
    worker: usize,
) {
    loop {
        let next = queue.lock().await.recv().await;
        let Some(job_id) = next else {
            break;
        };
        tracing::debug!(worker, job_id = %job_id, "Worker picked up job");
        shared.run_job(job_id).await;
    }
    tracing::debug!(worker, "Worker exiting");
}

fn join_failure(stage: &str, err: JoinError) -> ExportError {
    ExportError::DspProcessingError {
        stage: stage.to_string(),
        reason: format!("worker task failed: {}", err),
    }
}

impl Shared {
    async fn run_job(&self, job_id: JobId) {
        let Some(claim) = self.claim(&job_id).await else {
            return;
        };

        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_active.fetch_max(active, Ordering::SeqCst);
        tracing::info!(
            job_id = %claim.job_id,
            project_id = %claim.project_id,
            profiles = claim.profile_ids.len(),
            "Export job started"
        );

        let limit = self.options.max_job_duration;
        let outcome = match tokio::time::timeout(limit, self.process(&claim)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                claim.cancel.store(true, Ordering::SeqCst);
                Err(ExportError::Timeout {
                    limit_secs: limit.as_secs(),
                })
            }
        };

        self.finish(&claim, outcome).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
    }

    /// Take ownership of a queued job; skips jobs cancelled while queued
    async fn claim(&self, job_id: &str) -> Option<Claim> {
        let mut jobs = self.jobs.write().await;
        let entry = jobs.get_mut(job_id)?;
        if entry.job.status != JobStatus::Queued {
            tracing::debug!(job_id, status = %entry.job.status, "Skipping dequeued job");
            return None;
        }

        entry.job.transition(JobStatus::Processing);
        entry.job.started_at = Some(self.clock.now());
        Some(Claim {
            job_id: entry.job.id.clone(),
            project_id: entry.job.project_id.clone(),
            profile_ids: entry.job.profile_ids.clone(),
            metadata: entry.job.metadata.clone(),
            settings: entry.job.settings.clone(),
            cancel: Arc::clone(&entry.cancel),
        })
    }

    async fn process(&self, claim: &Claim) -> Result<()> {
        let store = Arc::clone(&self.store);
        let project_id = claim.project_id.clone();
        let source = tokio::task::spawn_blocking(move || store.load_audio(&project_id))
            .await
            .map_err(|e| ExportError::ProjectLoadError {
                project_id: claim.project_id.clone(),
                reason: e.to_string(),
            })??;
        let source = Arc::new(source);

        let total = claim.profile_ids.len() as f32;
        let share = 100.0 / total;

        for (index, profile_id) in claim.profile_ids.iter().enumerate() {
            if claim.cancel_requested() {
                return Err(ExportError::Cancelled);
            }

            let base = index as f32 * share;
            let profile = self.registry.get(profile_id)?;
            let output = match self
                .export_profile(claim, Arc::clone(&profile), &source, base, share)
                .await
            {
                Ok(output) => output,
                Err(e) if e.scope() == ErrorScope::Profile => {
                    tracing::warn!(
                        job_id = %claim.job_id,
                        profile_id = %profile_id,
                        code = e.error_code(),
                        error = %e,
                        "Profile export failed"
                    );
                    ExportOutput::failed(&profile, &e)
                }
                Err(e) => return Err(e),
            };

            let note = if output.success {
                format!("exported {}", profile_id)
            } else {
                format!("failed {}", profile_id)
            };
            self.record_output(&claim.job_id, output, base + share, note)
                .await;
        }

        Ok(())
    }

    /// Master, render and score one profile
    async fn export_profile(
        &self,
        claim: &Claim,
        profile: Arc<ExportProfile>,
        source: &Arc<AudioBuffer>,
        base: f32,
        share: f32,
    ) -> Result<ExportOutput> {
        self.update(
            &claim.job_id,
            Some(JobStatus::Mastering),
            base,
            format!("mastering {}", profile.id),
        )
        .await;

        let mastered = {
            let source = Arc::clone(source);
            let profile = Arc::clone(&profile);
            let cancel = Arc::clone(&claim.cancel);
            tokio::task::spawn_blocking(move || dsp::process_until(&source, &profile, &cancel))
                .await
                .map_err(|e| join_failure("mastering", e))??
        };

        self.update(
            &claim.job_id,
            Some(JobStatus::Processing),
            base + share * MASTERED_SHARE,
            format!("rendering {}", profile.id),
        )
        .await;

        let artifact = {
            let profile = Arc::clone(&profile);
            let sink = Arc::clone(&self.sink);
            let metadata = claim.metadata.clone();
            let settings = claim.settings.clone();
            let stem = format!("{}/{}", claim.job_id, profile.id);
            let cancel = Arc::clone(&claim.cancel);
            tokio::task::spawn_blocking(move || {
                if cancel.load(Ordering::SeqCst) {
                    return Err(ExportError::Cancelled);
                }
                render(&mastered, &profile, &metadata, &settings, sink.as_ref(), &stem)
            })
            .await
            .map_err(|e| join_failure("render", e))??
        };

        self.update(
            &claim.job_id,
            None,
            base + share * RENDERED_SHARE,
            format!("analyzing {}", profile.id),
        )
        .await;

        let cancel = Arc::clone(&claim.cancel);
        let (artifact, report) = tokio::task::spawn_blocking(move || {
            if cancel.load(Ordering::SeqCst) {
                return Err(ExportError::Cancelled);
            }
            let report = analyze(&artifact.audio, &profile);
            Ok((artifact, report))
        })
        .await
        .map_err(|e| join_failure("analysis", e))??;

        Ok(ExportOutput::succeeded(artifact, report))
    }

    /// Apply a status change and progress value, emitting progress if it rose
    async fn update(&self, job_id: &str, status: Option<JobStatus>, percent: f32, note: String) {
        let event = {
            let mut jobs = self.jobs.write().await;
            let Some(entry) = jobs.get_mut(job_id) else {
                return;
            };
            if let Some(status) = status {
                entry.job.transition(status);
            }
            entry
                .job
                .advance_progress(percent)
                .then(|| ExportEvent::Progress {
                    job_id: job_id.to_string(),
                    percent: entry.job.progress,
                    note,
                })
        };

        if let Some(event) = event {
            self.reporter.emit(event);
        }
    }

    async fn record_output(&self, job_id: &str, output: ExportOutput, percent: f32, note: String) {
        let event = {
            let mut jobs = self.jobs.write().await;
            let Some(entry) = jobs.get_mut(job_id) else {
                return;
            };
            if entry.job.is_terminal() {
                return;
            }
            entry.job.outputs.push(output);
            entry
                .job
                .advance_progress(percent)
                .then(|| ExportEvent::Progress {
                    job_id: job_id.to_string(),
                    percent: entry.job.progress,
                    note,
                })
        };

        if let Some(event) = event {
            self.reporter.emit(event);
        }
    }

    /// Move the job to its terminal state and report it
    async fn finish(&self, claim: &Claim, outcome: Result<()>) {
        let event = {
            let mut jobs = self.jobs.write().await;
            let Some(entry) = jobs.get_mut(&claim.job_id) else {
                return;
            };
            let job = &mut entry.job;
            let job_id = job.id.clone();

            let (status, event) = match outcome {
                Err(e) if !e.is_failure() => {
                    (JobStatus::Cancelled, ExportEvent::Cancelled { job_id })
                }
                Err(e) => {
                    let failure = FailureInfo::from(&e);
                    job.error = Some(failure.clone());
                    (
                        JobStatus::Failed,
                        ExportEvent::Failed {
                            job_id,
                            reason: failure.message,
                            code: failure.code,
                        },
                    )
                }
                Ok(()) if claim.cancel_requested() => {
                    (JobStatus::Cancelled, ExportEvent::Cancelled { job_id })
                }
                Ok(()) if job.outputs.iter().any(|o| o.success) => {
                    let outputs = job.successful_outputs();
                    (JobStatus::Completed, ExportEvent::Completed { job_id, outputs })
                }
                Ok(()) => {
                    let code = job
                        .failed_outputs()
                        .find_map(|o| o.error.as_ref().map(|e| e.code.clone()))
                        .unwrap_or_else(|| "RENDER_ERROR".to_string());
                    let failure = FailureInfo {
                        code,
                        message: "no profile exported successfully".to_string(),
                    };
                    job.error = Some(failure.clone());
                    (
                        JobStatus::Failed,
                        ExportEvent::Failed {
                            job_id,
                            reason: failure.message,
                            code: failure.code,
                        },
                    )
                }
            };

            job.transition(status);
            job.finished_at = Some(self.clock.now());

            match status {
                JobStatus::Failed => tracing::warn!(
                    job_id = %job.id,
                    error = ?job.error,
                    "Export job failed"
                ),
                _ => tracing::info!(
                    job_id = %job.id,
                    status = %status,
                    outputs = job.outputs.len(),
                    "Export job finished"
                ),
            }
            event
        };

        self.reporter.emit(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::generate_stereo_test_tone;
    use crate::export::{CollectingEventSink, MemoryProjectStore, SystemClock};
    use crate::render::MemorySink;

    fn build_service(
        store: MemoryProjectStore,
        options: ServiceOptions,
    ) -> (ExportService, Arc<CollectingEventSink>) {
        let events = Arc::new(CollectingEventSink::new());
        let service = ExportService::new(
            Arc::new(ProfileRegistry::builtin().unwrap()),
            Arc::new(store),
            Arc::new(MemorySink::new()),
            events.clone(),
            Arc::new(SystemClock),
            options,
        );
        (service, events)
    }

    fn metadata() -> ExportMetadata {
        ExportMetadata {
            title: Some("Night Drive".to_string()),
            artist: Some("The Outliers".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_unknown_profile_creates_no_job() {
        let (service, _) = build_service(MemoryProjectStore::new(), ServiceOptions::default());
        let err = service
            .submit(StartExportRequest::new("p", &["spotify_hq", "bogus_profile"]))
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "UNKNOWN_PROFILE");
        assert!(service.jobs().await.is_empty());
    }

    #[tokio::test]
    async fn test_single_profile_completes() {
        let store = MemoryProjectStore::new().with_project(
            "song",
            generate_stereo_test_tone(440.0, 440.0, 0.3, 0.5, 44100),
        );
        let (service, events) = build_service(store, ServiceOptions::default());
        let receipt = service
            .submit(StartExportRequest::new("song", &["soundcloud"]).with_metadata(metadata()))
            .await
            .unwrap();

        let job = service.wait_for(&receipt.job_id).await.unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.progress, 100.0);
        assert_eq!(job.outputs.len(), 1);
        assert!(job.outputs[0].success);
        assert!(job.started_at.is_some() && job.finished_at.is_some());

        let last = events.events_for(&receipt.job_id).pop().unwrap();
        assert!(matches!(last, ExportEvent::Completed { ref outputs, .. } if outputs.len() == 1));
    }

    #[tokio::test]
    async fn test_missing_project_fails_job() {
        let (service, events) = build_service(MemoryProjectStore::new(), ServiceOptions::default());
        let receipt = service
            .submit(StartExportRequest::new("absent", &["soundcloud"]))
            .await
            .unwrap();

        let job = service.wait_for(&receipt.job_id).await.unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.outputs.is_empty());
        assert_eq!(job.error.unwrap().code, "PROJECT_LOAD_ERROR");
        assert!(events
            .events_for(&receipt.job_id)
            .iter()
            .any(|e| matches!(e, ExportEvent::Failed { code, .. } if code == "PROJECT_LOAD_ERROR")));
    }

    #[tokio::test]
    async fn test_cancel_terminal_job_is_unchanged() {
        let (service, _) = build_service(MemoryProjectStore::new(), ServiceOptions::default());
        let receipt = service
            .submit(StartExportRequest::new("absent", &["soundcloud"]))
            .await
            .unwrap();
        service.wait_for(&receipt.job_id).await.unwrap();

        let ack = service.cancel(&receipt.job_id).await.unwrap();
        assert_eq!(ack.status, JobStatus::Failed);
        assert!(!ack.pending);
        assert_eq!(
            service.status(&receipt.job_id).await.unwrap().status,
            JobStatus::Failed
        );
    }

    #[tokio::test]
    async fn test_unknown_job() {
        let (service, _) = build_service(MemoryProjectStore::new(), ServiceOptions::default());
        assert_eq!(
            service.status("nope").await.unwrap_err().error_code(),
            "JOB_NOT_FOUND"
        );
        assert!(matches!(
            service
                .handle(ExportCommand::CancelExport {
                    job_id: "nope".to_string()
                })
                .await,
            ExportResponse::Error(FailureInfo { ref code, .. }) if code == "JOB_NOT_FOUND"
        ));
    }

    #[tokio::test]
    async fn test_shutdown_rejects_new_jobs() {
        let (service, _) = build_service(MemoryProjectStore::new(), ServiceOptions::default());
        service.shutdown().await;
        assert!(service
            .submit(StartExportRequest::new("p", &["soundcloud"]))
            .await
            .is_err());
    }

    fn claim(job_id: &str, cancelled: bool) -> Claim {
        Claim {
            job_id: job_id.to_string(),
            project_id: "song".to_string(),
            profile_ids: vec!["soundcloud".to_string()],
            metadata: metadata(),
            settings: RenderSettings::default(),
            cancel: Arc::new(AtomicBool::new(cancelled)),
        }
    }

    #[tokio::test]
    async fn test_cancelled_claim_writes_no_artifact() {
        let sink = Arc::new(MemorySink::new());
        let service = ExportService::new(
            Arc::new(ProfileRegistry::builtin().unwrap()),
            Arc::new(MemoryProjectStore::new()),
            sink.clone(),
            Arc::new(CollectingEventSink::new()),
            Arc::new(SystemClock),
            ServiceOptions::default(),
        );
        let profile = service.shared.registry.get("soundcloud").unwrap();
        let source = Arc::new(generate_stereo_test_tone(440.0, 440.0, 0.3, 0.5, 44100));

        let result = service
            .shared
            .export_profile(&claim("job", true), profile, &source, 0.0, 100.0)
            .await;
        assert!(matches!(result, Err(ExportError::Cancelled)));
        assert!(sink.keys().is_empty());
    }

    #[tokio::test]
    async fn test_cancellation_outcome_is_not_a_failure() {
        let (service, events) = build_service(MemoryProjectStore::new(), ServiceOptions::default());
        let job = ExportJob::new(
            "job".to_string(),
            "song".to_string(),
            vec!["soundcloud".to_string()],
            metadata(),
            RenderSettings::default(),
            service.shared.clock.now(),
        );
        service.shared.jobs.write().await.insert(
            "job".to_string(),
            JobEntry {
                job,
                cancel: Arc::new(AtomicBool::new(true)),
            },
        );

        service
            .shared
            .finish(&claim("job", true), Err(ExportError::Cancelled))
            .await;

        let report = service.status("job").await.unwrap();
        assert_eq!(report.status, JobStatus::Cancelled);
        assert!(report.error.is_none());
        assert!(matches!(
            events.events_for("job").pop(),
            Some(ExportEvent::Cancelled { .. })
        ));
    }
}
