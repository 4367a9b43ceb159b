//! Integration Tests
//!
//! End-to-end tests for the export job pipeline: submission, scheduling,
//! cancellation, partial failure and event reporting.

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;

use mixport::engine::{generate_stereo_test_tone, AudioBuffer};
use mixport::export::{
    CollectingEventSink, ExportCommand, ExportEvent, ExportResponse, ExportService, JobStatus,
    MemoryProjectStore, ProjectStore, ServiceOptions, StartExportRequest, SystemClock,
};
use mixport::profiles::{AudioFormat, ProfileRegistry};
use mixport::render::{DirectorySink, ExportMetadata, MemorySink};
use mixport::Result;

/// Project store that takes a while to hand out audio
struct SlowStore {
    inner: MemoryProjectStore,
    delay: Duration,
}

impl ProjectStore for SlowStore {
    fn load_audio(&self, project_id: &str) -> Result<AudioBuffer> {
        std::thread::sleep(self.delay);
        self.inner.load_audio(project_id)
    }
}

fn mix(seconds: f32) -> AudioBuffer {
    generate_stereo_test_tone(440.0, 440.0, 0.3, seconds, 48000)
}

fn metadata() -> ExportMetadata {
    ExportMetadata {
        title: Some("Night Drive".to_string()),
        artist: Some("The Outliers".to_string()),
        ..Default::default()
    }
}

fn start_service(
    store: Arc<dyn ProjectStore>,
    options: ServiceOptions,
) -> (ExportService, Arc<CollectingEventSink>) {
    let events = Arc::new(CollectingEventSink::new());
    let service = ExportService::new(
        Arc::new(ProfileRegistry::builtin().unwrap()),
        store,
        Arc::new(MemorySink::new()),
        events.clone(),
        Arc::new(SystemClock),
        options,
    );
    (service, events)
}

fn slow_store(delay_ms: u64) -> Arc<dyn ProjectStore> {
    Arc::new(SlowStore {
        inner: MemoryProjectStore::new().with_project("song", mix(0.5)),
        delay: Duration::from_millis(delay_ms),
    })
}

// === Submission ===

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_spotify_and_tiktok_export() {
    let dir = tempfile::tempdir().unwrap();
    let events = Arc::new(CollectingEventSink::new());
    let service = ExportService::new(
        Arc::new(ProfileRegistry::builtin().unwrap()),
        Arc::new(MemoryProjectStore::new().with_project("song", mix(2.0))),
        Arc::new(DirectorySink::new(dir.path())),
        events.clone(),
        Arc::new(SystemClock),
        ServiceOptions::default(),
    );

    let receipt = service
        .submit(
            StartExportRequest::new("song", &["spotify_hq", "tiktok_optimized"])
                .with_metadata(metadata()),
        )
        .await
        .unwrap();
    let job = service.wait_for(&receipt.job_id).await.unwrap();

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.outputs.len(), 2);
    assert_eq!(job.successful_outputs().len(), 2);

    let spotify = &job.outputs[0];
    assert_eq!(spotify.profile_id, "spotify_hq");
    assert_eq!(spotify.format, AudioFormat::Wav);
    assert_eq!(spotify.sample_rate, 44100);

    let tiktok = &job.outputs[1];
    assert_eq!(tiktok.profile_id, "tiktok_optimized");
    assert_eq!(tiktok.format, AudioFormat::Mp3);
    assert_eq!(tiktok.bitrate_kbps, Some(320));

    let mp3 = std::fs::read(tiktok.path.as_ref().unwrap()).unwrap();
    assert!(mp3.starts_with(b"ID3") || (mp3[0] == 0xFF && mp3[1] & 0xE0 == 0xE0));

    for output in &job.outputs {
        let path = output.path.as_ref().unwrap();
        let written = std::fs::metadata(path).unwrap().len();
        assert_eq!(output.file_size, written, "{} size", output.profile_id);
        assert_eq!(output.checksum.as_ref().unwrap().len(), 64);
        assert!((output.duration_secs - 2.0).abs() < 0.01);
    }

    let spotify_lufs = spotify.quality.as_ref().unwrap().lufs;
    assert!((spotify_lufs + 14.0).abs() <= 1.0, "spotify at {} LUFS", spotify_lufs);

    let last = events.events_for(&receipt.job_id).pop().unwrap();
    assert!(matches!(last, ExportEvent::Completed { ref outputs, .. } if outputs.len() == 2));
}

#[tokio::test]
async fn test_bogus_profile_rejected_without_job() {
    let (service, events) = start_service(slow_store(0), ServiceOptions::default());

    let err = service
        .submit(StartExportRequest::new("song", &["bogus_profile"]))
        .await
        .unwrap_err();

    assert_eq!(err.error_code(), "UNKNOWN_PROFILE");
    assert!(service.jobs().await.is_empty());
    assert!(events.events().is_empty());
}

#[tokio::test]
async fn test_duplicate_profile_rejected() {
    let (service, _) = start_service(slow_store(0), ServiceOptions::default());
    let err = service
        .submit(StartExportRequest::new("song", &["soundcloud", "soundcloud"]))
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "DUPLICATE_PROFILE");
    assert!(service.jobs().await.is_empty());
}

// === Failure isolation ===

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_profile_failure_is_isolated() {
    let (service, events) = start_service(slow_store(0), ServiceOptions::default());

    // apple_music also needs album and isrc
    let receipt = service
        .submit(
            StartExportRequest::new("song", &["apple_music", "spotify_hq"])
                .with_metadata(metadata()),
        )
        .await
        .unwrap();
    let job = service.wait_for(&receipt.job_id).await.unwrap();

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.outputs.len(), 2);
    assert!(!job.outputs[0].success);
    assert_eq!(job.outputs[0].error.as_ref().unwrap().code, "RENDER_ERROR");
    assert!(job.outputs[1].success);

    let last = events.events_for(&receipt.job_id).pop().unwrap();
    match last {
        ExportEvent::Completed { outputs, .. } => {
            assert_eq!(outputs.len(), 1);
            assert_eq!(outputs[0].profile_id, "spotify_hq");
        }
        other => panic!("expected completion, got {:?}", other),
    }
}

#[tokio::test]
async fn test_all_profiles_failing_fails_job() {
    let (service, _) = start_service(slow_store(0), ServiceOptions::default());
    let receipt = service
        .submit(StartExportRequest::new("song", &["apple_music", "tidal_master"]))
        .await
        .unwrap();
    let job = service.wait_for(&receipt.job_id).await.unwrap();

    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.successful_outputs().len(), 0);
    assert_eq!(job.error.unwrap().code, "RENDER_ERROR");
}

#[tokio::test]
async fn test_project_load_error_aborts_job() {
    let (service, events) = start_service(slow_store(0), ServiceOptions::default());
    let receipt = service
        .submit(StartExportRequest::new("missing", &["spotify_hq", "soundcloud"]))
        .await
        .unwrap();
    let job = service.wait_for(&receipt.job_id).await.unwrap();

    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.outputs.is_empty());
    let last = events.events_for(&receipt.job_id).pop().unwrap();
    assert!(matches!(last, ExportEvent::Failed { ref code, .. } if code == "PROJECT_LOAD_ERROR"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_job_timeout() {
    let options = ServiceOptions {
        max_job_duration: Duration::from_millis(50),
        ..Default::default()
    };
    let (service, _) = start_service(slow_store(300), options);
    let receipt = service
        .submit(StartExportRequest::new("song", &["soundcloud"]).with_metadata(metadata()))
        .await
        .unwrap();
    let job = service.wait_for(&receipt.job_id).await.unwrap();

    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.error.unwrap().code, "TIMEOUT");
}

// === Cancellation ===

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cancel_while_queued() {
    let options = ServiceOptions {
        max_concurrent_jobs: 1,
        ..Default::default()
    };
    let (service, events) = start_service(slow_store(300), options);

    let first = service
        .submit(StartExportRequest::new("song", &["soundcloud"]).with_metadata(metadata()))
        .await
        .unwrap();
    let second = service
        .submit(StartExportRequest::new("song", &["soundcloud"]).with_metadata(metadata()))
        .await
        .unwrap();
    assert_eq!(second.queue_position, 1);

    let ack = service.cancel(&second.job_id).await.unwrap();
    assert_eq!(ack.status, JobStatus::Cancelled);
    assert!(!ack.pending);

    let first_job = service.wait_for(&first.job_id).await.unwrap();
    assert_eq!(first_job.status, JobStatus::Completed);

    let second_job = service.job(&second.job_id).await.unwrap();
    assert_eq!(second_job.status, JobStatus::Cancelled);
    assert!(second_job.started_at.is_none());
    assert_eq!(
        events.events_for(&second.job_id),
        vec![ExportEvent::Cancelled {
            job_id: second.job_id.clone()
        }]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cancel_while_processing_never_completes() {
    let (service, _) = start_service(slow_store(200), ServiceOptions::default());
    let receipt = service
        .submit(
            StartExportRequest::new("song", &["soundcloud", "spotify_hq"])
                .with_metadata(metadata()),
        )
        .await
        .unwrap();

    // Wait for a worker to pick the job up
    while service.status(&receipt.job_id).await.unwrap().status == JobStatus::Queued {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let ack = service.cancel(&receipt.job_id).await.unwrap();
    assert!(ack.pending);

    let job = service.wait_for(&receipt.job_id).await.unwrap();
    assert_eq!(job.status, JobStatus::Cancelled);
    assert!(job.outputs.len() < 2);
}

// === Scheduling ===

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrency_is_bounded() {
    let options = ServiceOptions {
        max_concurrent_jobs: 3,
        ..Default::default()
    };
    let (service, _) = start_service(slow_store(40), options);

    let mut job_ids = Vec::new();
    for _ in 0..10 {
        let receipt = service
            .submit(StartExportRequest::new("song", &["soundcloud"]).with_metadata(metadata()))
            .await
            .unwrap();
        job_ids.push(receipt.job_id);
    }

    for job_id in &job_ids {
        let job = service.wait_for(job_id).await.unwrap();
        assert_eq!(job.status, JobStatus::Completed);
    }

    let stats = service.stats().await;
    assert!(stats.peak_active <= 3, "peak {}", stats.peak_active);
    assert!(stats.peak_active >= 1);
    assert_eq!(stats.completed, 10);
    assert_eq!(stats.active, 0);
    assert_eq!(stats.queued, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_progress_is_monotonic() {
    let (service, events) = start_service(slow_store(0), ServiceOptions::default());
    let receipt = service
        .submit(
            StartExportRequest::new("song", &["spotify_hq", "soundcloud", "bandcamp_lossless"])
                .with_metadata(metadata()),
        )
        .await
        .unwrap();
    service.wait_for(&receipt.job_id).await.unwrap();

    let job_events = events.events_for(&receipt.job_id);
    let percents: Vec<f32> = job_events
        .iter()
        .filter_map(|e| match e {
            ExportEvent::Progress { percent, .. } => Some(*percent),
            _ => None,
        })
        .collect();

    assert!(!percents.is_empty());
    assert!(percents.windows(2).all(|w| w[0] < w[1]), "{:?}", percents);
    assert!(percents.iter().all(|p| (0.0..=100.0).contains(p)));
    assert!(job_events.last().unwrap().is_terminal());
    assert_eq!(job_events.iter().filter(|e| e.is_terminal()).count(), 1);
}

// === Commands ===

#[tokio::test]
async fn test_command_roundtrip() {
    let (service, _) = start_service(slow_store(0), ServiceOptions::default());

    let command: ExportCommand = serde_json::from_str(
        r#"{"type":"start_export","project_id":"song","profile_ids":["soundcloud"],
            "metadata":{"title":"Night Drive"}}"#,
    )
    .unwrap();
    let job_id = match service.handle(command).await {
        ExportResponse::Started(receipt) => receipt.job_id,
        other => panic!("unexpected response {:?}", other),
    };
    service.wait_for(&job_id).await.unwrap();

    match service
        .handle(ExportCommand::GetExportStatus {
            job_id: job_id.clone(),
        })
        .await
    {
        ExportResponse::Status(report) => {
            assert_eq!(report.status, JobStatus::Completed);
            assert_eq!(report.progress, 100.0);
            assert_eq!(report.outputs.len(), 1);
        }
        other => panic!("unexpected response {:?}", other),
    }

    match service.handle(ExportCommand::ListExportProfiles).await {
        ExportResponse::Profiles { profiles } => assert_eq!(profiles.len(), 9),
        other => panic!("unexpected response {:?}", other),
    }
}
