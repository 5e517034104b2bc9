//! Pipeline lifecycle integration tests.
//!
//! These tests run the orchestrator with mock acquirer and finalizer:
//! - Terminal states and per-episode results
//! - Failure aggregation without stopping siblings
//! - Skip-existing, duplicates, ranges and entitlement checks
//! - Pool budgets, handoff ordering and cancellation

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use serialdl_core::{
    auth::Credential,
    config::DownloadParameters,
    episode::{EpisodeDescriptor, EpisodeId},
    pipeline::{EpisodeStatus, PipelineError, PipelineOrchestrator, PipelineState, RunReport},
    progress::{progress_channel, ProgressEvent, ProgressKind},
    testing::{fixtures, MockAcquirer, MockDiscovery, MockFinalizer},
};

/// Test helper to create an orchestrator with mocks.
struct TestHarness {
    acquirer: Arc<MockAcquirer>,
    finalizer: Arc<MockFinalizer>,
    root: TempDir,
}

impl TestHarness {
    fn new() -> Self {
        Self {
            acquirer: Arc::new(MockAcquirer::new()),
            finalizer: Arc::new(MockFinalizer::new()),
            root: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    fn output_dir(&self) -> PathBuf {
        self.root.path().join("out")
    }

    fn temp_dir(&self) -> PathBuf {
        self.root.path().join("tmp")
    }

    fn params(&self) -> DownloadParameters {
        DownloadParameters {
            output_dir: self.output_dir(),
            temp_dir: self.temp_dir(),
            ..Default::default()
        }
    }

    fn orchestrator(&self, params: DownloadParameters) -> PipelineOrchestrator {
        PipelineOrchestrator::new(self.acquirer.clone(), self.finalizer.clone(), params)
    }

    async fn run(&self, params: DownloadParameters, episodes: Vec<EpisodeDescriptor>) -> RunReport {
        self.orchestrator(params)
            .run(fixtures::episode_stream(episodes))
            .await
    }

    fn final_file(&self, number: u32) -> PathBuf {
        self.output_dir()
            .join(format!("S01E{:02} - Episode {}.mkv", number, number))
    }
}

fn id(number: u32) -> EpisodeId {
    EpisodeId::new(Some(1), number)
}

fn drain_events(rx: &mut mpsc::Receiver<ProgressEvent>) -> HashMap<EpisodeId, Vec<ProgressKind>> {
    let mut by_episode: HashMap<EpisodeId, Vec<ProgressKind>> = HashMap::new();
    while let Ok(event) = rx.try_recv() {
        by_episode.entry(event.episode_id).or_default().push(event.kind);
    }
    by_episode
}

// =============================================================================
// Run Outcome Tests
// =============================================================================

#[tokio::test]
async fn test_all_episodes_complete() {
    let harness = TestHarness::new();

    let report = harness
        .run(harness.params(), fixtures::episodes("Show", 1, 3))
        .await;

    assert_eq!(report.state, PipelineState::Completed);
    assert!(report.error.is_none());
    assert_eq!(report.count(EpisodeStatus::Completed), 3);
    for n in 1..=3 {
        assert!(harness.final_file(n).exists(), "missing output for episode {}", n);
    }
    assert_eq!(harness.finalizer.finalization_count().await, 3);
}

#[tokio::test]
async fn test_temporary_files_removed() {
    let harness = TestHarness::new();

    harness
        .run(harness.params(), fixtures::episodes("Show", 1, 2))
        .await;

    assert!(!harness.temp_dir().join("Show").join("S01E01").exists());
    assert!(!harness.temp_dir().join("Show").join("S01E02").exists());
}

#[tokio::test]
async fn test_temporary_files_kept_when_configured() {
    let harness = TestHarness::new();
    let params = DownloadParameters {
        delete_temporary_files: false,
        ..harness.params()
    };

    harness.run(params, fixtures::episodes("Show", 1, 1)).await;

    assert!(harness.temp_dir().join("Show").join("S01E01").exists());
}

#[tokio::test]
async fn test_finalize_failure_does_not_stop_siblings() {
    let harness = TestHarness::new();
    harness.finalizer.fail_episode(id(3), "encoder crashed").await;

    let report = harness
        .run(harness.params(), fixtures::episodes("Show", 1, 5))
        .await;

    assert_eq!(report.state, PipelineState::Failed);
    assert_eq!(report.count(EpisodeStatus::Completed), 4);
    assert_eq!(report.count(EpisodeStatus::Failed), 1);
    for n in [1, 2, 4, 5] {
        assert!(harness.final_file(n).exists());
    }
    assert!(!harness.final_file(3).exists());

    match report.error {
        Some(PipelineError::FinalizationFailed { episode, .. }) => assert_eq!(episode, id(3)),
        other => panic!("expected finalization failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_acquisition_failure_skips_finalization() {
    let harness = TestHarness::new();
    harness.acquirer.fail_episode(id(2), "geo blocked").await;

    let report = harness
        .run(harness.params(), fixtures::episodes("Show", 1, 3))
        .await;

    assert_eq!(report.state, PipelineState::Failed);
    assert!(matches!(
        report.error,
        Some(PipelineError::AcquisitionFailed { episode, .. }) if episode == id(2)
    ));

    let finalized: Vec<EpisodeId> = harness
        .finalizer
        .recorded()
        .await
        .into_iter()
        .map(|f| f.episode_id)
        .collect();
    assert_eq!(finalized.len(), 2);
    assert!(!finalized.contains(&id(2)));
}

#[tokio::test]
async fn test_empty_set_completes_without_work() {
    let harness = TestHarness::new();
    let orchestrator = harness.orchestrator(harness.params());
    let states = orchestrator.subscribe();

    let report = orchestrator.run(fixtures::episode_stream(Vec::new())).await;

    assert_eq!(report.state, PipelineState::Completed);
    assert!(report.results.is_empty());
    assert_eq!(*states.borrow(), PipelineState::Completed);
    assert_eq!(harness.acquirer.acquisition_count().await, 0);
}

#[tokio::test]
async fn test_run_url_uses_discovery() {
    let harness = TestHarness::new();
    let discovery = MockDiscovery::new(fixtures::episodes("Show", 1, 2));

    let report = harness
        .orchestrator(harness.params())
        .run_url(&discovery, "https://example.com/series/show")
        .await;

    assert!(report.is_success());
    assert_eq!(
        discovery.requested_urls().await,
        vec!["https://example.com/series/show".to_string()]
    );
    assert_eq!(harness.acquirer.acquisition_count().await, 2);
}

// =============================================================================
// Filtering Tests
// =============================================================================

#[tokio::test]
async fn test_skip_existing_episode() {
    let harness = TestHarness::new();
    std::fs::create_dir_all(harness.output_dir()).unwrap();
    let existing = harness.output_dir().join("S01E02 - Title.mkv");
    std::fs::write(&existing, b"done").unwrap();

    let report = harness
        .run(harness.params(), fixtures::episodes("Show", 1, 3))
        .await;

    assert!(report.is_success());
    let acquired: Vec<EpisodeId> = harness
        .acquirer
        .recorded()
        .await
        .into_iter()
        .map(|a| a.episode_id)
        .collect();
    assert_eq!(acquired.len(), 2);
    assert!(!acquired.contains(&id(2)));

    let skipped: Vec<_> = report
        .results
        .iter()
        .filter(|r| r.status == EpisodeStatus::Skipped)
        .collect();
    assert_eq!(skipped.len(), 1);
    assert_eq!(skipped[0].episode_id, id(2));
    assert_eq!(skipped[0].path.as_ref(), Some(&existing));
}

#[tokio::test]
async fn test_skip_existing_disabled() {
    let harness = TestHarness::new();
    std::fs::create_dir_all(harness.output_dir()).unwrap();
    std::fs::write(harness.output_dir().join("S01E02 - Title.mkv"), b"done").unwrap();
    let params = DownloadParameters {
        skip_existing: false,
        ..harness.params()
    };

    harness.run(params, fixtures::episodes("Show", 1, 3)).await;

    assert_eq!(harness.acquirer.acquisition_count().await, 3);
}

#[tokio::test]
async fn test_duplicate_descriptors_processed_once() {
    let harness = TestHarness::new();
    let episodes = vec![
        fixtures::episode("Show", 1, 1),
        fixtures::episode("Show", 1, 2),
        fixtures::episode("Show", 1, 1),
        fixtures::episode("Show", 1, 2),
    ];

    let report = harness.run(harness.params(), episodes).await;

    assert!(report.is_success());
    assert_eq!(report.results.len(), 2);
    assert_eq!(harness.acquirer.acquisition_count().await, 2);
    assert_eq!(harness.finalizer.finalization_count().await, 2);
}

#[tokio::test]
async fn test_inverted_range_yields_nothing() {
    let harness = TestHarness::new();
    let params = DownloadParameters {
        episode_range: Some("5-2".to_string()),
        ..harness.params()
    };

    let report = harness.run(params, fixtures::episodes("Show", 1, 6)).await;

    assert_eq!(report.state, PipelineState::Completed);
    assert!(report.results.is_empty());
    assert_eq!(harness.acquirer.acquisition_count().await, 0);
}

#[tokio::test]
async fn test_episode_range_selects_subset() {
    let harness = TestHarness::new();
    let params = DownloadParameters {
        episode_range: Some("3-".to_string()),
        ..harness.params()
    };

    let report = harness.run(params, fixtures::episodes("Show", 1, 5)).await;

    assert_eq!(report.count(EpisodeStatus::Completed), 3);
    assert!(!harness.final_file(2).exists());
    assert!(harness.final_file(5).exists());
}

#[tokio::test]
async fn test_unwanted_dubs_are_not_downloaded() {
    let harness = TestHarness::new();
    let episodes = vec![
        fixtures::dubbed_episode("Show", 1, 1, "German"),
        fixtures::episode("Show", 1, 1),
    ];

    let report = harness.run(harness.params(), episodes).await;

    assert!(report.is_success());
    let recorded = harness.acquirer.recorded().await;
    assert_eq!(recorded.len(), 1);
}

#[tokio::test]
async fn test_wanted_dub_audio_reaches_finalizer() {
    let harness = TestHarness::new();
    let params = DownloadParameters {
        dubs: true,
        ..harness.params()
    };
    let episodes = vec![
        fixtures::episode("Show", 1, 1),
        fixtures::dubbed_episode("Show", 1, 1, "English"),
    ];

    let report = harness.run(params, episodes).await;

    assert!(report.is_success());
    assert_eq!(harness.acquirer.acquisition_count().await, 1);
    let finalized = harness.finalizer.recorded().await;
    assert_eq!(finalized.len(), 1);
    // Video plus the English dub audio.
    assert_eq!(finalized[0].inputs, 2);
}

// =============================================================================
// Entitlement Tests
// =============================================================================

#[tokio::test]
async fn test_premium_episode_without_credential() {
    let harness = TestHarness::new();
    let episodes = vec![
        fixtures::episode("Show", 1, 1),
        fixtures::premium_episode("Show", 1, 2),
        fixtures::episode("Show", 1, 3),
    ];

    let report = harness.run(harness.params(), episodes).await;

    assert_eq!(report.state, PipelineState::Failed);
    assert!(matches!(
        report.error,
        Some(PipelineError::EntitlementRequired { episode }) if episode == id(2)
    ));
    assert_eq!(report.count(EpisodeStatus::Completed), 2);

    // The collaborator is never asked for the premium episode.
    let acquired: Vec<EpisodeId> = harness
        .acquirer
        .recorded()
        .await
        .into_iter()
        .map(|a| a.episode_id)
        .collect();
    assert!(!acquired.contains(&id(2)));
}

#[tokio::test]
async fn test_premium_episode_with_credential() {
    let harness = TestHarness::new();

    let report = harness
        .orchestrator(harness.params())
        .with_credential(Some(Credential::BearerToken("token".to_string())))
        .run(fixtures::episode_stream(vec![fixtures::premium_episode("Show", 1, 1)]))
        .await;

    assert!(report.is_success());
    let recorded = harness.acquirer.recorded().await;
    assert_eq!(recorded[0].credential, Some("bearer_token"));
}

#[tokio::test]
async fn test_anonymous_token_cannot_open_premium() {
    let harness = TestHarness::new();

    let report = harness
        .orchestrator(harness.params())
        .with_credential(Some(Credential::AnonymousToken("anon".to_string())))
        .run(fixtures::episode_stream(vec![
            fixtures::premium_episode("Show", 1, 1),
            fixtures::episode("Show", 1, 2),
        ]))
        .await;

    assert_eq!(report.state, PipelineState::Failed);
    assert!(matches!(
        report.error,
        Some(PipelineError::EntitlementRequired { episode }) if episode == id(1)
    ));
    let recorded = harness.acquirer.recorded().await;
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].episode_id, id(2));
    assert_eq!(recorded[0].credential, Some("anonymous_token"));
}

// =============================================================================
// Finalization Mode Tests
// =============================================================================

#[tokio::test]
async fn test_direct_move_without_encoding() {
    let harness = TestHarness::new();
    let params = DownloadParameters {
        subtitles: false,
        hevc: false,
        ..harness.params()
    };

    let report = harness.run(params, fixtures::episodes("Show", 1, 2)).await;

    assert!(report.is_success());
    assert_eq!(harness.finalizer.finalization_count().await, 0);
    assert_eq!(
        std::fs::read_to_string(harness.final_file(1)).unwrap(),
        "mock video S01E01"
    );
}

#[tokio::test]
async fn test_series_and_season_folders() {
    let harness = TestHarness::new();
    let params = DownloadParameters {
        series_folder: true,
        season_folder: true,
        ..harness.params()
    };

    let report = harness.run(params, fixtures::episodes("My Show", 1, 1)).await;

    assert!(report.is_success());
    assert!(harness
        .output_dir()
        .join("My Show")
        .join("Season 1")
        .join("S01E01 - Episode 1.mkv")
        .exists());
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_pool_budgets_respected() {
    let harness = TestHarness::new();
    harness.acquirer.set_delay(Duration::from_millis(20)).await;
    harness.finalizer.set_delay(Duration::from_millis(20)).await;
    let params = DownloadParameters {
        download_pool_size: 2,
        encode_pool_size: 1,
        handoff_capacity: 1,
        ..harness.params()
    };

    let report = harness.run(params, fixtures::episodes("Show", 1, 8)).await;

    assert!(report.is_success());
    assert_eq!(report.count(EpisodeStatus::Completed), 8);
    assert!(harness.acquirer.peak_concurrency() <= 2);
    assert!(harness.finalizer.peak_concurrency() <= 1);
}

#[tokio::test]
async fn test_each_episode_finalized_after_its_acquisition() {
    let harness = TestHarness::new();
    let (sink, mut rx) = progress_channel(256);

    let report = harness
        .orchestrator(harness.params())
        .with_progress(sink)
        .run(fixtures::episode_stream(fixtures::episodes("Show", 1, 4)))
        .await;
    assert!(report.is_success());

    let events = drain_events(&mut rx);
    assert_eq!(events.len(), 4);
    for (episode, kinds) in events {
        assert_eq!(kinds.first(), Some(&ProgressKind::Started), "{}", episode);
        assert_eq!(kinds.last(), Some(&ProgressKind::Completed), "{}", episode);
        assert_eq!(kinds.iter().filter(|k| k.is_terminal()).count(), 1);
    }
}

#[tokio::test]
async fn test_second_run_reports_progress_again() {
    let harness = TestHarness::new();
    let (sink, mut rx) = progress_channel(256);
    let params = DownloadParameters {
        skip_existing: false,
        ..harness.params()
    };
    let orchestrator = harness.orchestrator(params).with_progress(sink);

    for _ in 0..2 {
        let report = orchestrator
            .run(fixtures::episode_stream(fixtures::episodes("Show", 1, 1)))
            .await;
        assert!(report.is_success());
    }

    let events = drain_events(&mut rx);
    let completed = events[&id(1)]
        .iter()
        .filter(|k| **k == ProgressKind::Completed)
        .count();
    assert_eq!(completed, 2);
}

#[tokio::test]
async fn test_cancellation_stops_new_acquisitions() {
    let harness = TestHarness::new();
    let cancel = CancellationToken::new();
    harness.acquirer.cancel_when_started(id(2), cancel.clone()).await;
    let params = DownloadParameters {
        download_pool_size: 1,
        ..harness.params()
    };

    let report = harness
        .orchestrator(params)
        .with_cancellation(cancel)
        .run(fixtures::episode_stream(fixtures::episodes("Show", 1, 5)))
        .await;

    assert_eq!(report.state, PipelineState::Failed);
    assert!(matches!(report.error, Some(PipelineError::Cancelled)));
    assert_eq!(harness.acquirer.acquisition_count().await, 2);

    // In-flight work still finishes.
    assert_eq!(report.count(EpisodeStatus::Completed), 2);
    assert!(harness.final_file(2).exists());
}
