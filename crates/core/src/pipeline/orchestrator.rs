//! Drives one run from discovered episodes to finished files.

use futures::{stream, Stream, StreamExt};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::error::PipelineError;
use super::filter::{apply_ranges, select_variants};
use super::types::{EpisodeStatus, PipelineResult, PipelineState, RunReport};
use crate::acquire::{Acquirer, AcquisitionStage};
use crate::auth::Credential;
use crate::config::DownloadParameters;
use crate::discovery::{Discovery, DiscoveryError};
use crate::episode::EpisodeDescriptor;
use crate::finalize::{FinalizationStage, Finalizer};
use crate::metrics;
use crate::progress::ProgressSink;
use crate::scanner;

/// Filters the discovered episodes and runs the acquisition and
/// finalization stages against them.
///
/// The state moves `Idle → Filtering → Running → Draining → Completed`, or
/// ends in `Failed`. Subscribe with [`subscribe`](Self::subscribe) to watch it.
pub struct PipelineOrchestrator {
    acquirer: Arc<dyn Acquirer>,
    finalizer: Arc<dyn Finalizer>,
    params: Arc<DownloadParameters>,
    credential: Option<Credential>,
    progress: ProgressSink,
    cancel: CancellationToken,
    state: watch::Sender<PipelineState>,
}

impl PipelineOrchestrator {
    pub fn new(
        acquirer: Arc<dyn Acquirer>,
        finalizer: Arc<dyn Finalizer>,
        params: DownloadParameters,
    ) -> Self {
        let (state, _) = watch::channel(PipelineState::Idle);
        Self {
            acquirer,
            finalizer,
            params: Arc::new(params),
            credential: None,
            progress: ProgressSink::disabled(),
            cancel: CancellationToken::new(),
            state,
        }
    }

    pub fn with_credential(mut self, credential: Option<Credential>) -> Self {
        self.credential = credential;
        self
    }

    pub fn with_progress(mut self, progress: ProgressSink) -> Self {
        self.progress = progress;
        self
    }

    /// Uses `cancel` to stop the run early.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that stops new acquisitions when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PipelineState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> PipelineState {
        *self.state.borrow()
    }

    pub fn params(&self) -> &DownloadParameters {
        &self.params
    }

    /// Discovers the episodes behind `url` and runs them.
    pub async fn run_url(&self, discovery: &dyn Discovery, url: &str) -> RunReport {
        info!(url = %url, discovery = discovery.name(), "Discovering episodes");
        match discovery.discover(url).await {
            Ok(episodes) => self.run(episodes).await,
            Err(e) => {
                let run_id = Uuid::new_v4();
                self.finish(run_id, Vec::new(), Some(e.into()))
            }
        }
    }

    /// Runs every episode of `episodes` that survives filtering.
    pub async fn run<S>(&self, episodes: S) -> RunReport
    where
        S: Stream<Item = Result<EpisodeDescriptor, DiscoveryError>> + Send + Unpin,
    {
        let run_id = Uuid::new_v4();
        let span = info_span!("run", run_id = %run_id);
        self.execute(run_id, episodes).instrument(span).await
    }

    async fn execute<S>(&self, run_id: Uuid, mut episodes: S) -> RunReport
    where
        S: Stream<Item = Result<EpisodeDescriptor, DiscoveryError>> + Send + Unpin,
    {
        self.transition(PipelineState::Filtering);

        let mut discovered = Vec::new();
        while let Some(item) = episodes.next().await {
            match item {
                Ok(episode) => discovered.push(episode),
                Err(e) => return self.finish(run_id, Vec::new(), Some(e.into())),
            }
        }
        let discovered_count = discovered.len();

        let pending = match apply_ranges(&self.params, discovered) {
            Ok(episodes) => select_variants(&self.params, episodes),
            Err(e) => return self.finish(run_id, Vec::new(), Some(e.into())),
        };
        metrics::EPISODES_FILTERED.inc_by(discovered_count.saturating_sub(pending.len()) as u64);

        let output_dir = &self.params.output_dir;
        if let Err(source) = tokio::fs::create_dir_all(output_dir).await {
            let error = PipelineError::InvalidOutputPath {
                path: output_dir.clone(),
                source,
            };
            return self.finish(run_id, Vec::new(), Some(error));
        }

        let mut pending = pending;
        let mut results = Vec::new();
        if self.params.skip_existing {
            for skipped in scanner::remove_existing(output_dir, &mut pending) {
                metrics::EPISODES_SKIPPED.inc();
                results.push(PipelineResult::skipped(skipped.id, skipped.path));
            }
        }

        info!(
            discovered = discovered_count,
            pending = pending.len(),
            skipped = results.len(),
            "Filtered episodes"
        );

        if pending.is_empty() {
            warn!("No episodes left to download");
            return self.finish(run_id, results, None);
        }

        self.transition(PipelineState::Running);

        let progress = self.progress.for_run();
        let (handoff_tx, handoff_rx) = mpsc::channel(self.params.handoff_capacity.max(1));
        let acquisition = AcquisitionStage::new(
            Arc::clone(&self.acquirer),
            Arc::clone(&self.params),
            self.credential.clone(),
            progress.clone(),
        );
        let finalization = FinalizationStage::new(
            Arc::clone(&self.finalizer),
            Arc::clone(&self.params),
            progress,
        );

        let acquire = async {
            let report = acquisition
                .run(stream::iter(pending), handoff_tx, self.cancel.clone())
                .await;
            // Source exhausted and handoff closed.
            self.transition(PipelineState::Draining);
            report
        };
        let (acquired, finalized) = tokio::join!(acquire, finalization.run(handoff_rx));

        debug!(acquisition = ?acquired.pool, finalization = ?finalized.pool, "Stages drained");

        results.extend(acquired.results);
        results.extend(finalized.results);
        let error = acquired.error.or(finalized.error);

        self.finish(run_id, results, error)
    }

    fn finish(&self, run_id: Uuid, results: Vec<PipelineResult>, error: Option<PipelineError>) -> RunReport {
        let state = if error.is_some() {
            PipelineState::Failed
        } else {
            PipelineState::Completed
        };
        self.transition(state);
        metrics::RUNS_TOTAL.with_label_values(&[state.as_str()]).inc();

        let report = RunReport {
            run_id,
            state,
            results,
            error,
        };

        match &report.error {
            Some(e) => warn!(
                completed = report.count(EpisodeStatus::Completed),
                failed = report.count(EpisodeStatus::Failed),
                error = %e,
                "Run failed"
            ),
            None => info!(
                completed = report.count(EpisodeStatus::Completed),
                skipped = report.count(EpisodeStatus::Skipped),
                "Run completed"
            ),
        }

        report
    }

    fn transition(&self, to: PipelineState) {
        let from = self.state.send_replace(to);
        debug!(from = from.as_str(), to = to.as_str(), "Pipeline state changed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{episodes, MockAcquirer, MockFinalizer};
    use tempfile::TempDir;

    fn orchestrator(params: DownloadParameters) -> PipelineOrchestrator {
        PipelineOrchestrator::new(
            Arc::new(MockAcquirer::new()),
            Arc::new(MockFinalizer::new()),
            params,
        )
    }

    fn params(dir: &TempDir) -> DownloadParameters {
        DownloadParameters {
            output_dir: dir.path().join("out"),
            temp_dir: dir.path().join("tmp"),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_states_end_completed() {
        let dir = TempDir::new().unwrap();
        let orchestrator = orchestrator(params(&dir));
        let states = orchestrator.subscribe();
        assert_eq!(orchestrator.state(), PipelineState::Idle);

        let report = orchestrator
            .run(stream::iter(episodes("Show", 1, 2).into_iter().map(Ok)))
            .await;

        assert_eq!(report.state, PipelineState::Completed);
        assert_eq!(*states.borrow(), PipelineState::Completed);
        assert_eq!(report.results.len(), 2);
    }

    #[tokio::test]
    async fn test_invalid_range_fails_before_work() {
        let dir = TempDir::new().unwrap();
        let acquirer = Arc::new(MockAcquirer::new());
        let orchestrator = PipelineOrchestrator::new(
            acquirer.clone(),
            Arc::new(MockFinalizer::new()),
            DownloadParameters {
                episode_range: Some("x-1".to_string()),
                ..params(&dir)
            },
        );

        let report = orchestrator
            .run(stream::iter(episodes("Show", 1, 3).into_iter().map(Ok)))
            .await;

        assert_eq!(report.state, PipelineState::Failed);
        assert!(matches!(report.error, Some(PipelineError::InvalidRangeFormat(_))));
        assert!(acquirer.recorded().await.is_empty());
    }

    #[tokio::test]
    async fn test_discovery_error_fails_run() {
        let dir = TempDir::new().unwrap();
        let orchestrator = orchestrator(params(&dir));
        let items: Vec<Result<EpisodeDescriptor, DiscoveryError>> =
            vec![Err(DiscoveryError::invalid_output("truncated document"))];

        let report = orchestrator.run(stream::iter(items)).await;

        assert_eq!(report.state, PipelineState::Failed);
        assert!(matches!(report.error, Some(PipelineError::Discovery(_))));
    }

    #[tokio::test]
    async fn test_output_root_that_is_a_file() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("out");
        std::fs::write(&blocker, b"not a directory").unwrap();
        let orchestrator = orchestrator(DownloadParameters {
            output_dir: blocker.join("nested"),
            ..params(&dir)
        });

        let report = orchestrator
            .run(stream::iter(episodes("Show", 1, 1).into_iter().map(Ok)))
            .await;

        assert!(matches!(report.error, Some(PipelineError::InvalidOutputPath { .. })));
        assert!(report.results.is_empty());
    }
}
