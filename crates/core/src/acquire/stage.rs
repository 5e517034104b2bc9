//! Acquisition stage: downloads episodes and hands them to finalization.

use futures::{Stream, StreamExt};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::traits::Acquirer;
use super::types::{AcquiredMedia, AcquisitionRequest};
use crate::auth::Credential;
use crate::config::DownloadParameters;
use crate::episode::EpisodeDescriptor;
use crate::metrics;
use crate::pipeline::{PipelineError, PipelineResult, StageReport};
use crate::pool::BoundedTaskPool;
use crate::progress::ProgressSink;

/// Shared state of every acquisition unit of one run.
struct UnitContext {
    acquirer: Arc<dyn Acquirer>,
    params: Arc<DownloadParameters>,
    credential: Option<Credential>,
    progress: ProgressSink,
    handoff: mpsc::Sender<AcquiredMedia>,
    results: Arc<Mutex<Vec<PipelineResult>>>,
}

impl UnitContext {
    async fn acquire_one(&self, episode: EpisodeDescriptor) -> Result<(), PipelineError> {
        let id = episode.id();
        self.progress.started(id, episode.title.clone()).await;

        let entitled = self.credential.as_ref().is_some_and(Credential::is_entitled);
        if episode.premium && !entitled {
            metrics::ACQUISITIONS_TOTAL
                .with_label_values(&["entitlement_required"])
                .inc();
            return self.fail(PipelineError::EntitlementRequired { episode: id }).await;
        }

        let temp_dir = self.params.episode_temp_dir(&episode);
        let request = AcquisitionRequest {
            episode,
            credential: self.credential.clone(),
            temp_dir: temp_dir.clone(),
            params: Arc::clone(&self.params),
        };

        debug!(episode = %id, acquirer = self.acquirer.name(), "Acquiring episode");
        let started = Instant::now();
        let outcome = self
            .acquirer
            .acquire(request, self.progress.reporter(id, "download"))
            .await;
        let elapsed = started.elapsed().as_secs_f64();

        match outcome {
            Ok(media) => {
                metrics::ACQUISITIONS_TOTAL.with_label_values(&["success"]).inc();
                metrics::ACQUISITION_DURATION
                    .with_label_values(&["success"])
                    .observe(elapsed);
                info!(episode = %id, files = media.files.len(), "Episode acquired");

                // Suspends while the handoff is full.
                if self.handoff.send(media).await.is_err() {
                    warn!(episode = %id, "Finalization stopped accepting episodes");
                    if self.params.delete_temporary_files {
                        let _ = tokio::fs::remove_dir_all(&temp_dir).await;
                    }
                    return self.fail(PipelineError::HandoffClosed { episode: id }).await;
                }
                Ok(())
            }
            Err(source) => {
                metrics::ACQUISITIONS_TOTAL.with_label_values(&["failed"]).inc();
                metrics::ACQUISITION_DURATION
                    .with_label_values(&["failed"])
                    .observe(elapsed);
                if self.params.delete_temporary_files {
                    let _ = tokio::fs::remove_dir_all(&temp_dir).await;
                }
                self.fail(PipelineError::AcquisitionFailed { episode: id, source })
                    .await
            }
        }
    }

    /// Records a terminal failure for the episode the error names.
    async fn fail(&self, error: PipelineError) -> Result<(), PipelineError> {
        if let Some(id) = error.episode() {
            warn!(episode = %id, error = %error, "Episode failed");
            self.progress.failed(id, error.to_string()).await;
            self.results
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(PipelineResult::failed(id, &error));
        }
        Err(error)
    }
}

/// Runs the acquisition collaborator for each episode, at most
/// `download_pool_size` at a time.
pub struct AcquisitionStage {
    acquirer: Arc<dyn Acquirer>,
    params: Arc<DownloadParameters>,
    credential: Option<Credential>,
    progress: ProgressSink,
}

impl AcquisitionStage {
    pub fn new(
        acquirer: Arc<dyn Acquirer>,
        params: Arc<DownloadParameters>,
        credential: Option<Credential>,
        progress: ProgressSink,
    ) -> Self {
        Self {
            acquirer,
            params,
            credential,
            progress,
        }
    }

    /// Acquires every episode of `episodes`, sending each success into
    /// `handoff`.
    ///
    /// The handoff sender is dropped only after every unit settled, which
    /// closes the channel for the finalization stage. Once `cancel` fires no
    /// further episodes are pulled; units already running finish.
    pub async fn run<S>(
        self,
        mut episodes: S,
        handoff: mpsc::Sender<AcquiredMedia>,
        cancel: CancellationToken,
    ) -> StageReport
    where
        S: Stream<Item = EpisodeDescriptor> + Send + Unpin,
    {
        let mut pool = BoundedTaskPool::new("acquisition", self.params.download_pool_size);
        let monitor = pool.monitor();
        let results = Arc::new(Mutex::new(Vec::new()));
        let context = Arc::new(UnitContext {
            acquirer: self.acquirer,
            params: self.params,
            credential: self.credential,
            progress: self.progress,
            handoff,
            results: Arc::clone(&results),
        });

        let mut in_flight = HashSet::new();
        let mut cancelled = false;

        loop {
            let episode = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    cancelled = true;
                    break;
                }
                next = episodes.next() => match next {
                    Some(episode) => episode,
                    None => break,
                },
            };

            let id = episode.id();
            if !in_flight.insert(id) {
                warn!(episode = %id, "Episode already submitted, ignoring duplicate");
                continue;
            }

            let unit_context = Arc::clone(&context);
            let unit = async move { unit_context.acquire_one(episode).await };

            let submitted = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    cancelled = true;
                    break;
                }
                submitted = pool.submit(unit) => submitted,
            };
            if submitted.is_err() {
                warn!(episode = %id, "Acquisition pool closed");
                break;
            }
        }

        if cancelled {
            info!("Run cancelled, waiting for in-flight acquisitions");
        }

        let drained = pool.drain().await;

        // Units are done with the context; dropping it releases the last
        // handoff sender and closes the channel.
        drop(context);

        let results = std::mem::take(&mut *results.lock().unwrap_or_else(|e| e.into_inner()));
        let error = match drained {
            Ok(_) => cancelled.then_some(PipelineError::Cancelled),
            Err(error) => Some(error),
        };

        StageReport {
            results,
            pool: monitor.status(),
            error,
        }
    }
}
