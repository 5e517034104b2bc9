//! Finalization stage: turns acquired media into files at their destination.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::error::FinalizeError;
use super::mover::FileMover;
use super::traits::Finalizer;
use super::types::{FinalizeOptions, FinalizeRequest};
use crate::acquire::AcquiredMedia;
use crate::config::DownloadParameters;
use crate::metrics;
use crate::pipeline::{PipelineError, PipelineResult, StageReport};
use crate::pool::BoundedTaskPool;
use crate::progress::ProgressSink;

struct UnitContext {
    finalizer: Arc<dyn Finalizer>,
    mover: FileMover,
    params: Arc<DownloadParameters>,
    progress: ProgressSink,
    results: Arc<Mutex<Vec<PipelineResult>>>,
}

impl UnitContext {
    async fn finalize_one(&self, media: AcquiredMedia) -> Result<(), PipelineError> {
        let id = media.episode.id();
        let temp_dir = media.temp_dir.clone();

        let outcome = self.place(media).await;

        if self.params.delete_temporary_files {
            if let Err(e) = tokio::fs::remove_dir_all(&temp_dir).await {
                debug!(
                    episode = %id,
                    dir = %temp_dir.display(),
                    error = %e,
                    "Temporary directory not removed"
                );
            }
        }

        match outcome {
            Ok(path) => {
                info!(episode = %id, path = %path.display(), "Episode finished");
                self.progress.completed(id, path.display().to_string()).await;
                self.push(PipelineResult::completed(id, path));
                Ok(())
            }
            Err(error) => {
                warn!(episode = %id, error = %error, "Episode failed");
                self.progress.failed(id, error.to_string()).await;
                self.push(PipelineResult::failed(id, &error));
                Err(error)
            }
        }
    }

    /// Writes the episode to its final path and returns that path.
    async fn place(&self, media: AcquiredMedia) -> Result<PathBuf, PipelineError> {
        let id = media.episode.id();
        let target = self.params.final_path(&media.episode);

        if let Some(dir) = target.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|source| PipelineError::InvalidOutputPath {
                    path: dir.to_path_buf(),
                    source,
                })?;
        }

        let mode = if self.params.requires_finalizer() {
            "encode"
        } else {
            "move"
        };
        let started = Instant::now();

        let outcome = if self.params.requires_finalizer() {
            let request = FinalizeRequest {
                media,
                target: target.clone(),
                options: FinalizeOptions::from_params(&self.params),
            };
            debug!(episode = %id, finalizer = self.finalizer.name(), "Finalizing episode");
            self.finalizer
                .finalize(request, self.progress.reporter(id, "encode"))
                .await
                .map(|finalized| finalized.path)
        } else {
            self.move_primary(&media, &target).await.map(|_| target)
        };

        metrics::FINALIZATION_DURATION
            .with_label_values(&[mode])
            .observe(started.elapsed().as_secs_f64());

        match outcome {
            Ok(path) => {
                metrics::FINALIZATIONS_TOTAL
                    .with_label_values(&[mode, "success"])
                    .inc();
                Ok(path)
            }
            Err(source) => {
                metrics::FINALIZATIONS_TOTAL
                    .with_label_values(&[mode, "failed"])
                    .inc();
                Err(PipelineError::FinalizationFailed { episode: id, source })
            }
        }
    }

    /// Direct placement of the raw file when nothing needs merging or encoding.
    async fn move_primary(&self, media: &AcquiredMedia, target: &Path) -> Result<u64, FinalizeError> {
        let primary = media.primary().ok_or_else(|| FinalizeError::NoInput {
            episode: media.episode.id().to_string(),
        })?;
        debug!(
            episode = %media.episode.id(),
            from = %primary.path.display(),
            "Moving episode without encoding"
        );
        self.mover.move_file(&primary.path, target).await
    }

    fn push(&self, result: PipelineResult) {
        self.results
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(result);
    }
}

/// Consumes acquired episodes and finalizes them, at most
/// `encode_pool_size` at a time.
pub struct FinalizationStage {
    finalizer: Arc<dyn Finalizer>,
    params: Arc<DownloadParameters>,
    progress: ProgressSink,
}

impl FinalizationStage {
    pub fn new(finalizer: Arc<dyn Finalizer>, params: Arc<DownloadParameters>, progress: ProgressSink) -> Self {
        Self {
            finalizer,
            params,
            progress,
        }
    }

    /// Reads `handoff` until it is closed and every item is finalized.
    pub async fn run(self, mut handoff: mpsc::Receiver<AcquiredMedia>) -> StageReport {
        let mut pool = BoundedTaskPool::new("finalization", self.params.encode_pool_size);
        let monitor = pool.monitor();
        let results = Arc::new(Mutex::new(Vec::new()));
        let context = Arc::new(UnitContext {
            finalizer: self.finalizer,
            mover: FileMover::new(),
            params: self.params,
            progress: self.progress,
            results: Arc::clone(&results),
        });

        let mut in_flight = HashSet::new();

        while let Some(media) = handoff.recv().await {
            let id = media.episode.id();
            if !in_flight.insert(id) {
                warn!(episode = %id, "Episode already being finalized, ignoring duplicate");
                continue;
            }

            let unit_context = Arc::clone(&context);
            if pool
                .submit(async move { unit_context.finalize_one(media).await })
                .await
                .is_err()
            {
                warn!("Finalization pool closed");
                break;
            }
        }

        let error = pool.drain().await.err();
        let results = std::mem::take(&mut *results.lock().unwrap_or_else(|e| e.into_inner()));

        StageReport {
            results,
            pool: monitor.status(),
            error,
        }
    }
}
