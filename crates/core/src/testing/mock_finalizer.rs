//! Mock finalizer for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use super::gauge::ConcurrencyGauge;
use crate::episode::EpisodeId;
use crate::finalize::{FinalizeError, FinalizeOptions, FinalizeRequest, FinalizedEpisode, Finalizer};
use crate::progress::ProgressReporter;

/// A recorded finalization for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedFinalization {
    pub episode_id: EpisodeId,
    pub target: PathBuf,
    pub options: FinalizeOptions,
    /// Number of acquired files handed over.
    pub inputs: usize,
    pub success: bool,
}

/// Mock implementation of the Finalizer trait.
///
/// Copies the primary acquired file to the target through a hidden partial
/// file, so a failed call never leaves anything at the target.
///
/// # Example
///
/// ```rust,ignore
/// use serialdl_core::testing::MockFinalizer;
///
/// let finalizer = MockFinalizer::new();
/// finalizer.fail_episode(EpisodeId::new(Some(1), 3u32), "encoder crashed").await;
///
/// // Run the pipeline...
///
/// let finalized = finalizer.recorded().await;
/// assert_eq!(finalized.iter().filter(|f| f.success).count(), 4);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockFinalizer {
    finalizations: Arc<RwLock<Vec<RecordedFinalization>>>,
    failures: Arc<RwLock<HashMap<EpisodeId, String>>>,
    delay: Arc<RwLock<Duration>>,
    gauge: ConcurrencyGauge,
}

impl MockFinalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all recorded finalizations, in start order.
    pub async fn recorded(&self) -> Vec<RecordedFinalization> {
        self.finalizations.read().await.clone()
    }

    pub async fn finalization_count(&self) -> usize {
        self.finalizations.read().await.len()
    }

    /// Make the finalization of `id` fail with `reason`.
    pub async fn fail_episode(&self, id: EpisodeId, reason: impl Into<String>) {
        self.failures.write().await.insert(id, reason.into());
    }

    /// Set the simulated encode duration.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = delay;
    }

    /// Highest number of finalizations observed running at once.
    pub fn peak_concurrency(&self) -> usize {
        self.gauge.peak()
    }
}

#[async_trait]
impl Finalizer for MockFinalizer {
    fn name(&self) -> &str {
        "mock"
    }

    async fn finalize(
        &self,
        request: FinalizeRequest,
        progress: ProgressReporter,
    ) -> Result<FinalizedEpisode, FinalizeError> {
        let _running = self.gauge.enter();
        let id = request.media.episode.id();

        let failure = self.failures.read().await.get(&id).cloned();
        self.finalizations.write().await.push(RecordedFinalization {
            episode_id: id,
            target: request.target.clone(),
            options: request.options.clone(),
            inputs: request.media.files.len(),
            success: failure.is_none(),
        });

        let delay = *self.delay.read().await;
        if !delay.is_zero() {
            progress.report(50.0);
            tokio::time::sleep(delay).await;
        }

        if let Some(reason) = failure {
            return Err(FinalizeError::encode_failed(reason, None));
        }

        let primary = request.media.primary().ok_or_else(|| FinalizeError::NoInput {
            episode: id.to_string(),
        })?;
        let data = tokio::fs::read(&primary.path)
            .await
            .map_err(|_| FinalizeError::InputNotFound {
                path: primary.path.clone(),
            })?;

        let name = request
            .target
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let partial = request.target.with_file_name(format!(".{}.partial", name));
        tokio::fs::write(&partial, &data).await?;
        tokio::fs::rename(&partial, &request.target).await?;
        progress.report(100.0);

        Ok(FinalizedEpisode {
            path: request.target,
            size_bytes: data.len() as u64,
            duration_ms: delay.as_millis() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquire::{AcquiredFile, AcquiredMedia};
    use crate::episode::{EpisodeDescriptor, InputKind};
    use crate::progress::ProgressSink;
    use tempfile::TempDir;

    fn request(dir: &TempDir) -> FinalizeRequest {
        let raw = dir.path().join("raw.mkv");
        std::fs::write(&raw, b"video").unwrap();
        FinalizeRequest {
            media: AcquiredMedia {
                episode: EpisodeDescriptor::new("Show", Some(1), 3u32, "Three", "u"),
                files: vec![AcquiredFile::new(raw, InputKind::Video, None)],
                temp_dir: dir.path().to_path_buf(),
            },
            target: dir.path().join("S01E03 - Three.mkv"),
            options: FinalizeOptions::default(),
        }
    }

    fn reporter() -> ProgressReporter {
        ProgressSink::disabled().reporter(EpisodeId::new(Some(1), 3u32), "encode")
    }

    #[tokio::test]
    async fn test_writes_target() {
        let dir = TempDir::new().unwrap();
        let finalizer = MockFinalizer::new();

        let done = finalizer.finalize(request(&dir), reporter()).await.unwrap();

        assert_eq!(std::fs::read(&done.path).unwrap(), b"video");
        assert_eq!(done.size_bytes, 5);
    }

    #[tokio::test]
    async fn test_rerun_after_failure_is_clean() {
        let dir = TempDir::new().unwrap();
        let finalizer = MockFinalizer::new();
        let id = EpisodeId::new(Some(1), 3u32);
        finalizer.fail_episode(id, "encoder crashed").await;

        let first = finalizer.finalize(request(&dir), reporter()).await;
        assert!(first.is_err());
        assert!(!dir.path().join("S01E03 - Three.mkv").exists());

        finalizer.failures.write().await.clear();
        let second = finalizer.finalize(request(&dir), reporter()).await.unwrap();
        assert_eq!(std::fs::read(&second.path).unwrap(), b"video");
        assert_eq!(finalizer.finalization_count().await, 2);
    }
}
