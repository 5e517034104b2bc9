//! Mock acquirer for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use super::gauge::ConcurrencyGauge;
use crate::acquire::{AcquireError, AcquiredFile, AcquiredMedia, Acquirer, AcquisitionRequest};
use crate::episode::{EpisodeId, InputKind};
use crate::progress::ProgressReporter;

/// A recorded acquisition for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedAcquisition {
    pub episode_id: EpisodeId,
    pub temp_dir: PathBuf,
    /// Kind of the credential passed along, if any.
    pub credential: Option<&'static str>,
    pub success: bool,
}

/// Mock implementation of the Acquirer trait.
///
/// Writes a small fake video file (plus one file per subtitle input and per
/// dub track) into the request's temporary directory, so finalization works
/// on real files.
///
/// Provides controllable behavior for testing:
/// - Track acquisitions for assertions
/// - Fail chosen episodes
/// - Simulate download time
/// - Observe how many acquisitions ran at once
///
/// # Example
///
/// ```rust,ignore
/// use serialdl_core::testing::MockAcquirer;
///
/// let acquirer = MockAcquirer::new();
/// acquirer.fail_episode(EpisodeId::new(Some(1), 3u32), "geo blocked").await;
///
/// // Run the pipeline...
///
/// assert_eq!(acquirer.acquisition_count().await, 5);
/// assert!(acquirer.peak_concurrency() <= 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockAcquirer {
    /// Recorded acquisitions.
    acquisitions: Arc<RwLock<Vec<RecordedAcquisition>>>,
    /// Failure reasons by episode.
    failures: Arc<RwLock<HashMap<EpisodeId, String>>>,
    /// Simulated download duration.
    delay: Arc<RwLock<Duration>>,
    /// Tokens cancelled when the given episode starts.
    cancel_on: Arc<RwLock<HashMap<EpisodeId, CancellationToken>>>,
    gauge: ConcurrencyGauge,
}

impl MockAcquirer {
    /// Create a new mock acquirer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all recorded acquisitions, in start order.
    pub async fn recorded(&self) -> Vec<RecordedAcquisition> {
        self.acquisitions.read().await.clone()
    }

    /// Get the number of acquisitions performed.
    pub async fn acquisition_count(&self) -> usize {
        self.acquisitions.read().await.len()
    }

    /// Make the acquisition of `id` fail with `reason`.
    pub async fn fail_episode(&self, id: EpisodeId, reason: impl Into<String>) {
        self.failures.write().await.insert(id, reason.into());
    }

    /// Set the simulated download duration.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = delay;
    }

    /// Cancel `token` as soon as the acquisition of `id` starts.
    pub async fn cancel_when_started(&self, id: EpisodeId, token: CancellationToken) {
        self.cancel_on.write().await.insert(id, token);
    }

    /// Highest number of acquisitions observed running at once.
    pub fn peak_concurrency(&self) -> usize {
        self.gauge.peak()
    }

    async fn write_files(request: &AcquisitionRequest) -> Result<Vec<AcquiredFile>, AcquireError> {
        let episode = &request.episode;
        tokio::fs::create_dir_all(&request.temp_dir)
            .await
            .map_err(|source| AcquireError::TempDirFailed {
                path: request.temp_dir.clone(),
                source,
            })?;

        let prefix = episode.file_prefix();
        let video = request.temp_dir.join(format!("{}.mkv", prefix));
        tokio::fs::write(&video, format!("mock video {}", prefix)).await?;
        let mut files = vec![AcquiredFile::new(video, InputKind::Video, None)];

        for (index, input) in episode.inputs_of(InputKind::Subtitle).enumerate() {
            let language = input.language.as_deref().unwrap_or("und");
            let path = request
                .temp_dir
                .join(format!("{}.{}.{}.ass", prefix, index, language));
            tokio::fs::write(&path, "[Script Info]\n").await?;
            files.push(AcquiredFile::new(path, InputKind::Subtitle, input.language.as_deref()));
        }

        for (index, track) in episode.dub_tracks.iter().enumerate() {
            let language = track.language.as_deref().unwrap_or("und");
            let path = request
                .temp_dir
                .join(format!("{}.dub{}.{}.m4a", prefix, index, language));
            tokio::fs::write(&path, format!("mock audio {}", language)).await?;
            files.push(AcquiredFile::new(path, InputKind::Audio, track.language.as_deref()));
        }

        Ok(files)
    }
}

#[async_trait]
impl Acquirer for MockAcquirer {
    fn name(&self) -> &str {
        "mock"
    }

    async fn acquire(
        &self,
        request: AcquisitionRequest,
        progress: ProgressReporter,
    ) -> Result<AcquiredMedia, AcquireError> {
        let _running = self.gauge.enter();
        let id = request.episode.id();

        if let Some(token) = self.cancel_on.read().await.get(&id) {
            token.cancel();
        }

        let failure = self.failures.read().await.get(&id).cloned();
        self.acquisitions.write().await.push(RecordedAcquisition {
            episode_id: id,
            temp_dir: request.temp_dir.clone(),
            credential: request.credential.as_ref().map(|c| c.kind()),
            success: failure.is_none(),
        });

        let delay = *self.delay.read().await;
        if !delay.is_zero() {
            progress.report(50.0);
            tokio::time::sleep(delay).await;
        }

        if let Some(reason) = failure {
            return Err(AcquireError::download_failed(reason, None));
        }

        let files = Self::write_files(&request).await?;
        progress.report(100.0);

        Ok(AcquiredMedia {
            episode: request.episode,
            files,
            temp_dir: request.temp_dir,
        })
    }
}
