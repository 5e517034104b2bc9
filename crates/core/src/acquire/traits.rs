//! Trait definitions for the acquire module.

use async_trait::async_trait;

use super::error::AcquireError;
use super::types::{AcquiredMedia, AcquisitionRequest};
use crate::progress::ProgressReporter;

/// Downloads the raw streams of an episode.
///
/// Called once per episode; the pipeline never retries.
#[async_trait]
pub trait Acquirer: Send + Sync {
    /// Returns the name of this acquirer implementation.
    fn name(&self) -> &str;

    /// Downloads `request.episode` into `request.temp_dir`.
    async fn acquire(
        &self,
        request: AcquisitionRequest,
        progress: ProgressReporter,
    ) -> Result<AcquiredMedia, AcquireError>;
}
