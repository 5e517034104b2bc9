//! Trait definitions for the finalize module.

use async_trait::async_trait;

use super::error::FinalizeError;
use super::types::{FinalizeRequest, FinalizedEpisode};
use crate::progress::ProgressReporter;

/// Merges, encodes and places an acquired episode.
///
/// Implementations must be idempotent: running again after a failure
/// leaves either no file or a complete file at the target, never a
/// truncated one.
#[async_trait]
pub trait Finalizer: Send + Sync {
    /// Returns the name of this finalizer implementation.
    fn name(&self) -> &str;

    async fn finalize(
        &self,
        request: FinalizeRequest,
        progress: ProgressReporter,
    ) -> Result<FinalizedEpisode, FinalizeError>;
}
