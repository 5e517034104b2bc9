//! Trait definitions for the discovery module.

use async_trait::async_trait;
use futures::stream::BoxStream;

use super::error::DiscoveryError;
use crate::episode::EpisodeDescriptor;

/// Lazily produced episodes of a series, ordered by `(season, sequence)`.
pub type EpisodeStream = BoxStream<'static, Result<EpisodeDescriptor, DiscoveryError>>;

/// Lists the episodes of a series.
#[async_trait]
pub trait Discovery: Send + Sync {
    /// Returns the name of this discovery implementation.
    fn name(&self) -> &str;

    /// Starts listing the series at `url`.
    ///
    /// Failing to start is an error; a single entry that cannot be
    /// interpreted is reported as an `Err` item of the stream.
    async fn discover(&self, url: &str) -> Result<EpisodeStream, DiscoveryError>;
}
