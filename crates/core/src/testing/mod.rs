//! Testing utilities and mock collaborators.
//!
//! The mocks implement the collaborator traits against the local filesystem,
//! so a whole run can be exercised without yt-dlp or ffmpeg installed.
//!
//! # Example
//!
//! ```rust,ignore
//! use serialdl_core::testing::{fixtures, MockAcquirer, MockFinalizer};
//!
//! let acquirer = Arc::new(MockAcquirer::new());
//! let finalizer = Arc::new(MockFinalizer::new());
//! finalizer.fail_episode(EpisodeId::new(Some(1), 3u32), "encoder crashed").await;
//!
//! let orchestrator = PipelineOrchestrator::new(acquirer.clone(), finalizer.clone(), params);
//! let report = orchestrator.run(fixtures::episode_stream(fixtures::episodes("Show", 1, 5))).await;
//! ```

mod gauge;
mod mock_acquirer;
mod mock_discovery;
mod mock_finalizer;

pub use gauge::{ConcurrencyGauge, GaugeGuard};
pub use mock_acquirer::{MockAcquirer, RecordedAcquisition};
pub use mock_discovery::MockDiscovery;
pub use mock_finalizer::{MockFinalizer, RecordedFinalization};

pub use fixtures::episodes;

/// Test fixtures and helper functions.
pub mod fixtures {
    use futures::stream::{self, BoxStream, StreamExt};

    use crate::discovery::DiscoveryError;
    use crate::episode::{EpisodeDescriptor, EpisodeInput, InputKind};

    /// Create a test episode with one video input.
    pub fn episode(series: &str, season: u32, number: u32) -> EpisodeDescriptor {
        EpisodeDescriptor::new(
            series,
            Some(season),
            number,
            format!("Episode {}", number),
            format!(
                "https://example.com/{}/s{}e{}",
                series.to_lowercase().replace(' ', "-"),
                season,
                number
            ),
        )
        .with_input(EpisodeInput::new(
            format!("https://cdn.example.com/s{}e{}.m3u8", season, number),
            None,
            InputKind::Video,
        ))
    }

    /// Create a test episode that needs a premium entitlement.
    pub fn premium_episode(series: &str, season: u32, number: u32) -> EpisodeDescriptor {
        episode(series, season, number).with_premium(true)
    }

    /// Create a dubbed variant of a test episode, served from its own page.
    pub fn dubbed_episode(series: &str, season: u32, number: u32, language: &str) -> EpisodeDescriptor {
        let mut dub = episode(series, season, number)
            .with_dub(language)
            .with_input(EpisodeInput::new(
                format!("https://cdn.example.com/s{}e{}-{}.m4a", season, number, language),
                Some(language),
                InputKind::Audio,
            ));
        dub.url = format!("{}-dub-{}", dub.url, language.to_lowercase());
        dub
    }

    /// Create episodes `1..=count` of one season.
    pub fn episodes(series: &str, season: u32, count: u32) -> Vec<EpisodeDescriptor> {
        (1..=count).map(|n| episode(series, season, n)).collect()
    }

    /// Wrap descriptors the way a discovery collaborator yields them.
    pub fn episode_stream(
        episodes: Vec<EpisodeDescriptor>,
    ) -> BoxStream<'static, Result<EpisodeDescriptor, DiscoveryError>> {
        stream::iter(episodes.into_iter().map(Ok)).boxed()
    }
}
