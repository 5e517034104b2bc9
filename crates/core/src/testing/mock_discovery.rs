//! Mock discovery for testing.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::discovery::{Discovery, DiscoveryError, EpisodeStream};
use crate::episode::EpisodeDescriptor;

/// Serves a fixed episode list for any URL and records the URLs asked for.
#[derive(Debug, Clone, Default)]
pub struct MockDiscovery {
    episodes: Arc<RwLock<Vec<EpisodeDescriptor>>>,
    urls: Arc<RwLock<Vec<String>>>,
}

impl MockDiscovery {
    pub fn new(episodes: Vec<EpisodeDescriptor>) -> Self {
        Self {
            episodes: Arc::new(RwLock::new(episodes)),
            urls: Arc::default(),
        }
    }

    pub async fn requested_urls(&self) -> Vec<String> {
        self.urls.read().await.clone()
    }
}

#[async_trait]
impl Discovery for MockDiscovery {
    fn name(&self) -> &str {
        "mock"
    }

    async fn discover(&self, url: &str) -> Result<EpisodeStream, DiscoveryError> {
        self.urls.write().await.push(url.to_string());
        let episodes = self.episodes.read().await.clone();
        Ok(stream::iter(episodes.into_iter().map(Ok)).boxed())
    }
}
