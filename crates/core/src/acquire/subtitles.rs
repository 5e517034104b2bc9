//! Direct subtitle downloads over HTTP.

use reqwest::StatusCode;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

use super::error::AcquireError;
use super::types::AcquiredFile;
use crate::auth::TokenCache;
use crate::config::DownloadParameters;
use crate::episode::{sanitize_file_name, EpisodeDescriptor, EpisodeInput, InputKind};

const DEFAULT_SUBTITLE_EXT: &str = "ass";

/// Downloads subtitle inputs that are plain file URLs.
///
/// With a token cache every request carries the bearer token; a 401 drops
/// the cached token and the request is sent once more with a fresh one.
#[derive(Clone)]
pub struct HttpSubtitleFetcher {
    client: reqwest::Client,
    tokens: Option<Arc<TokenCache>>,
}

impl HttpSubtitleFetcher {
    pub fn new(client: reqwest::Client, tokens: Option<Arc<TokenCache>>) -> Self {
        Self { client, tokens }
    }

    /// Downloads every subtitle input of `episode` the parameters ask for.
    pub async fn fetch_all(
        &self,
        episode: &EpisodeDescriptor,
        params: &DownloadParameters,
        dest_dir: &Path,
    ) -> Result<Vec<AcquiredFile>, AcquireError> {
        let stem = episode.file_prefix();
        let mut files = Vec::new();

        for input in episode.inputs_of(InputKind::Subtitle) {
            if !params.wants_subtitle(input.language.as_deref()) {
                debug!(episode = %episode.id(), language = ?input.language, "Skipping subtitle");
                continue;
            }
            files.push(self.fetch(input, dest_dir, &stem, files.len()).await?);
        }

        Ok(files)
    }

    /// Downloads one subtitle into `dest_dir`.
    pub async fn fetch(
        &self,
        input: &EpisodeInput,
        dest_dir: &Path,
        stem: &str,
        index: usize,
    ) -> Result<AcquiredFile, AcquireError> {
        let mut response = self.send(&input.url).await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            if let Some(tokens) = &self.tokens {
                warn!(url = %input.url, "Token rejected, refreshing");
                tokens.invalidate().await;
                response = self.send(&input.url).await?;
            }
        }

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(AcquireError::Unauthorized(format!(
                "{} answered {}",
                input.url, status
            )));
        }
        if !status.is_success() {
            return Err(AcquireError::subtitle_failed(&input.url, status.to_string()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| AcquireError::subtitle_failed(&input.url, e.to_string()))?;

        let language = input.language.as_deref().unwrap_or("und");
        let file_name = sanitize_file_name(&format!(
            "{}.{}.{}.{}",
            stem,
            index,
            language,
            subtitle_extension(&input.url)
        ));
        let path = dest_dir.join(file_name);
        tokio::fs::write(&path, &body).await?;

        debug!(path = %path.display(), bytes = body.len(), "Subtitle saved");
        Ok(AcquiredFile::new(path, InputKind::Subtitle, input.language.as_deref()))
    }

    async fn send(&self, url: &str) -> Result<reqwest::Response, AcquireError> {
        let mut request = self.client.get(url);
        if let Some(tokens) = &self.tokens {
            let token = tokens
                .get_valid_token()
                .await
                .map_err(|e| AcquireError::Unauthorized(e.to_string()))?;
            request = request.bearer_auth(token);
        }
        request
            .send()
            .await
            .map_err(|e| AcquireError::subtitle_failed(url, e.to_string()))
    }
}

/// Extension from the URL path, ignoring the query string.
fn subtitle_extension(url: &str) -> &str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let last = path.rsplit('/').next().unwrap_or(path);
    match last.rsplit_once('.') {
        Some((_, ext))
            if !ext.is_empty() && ext.len() <= 4 && ext.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            ext
        }
        _ => DEFAULT_SUBTITLE_EXT,
    }
}
