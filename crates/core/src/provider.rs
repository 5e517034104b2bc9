//! Supported content providers.

use reqwest::Url;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("Invalid URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("{url} points at a single episode, expected a series")]
    NotASeries { url: String },
}

/// Closed set of providers the tool knows how to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Crunchyroll,
    /// Anything yt-dlp can list as a playlist.
    Generic,
}

impl Provider {
    /// Picks the provider for a series URL.
    pub fn from_url(url: &str) -> Result<Self, ProviderError> {
        let parsed = Url::parse(url).map_err(|e| ProviderError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let host = parsed.host_str().ok_or_else(|| ProviderError::InvalidUrl {
            url: url.to_string(),
            reason: "missing host".to_string(),
        })?;

        if host.eq_ignore_ascii_case("crunchyroll.com")
            || host.to_ascii_lowercase().ends_with(".crunchyroll.com")
        {
            if parsed.path().contains("/watch/") {
                return Err(ProviderError::NotASeries {
                    url: url.to_string(),
                });
            }
            return Ok(Provider::Crunchyroll);
        }

        Ok(Provider::Generic)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Provider::Crunchyroll => "crunchyroll",
            Provider::Generic => "generic",
        }
    }

    /// Token endpoint used when the configuration names none.
    pub fn default_token_endpoint(&self) -> Option<&'static str> {
        match self {
            Provider::Crunchyroll => Some("https://www.crunchyroll.com/auth/v1/token"),
            Provider::Generic => None,
        }
    }
}
