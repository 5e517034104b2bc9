//! Error types for the acquire module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while downloading an episode.
#[derive(Debug, Error)]
pub enum AcquireError {
    /// Download tool binary not found.
    #[error("yt-dlp not found at path: {path}")]
    ToolNotFound { path: PathBuf },

    /// Download tool exited unsuccessfully.
    #[error("Download failed: {reason}")]
    DownloadFailed {
        reason: String,
        stderr: Option<String>,
    },

    /// The tool succeeded but produced no usable file.
    #[error("Download produced no output file in {dir}")]
    NoOutput { dir: PathBuf },

    /// Failed to create the temporary directory.
    #[error("Failed to create temporary directory: {path}")]
    TempDirFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Subtitle download failed.
    #[error("Failed to fetch subtitle {url}: {reason}")]
    SubtitleFailed { url: String, reason: String },

    /// The provider rejected the credential.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AcquireError {
    pub fn download_failed(reason: impl Into<String>, stderr: Option<String>) -> Self {
        Self::DownloadFailed {
            reason: reason.into(),
            stderr,
        }
    }

    pub fn subtitle_failed(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SubtitleFailed {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_) | Self::SubtitleFailed { .. })
    }
}
