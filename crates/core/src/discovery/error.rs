//! Error types for the discovery module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while listing a series.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Listing tool binary not found.
    #[error("yt-dlp not found at path: {path}")]
    ToolNotFound { path: PathBuf },

    /// Listing tool exited unsuccessfully.
    #[error("Discovery failed with exit code {exit_code:?}: {stderr}")]
    ToolFailed {
        exit_code: Option<i32>,
        stderr: String,
    },

    /// Tool output could not be interpreted.
    #[error("Invalid discovery output: {reason}")]
    InvalidOutput { reason: String },

    /// The document type is not a video or playlist.
    #[error("Unsupported document type: {kind}")]
    UnsupportedDocument { kind: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DiscoveryError {
    pub fn invalid_output(reason: impl Into<String>) -> Self {
        Self::InvalidOutput {
            reason: reason.into(),
        }
    }
}
