//! Error types for the pipeline module.

use std::path::PathBuf;
use thiserror::Error;

use crate::acquire::AcquireError;
use crate::auth::AuthError;
use crate::config::ConfigError;
use crate::discovery::DiscoveryError;
use crate::episode::EpisodeId;
use crate::finalize::FinalizeError;
use crate::range::RangeError;

/// Errors surfaced by a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    InvalidRangeFormat(#[from] RangeError),

    #[error("Username and password must be supplied together")]
    MissingCredential,

    #[error("Episode {episode} requires a premium account, supply credentials")]
    EntitlementRequired { episode: EpisodeId },

    #[error("Acquisition of {episode} failed: {source}")]
    AcquisitionFailed {
        episode: EpisodeId,
        #[source]
        source: AcquireError,
    },

    #[error("Finalization of {episode} failed: {source}")]
    FinalizationFailed {
        episode: EpisodeId,
        #[source]
        source: FinalizeError,
    },

    #[error("Invalid output path {path}: {source}")]
    InvalidOutputPath {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Episode source failed: {0}")]
    Discovery(#[from] DiscoveryError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Authentication failed: {0}")]
    Auth(AuthError),

    #[error("Episode {episode} was acquired after finalization stopped")]
    HandoffClosed { episode: EpisodeId },

    #[error("Run cancelled before all episodes were started")]
    Cancelled,
}

impl From<AuthError> for PipelineError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::MissingCredential => Self::MissingCredential,
            other => Self::Auth(other),
        }
    }
}

impl PipelineError {
    /// Episode the error belongs to, when it is a per-episode failure.
    pub fn episode(&self) -> Option<EpisodeId> {
        match self {
            Self::EntitlementRequired { episode }
            | Self::AcquisitionFailed { episode, .. }
            | Self::FinalizationFailed { episode, .. }
            | Self::HandoffClosed { episode } => Some(*episode),
            _ => None,
        }
    }
}
