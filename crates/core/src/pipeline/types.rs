//! Types for the pipeline module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

use super::error::PipelineError;
use crate::episode::EpisodeId;
use crate::pool::PoolStatus;

/// Lifecycle of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Idle,
    Filtering,
    Running,
    Draining,
    Completed,
    Failed,
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Filtering => "filtering",
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// Terminal status of one episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EpisodeStatus {
    Completed,
    Skipped,
    Failed,
}

/// Terminal record of one episode, emitted exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineResult {
    pub episode_id: EpisodeId,
    pub status: EpisodeStatus,
    /// Final file, or the existing file for skipped episodes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PipelineResult {
    pub fn completed(episode_id: EpisodeId, path: PathBuf) -> Self {
        Self {
            episode_id,
            status: EpisodeStatus::Completed,
            path: Some(path),
            error: None,
        }
    }

    pub fn skipped(episode_id: EpisodeId, existing: PathBuf) -> Self {
        Self {
            episode_id,
            status: EpisodeStatus::Skipped,
            path: Some(existing),
            error: None,
        }
    }

    pub fn failed(episode_id: EpisodeId, error: &PipelineError) -> Self {
        Self {
            episode_id,
            status: EpisodeStatus::Failed,
            path: None,
            error: Some(error.to_string()),
        }
    }
}

/// What a stage hands back once its pool drained.
#[derive(Debug)]
pub struct StageReport {
    pub results: Vec<PipelineResult>,
    pub pool: PoolStatus,
    /// First failure of the stage, in completion order.
    pub error: Option<PipelineError>,
}

/// Outcome of a whole run.
#[derive(Debug)]
pub struct RunReport {
    pub run_id: Uuid,
    pub state: PipelineState,
    pub results: Vec<PipelineResult>,
    pub error: Option<PipelineError>,
}

impl RunReport {
    pub fn count(&self, status: EpisodeStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }

    pub fn is_success(&self) -> bool {
        self.state == PipelineState::Completed
    }

    /// The per-episode results, or the first error of a failed run.
    pub fn into_result(self) -> Result<Vec<PipelineResult>, PipelineError> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.results),
        }
    }
}
