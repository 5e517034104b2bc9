//! Types for the progress module.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::episode::EpisodeId;

/// What happened to an episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProgressKind {
    /// Work on the episode started.
    Started,
    /// Intermediate progress of the current step, in percent.
    Progress { percent: f32 },
    /// The episode's output is in place.
    Completed,
    /// The episode failed.
    Failed,
}

impl ProgressKind {
    pub(crate) fn rank(&self) -> u8 {
        match self {
            ProgressKind::Started => 0,
            ProgressKind::Progress { .. } => 1,
            ProgressKind::Completed | ProgressKind::Failed => 2,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ProgressKind::Completed | ProgressKind::Failed)
    }
}

/// A progress event for one episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub timestamp: DateTime<Utc>,
    pub episode_id: EpisodeId,
    #[serde(flatten)]
    pub kind: ProgressKind,
    /// Human readable detail (destination path, error message, step name).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
}
