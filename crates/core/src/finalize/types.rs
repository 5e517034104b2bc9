//! Types for the finalize module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::acquire::AcquiredMedia;
use crate::config::DownloadParameters;

/// Encode and merge switches for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizeOptions {
    /// Mux subtitle files into the output.
    pub merge_subtitles: bool,
    /// Re-encode video to HEVC; otherwise streams are copied.
    pub hevc: bool,
    pub nvenc: bool,
    pub hwaccel: bool,
    pub preset: String,
    /// Write the output inside the episode's temporary directory first.
    pub use_temporary_path: bool,
}

impl FinalizeOptions {
    pub fn from_params(params: &DownloadParameters) -> Self {
        Self {
            merge_subtitles: params.subtitles,
            hevc: params.hevc,
            nvenc: params.nvenc,
            hwaccel: params.hwaccel,
            preset: params.preset.clone(),
            use_temporary_path: params.use_temporary_encoding_path,
        }
    }
}

impl Default for FinalizeOptions {
    fn default() -> Self {
        Self::from_params(&DownloadParameters::default())
    }
}

/// One episode to finalize.
#[derive(Debug)]
pub struct FinalizeRequest {
    pub media: AcquiredMedia,
    /// Final destination path.
    pub target: PathBuf,
    pub options: FinalizeOptions,
}

/// Outcome of a successful finalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizedEpisode {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub duration_ms: u64,
}
