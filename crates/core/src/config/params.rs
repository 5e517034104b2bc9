use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::episode::{render_mask, sanitize_file_name, EpisodeDescriptor, DEFAULT_FILE_MASK};

/// Settings for one download run.
///
/// Built once before the run and shared read-only between both stages.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DownloadParameters {
    /// Root of the destination tree.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Put episodes under `<output_dir>/<series>`.
    #[serde(default)]
    pub series_folder: bool,
    /// Put episodes under `Season N`.
    #[serde(default)]
    pub season_folder: bool,
    #[serde(default)]
    pub season_range: Option<String>,
    #[serde(default)]
    pub episode_range: Option<String>,

    /// Include dubbed variants.
    #[serde(default)]
    pub dubs: bool,
    /// Dub languages to keep; empty keeps all.
    #[serde(default)]
    pub dub_languages: Vec<String>,
    /// Merge subtitles into the final file.
    #[serde(default = "default_true")]
    pub subtitles: bool,
    /// Subtitle languages to keep; empty keeps all.
    #[serde(default)]
    pub sub_languages: Vec<String>,

    /// Re-encode video to HEVC.
    #[serde(default = "default_true")]
    pub hevc: bool,
    /// Use the NVENC encoder for HEVC.
    #[serde(default = "default_true")]
    pub nvenc: bool,
    /// Ask ffmpeg for hardware decoding.
    #[serde(default = "default_true")]
    pub hwaccel: bool,
    #[serde(default = "default_preset")]
    pub preset: String,

    #[serde(default = "default_true")]
    pub delete_temporary_files: bool,
    /// Encode into the temporary directory, then move into place.
    #[serde(default = "default_true")]
    pub use_temporary_encoding_path: bool,
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,

    /// yt-dlp format selector.
    #[serde(default = "default_format")]
    pub format: String,
    #[serde(default = "default_download_pool_size")]
    pub download_pool_size: usize,
    #[serde(default = "default_encode_pool_size")]
    pub encode_pool_size: usize,
    /// Capacity of the channel between the two stages.
    #[serde(default = "default_handoff_capacity")]
    pub handoff_capacity: usize,

    #[serde(default = "default_true")]
    pub skip_existing: bool,
    /// File name mask; supports `{prefix}` and `{title}`.
    #[serde(default = "default_file_mask")]
    pub file_mask: String,
}

impl Default for DownloadParameters {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            series_folder: false,
            season_folder: false,
            season_range: None,
            episode_range: None,
            dubs: false,
            dub_languages: Vec::new(),
            subtitles: true,
            sub_languages: Vec::new(),
            hevc: true,
            nvenc: true,
            hwaccel: true,
            preset: default_preset(),
            delete_temporary_files: true,
            use_temporary_encoding_path: true,
            temp_dir: default_temp_dir(),
            format: default_format(),
            download_pool_size: default_download_pool_size(),
            encode_pool_size: default_encode_pool_size(),
            handoff_capacity: default_handoff_capacity(),
            skip_existing: true,
            file_mask: default_file_mask(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_preset() -> String {
    "fast".to_string()
}

fn default_temp_dir() -> PathBuf {
    std::env::temp_dir().join("serialdl")
}

fn default_format() -> String {
    "bestvideo+bestaudio/best".to_string()
}

fn default_download_pool_size() -> usize {
    2
}

fn default_encode_pool_size() -> usize {
    1
}

fn default_handoff_capacity() -> usize {
    4
}

fn default_file_mask() -> String {
    DEFAULT_FILE_MASK.to_string()
}

impl DownloadParameters {
    /// Directory the episode's final file is placed in.
    pub fn destination_dir(&self, episode: &EpisodeDescriptor) -> PathBuf {
        let mut dir = self.output_dir.clone();
        if self.series_folder {
            dir.push(sanitize_file_name(&episode.series));
        }
        if self.season_folder {
            if let Some(season) = episode.season {
                dir.push(format!("Season {}", season));
            }
        }
        dir
    }

    /// Full destination path of the episode's final file.
    pub fn final_path(&self, episode: &EpisodeDescriptor) -> PathBuf {
        let name = render_mask(&self.file_mask, &episode.file_prefix(), &episode.title);
        self.destination_dir(episode)
            .join(format!("{}.mkv", sanitize_file_name(&name)))
    }

    /// Scratch directory holding the episode's downloaded streams.
    pub fn episode_temp_dir(&self, episode: &EpisodeDescriptor) -> PathBuf {
        self.temp_dir
            .join(sanitize_file_name(&episode.series))
            .join(episode.file_prefix())
    }

    /// Whether finalization needs the external tool. When false, the raw
    /// download is moved into place as is.
    pub fn requires_finalizer(&self) -> bool {
        self.subtitles || self.hevc
    }

    pub fn wants_subtitle(&self, language: Option<&str>) -> bool {
        self.subtitles && Self::matches_language(&self.sub_languages, language)
    }

    /// Whether the descriptor survives dub filtering. Undubbed episodes
    /// always do.
    pub fn wants_episode(&self, episode: &EpisodeDescriptor) -> bool {
        if !episode.dubbed {
            return true;
        }
        self.dubs && Self::matches_language(&self.dub_languages, episode.dub_language.as_deref())
    }

    fn matches_language(filter: &[String], language: Option<&str>) -> bool {
        if filter.is_empty() {
            return true;
        }
        language.is_some_and(|lang| filter.iter().any(|f| f.eq_ignore_ascii_case(lang)))
    }
}
