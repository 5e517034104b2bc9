//! Command line arguments.

use clap::Parser;
use std::path::PathBuf;

use serialdl_core::Config;

/// Download every episode of a series, then merge and encode it.
#[derive(Debug, Parser)]
#[command(name = "serialdl", version, about)]
pub struct Cli {
    /// Series URL.
    pub url: String,

    /// Output directory.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Episode range, e.g. `3`, `1-12`, `5-` or `-4`.
    #[arg(short = 'e', long = "episodes", value_name = "RANGE")]
    pub episodes: Option<String>,

    /// Season range, same syntax as `--episodes`.
    #[arg(short = 's', long = "seasons", value_name = "RANGE")]
    pub seasons: Option<String>,

    #[arg(short, long)]
    pub username: Option<String>,

    #[arg(short, long)]
    pub password: Option<String>,

    /// Netscape cookie file handed to yt-dlp.
    #[arg(long, value_name = "FILE")]
    pub cookies: Option<PathBuf>,

    /// Concurrent downloads.
    #[arg(long, value_name = "N")]
    pub download_pool: Option<usize>,

    /// Concurrent encodes.
    #[arg(long, value_name = "N")]
    pub encode_pool: Option<usize>,

    /// Do not download or merge subtitles.
    #[arg(long)]
    pub no_sub: bool,

    /// Subtitle language to keep (repeatable).
    #[arg(long = "sub-language", value_name = "LANG")]
    pub sub_languages: Vec<String>,

    /// Also download dubbed versions.
    #[arg(long)]
    pub dubs: bool,

    /// Dub language to keep (repeatable, implies `--dubs`).
    #[arg(long = "dub-language", value_name = "LANG")]
    pub dub_languages: Vec<String>,

    /// Keep the original video codec.
    #[arg(long)]
    pub no_hevc: bool,

    /// Encode on the CPU.
    #[arg(long)]
    pub no_nvenc: bool,

    /// Download episodes even if their file exists.
    #[arg(long)]
    pub no_skip: bool,

    /// File name mask, `{prefix}` and `{title}` are replaced.
    #[arg(long, value_name = "MASK")]
    pub mask: Option<String>,

    #[arg(long, value_name = "DIR")]
    pub temp_dir: Option<PathBuf>,

    /// Put episodes in a folder named after the series.
    #[arg(long)]
    pub series_folder: bool,

    /// Put episodes in a `Season N` folder.
    #[arg(long)]
    pub season_folder: bool,

    /// TOML configuration file.
    #[arg(short, long, env = "SERIALDL_CONFIG_FILE", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG is set.
    #[arg(short, long)]
    pub verbose: bool,

    /// Print Prometheus metrics when the run ends.
    #[arg(long)]
    pub print_metrics: bool,
}

impl Cli {
    /// Layers the command line over the loaded configuration.
    pub fn apply(&self, config: &mut Config) {
        let download = &mut config.download;

        if let Some(output) = &self.output {
            download.output_dir = output.clone();
        }
        if let Some(range) = &self.episodes {
            download.episode_range = Some(range.clone());
        }
        if let Some(range) = &self.seasons {
            download.season_range = Some(range.clone());
        }
        if let Some(n) = self.download_pool {
            download.download_pool_size = n;
        }
        if let Some(n) = self.encode_pool {
            download.encode_pool_size = n;
        }
        if self.no_sub {
            download.subtitles = false;
        }
        if !self.sub_languages.is_empty() {
            download.sub_languages = self.sub_languages.clone();
        }
        if self.dubs || !self.dub_languages.is_empty() {
            download.dubs = true;
        }
        if !self.dub_languages.is_empty() {
            download.dub_languages = self.dub_languages.clone();
        }
        if self.no_hevc {
            download.hevc = false;
        }
        if self.no_nvenc {
            download.nvenc = false;
        }
        if self.no_skip {
            download.skip_existing = false;
        }
        if let Some(mask) = &self.mask {
            download.file_mask = mask.clone();
        }
        if let Some(dir) = &self.temp_dir {
            download.temp_dir = dir.clone();
        }
        if self.series_folder {
            download.series_folder = true;
        }
        if self.season_folder {
            download.season_folder = true;
        }

        let auth = &mut config.auth;
        if self.username.is_some() {
            auth.username = self.username.clone();
        }
        if self.password.is_some() {
            auth.password = self.password.clone();
        }
        if self.cookies.is_some() {
            auth.cookie_file = self.cookies.clone();
        }
    }
}
