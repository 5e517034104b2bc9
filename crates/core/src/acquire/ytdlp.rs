//! yt-dlp backed acquirer.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex_lite::Regex;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, trace};

use super::error::AcquireError;
use super::subtitles::HttpSubtitleFetcher;
use super::traits::Acquirer;
use super::types::{AcquiredFile, AcquiredMedia, AcquisitionRequest};
use crate::config::ToolsConfig;
use crate::discovery::credential_args;
use crate::episode::{sanitize_file_name, InputKind};
use crate::progress::ProgressReporter;

static DOWNLOAD_PROGRESS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[download\]\s+(\d+(?:\.\d+)?)%").expect("download progress pattern is valid")
});

/// Lines of stderr kept for error reports.
const STDERR_LINES: usize = 20;

/// Format selector for dub tracks, which only contribute audio.
const DUB_FORMAT: &str = "bestaudio";

/// One yt-dlp invocation for an episode.
struct DownloadJob<'a> {
    url: &'a str,
    format: &'a str,
    /// File name inside the temporary directory, without extension.
    stem: String,
    remux: bool,
}

/// Downloads episodes by running yt-dlp.
///
/// The media is remuxed into Matroska inside the episode's temporary
/// directory. Each dub track is a separate audio-only download. Subtitle
/// inputs are fetched separately when a fetcher is set.
pub struct YtDlpAcquirer {
    binary: PathBuf,
    extra_args: Vec<String>,
    subtitles: Option<HttpSubtitleFetcher>,
}

impl YtDlpAcquirer {
    pub fn new(tools: &ToolsConfig) -> Self {
        Self {
            binary: tools.ytdlp_path.clone(),
            extra_args: tools.ytdlp_args.clone(),
            subtitles: None,
        }
    }

    pub fn with_subtitle_fetcher(mut self, fetcher: HttpSubtitleFetcher) -> Self {
        self.subtitles = Some(fetcher);
        self
    }

    fn build_args(&self, request: &AcquisitionRequest, job: &DownloadJob<'_>) -> Vec<String> {
        let template = request.temp_dir.join(format!("{}.%(ext)s", job.stem));

        let mut args = vec![
            "--newline".to_string(),
            "--no-warnings".to_string(),
            "--progress".to_string(),
            "-f".to_string(),
            job.format.to_string(),
        ];
        if job.remux {
            args.extend(["--remux-video".to_string(), "mkv".to_string()]);
        }
        args.extend([
            "-o".to_string(),
            template.to_string_lossy().to_string(),
            "--print".to_string(),
            "after_move:filepath".to_string(),
        ]);

        if let Some(credential) = &request.credential {
            args.extend(credential_args(credential));
        }
        args.extend(self.extra_args.iter().cloned());
        args.push(job.url.to_string());

        args
    }

    async fn download(
        &self,
        request: &AcquisitionRequest,
        job: &DownloadJob<'_>,
        progress: &ProgressReporter,
    ) -> Result<PathBuf, AcquireError> {
        let mut child = Command::new(&self.binary)
            .args(self.build_args(request, job))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(false)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    AcquireError::ToolNotFound {
                        path: self.binary.clone(),
                    }
                } else {
                    AcquireError::Io(e)
                }
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AcquireError::download_failed("stdout not captured", None))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| AcquireError::download_failed("stderr not captured", None))?;

        let stderr_progress = progress.clone();
        let stderr_task = tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            let mut tail = VecDeque::with_capacity(STDERR_LINES);
            while let Ok(Some(line)) = lines.next_line().await {
                if let Some(percent) = parse_progress(&line) {
                    stderr_progress.report(percent);
                    continue;
                }
                if tail.len() == STDERR_LINES {
                    tail.pop_front();
                }
                tail.push_back(line);
            }
            tail.into_iter().collect::<Vec<_>>().join("\n")
        });

        let mut output_path = None;
        let mut lines = BufReader::new(stdout).lines();
        while let Some(line) = lines.next_line().await? {
            if let Some(percent) = parse_progress(&line) {
                progress.report(percent);
            } else if let Some(path) = parse_printed_path(&line) {
                output_path = Some(path);
            } else {
                trace!(episode = %progress.episode_id(), "yt-dlp: {}", line);
            }
        }

        let status = child.wait().await?;
        let stderr_tail = stderr_task.await.unwrap_or_default();

        if !status.success() {
            return Err(AcquireError::download_failed(
                format!("yt-dlp exited with code: {:?}", status.code()),
                (!stderr_tail.is_empty()).then_some(stderr_tail),
            ));
        }

        match output_path {
            Some(path) if tokio::fs::try_exists(&path).await.unwrap_or(false) => Ok(path),
            _ => Err(AcquireError::NoOutput {
                dir: request.temp_dir.clone(),
            }),
        }
    }
}

#[async_trait]
impl Acquirer for YtDlpAcquirer {
    fn name(&self) -> &str {
        "yt-dlp"
    }

    async fn acquire(
        &self,
        request: AcquisitionRequest,
        progress: ProgressReporter,
    ) -> Result<AcquiredMedia, AcquireError> {
        tokio::fs::create_dir_all(&request.temp_dir)
            .await
            .map_err(|source| AcquireError::TempDirFailed {
                path: request.temp_dir.clone(),
                source,
            })?;

        let episode = &request.episode;
        let prefix = episode.file_prefix();
        let main = DownloadJob {
            url: &episode.url,
            format: &request.params.format,
            stem: prefix.clone(),
            remux: true,
        };
        let path = self.download(&request, &main, &progress).await?;
        debug!(episode = %episode.id(), path = %path.display(), "Download finished");

        let language = episode
            .inputs_of(InputKind::Video)
            .find_map(|i| i.language.clone());
        let mut files = vec![AcquiredFile::new(path, InputKind::Video, language.as_deref())];

        for (index, track) in episode.dub_tracks.iter().enumerate() {
            let language = track.language.as_deref().unwrap_or("und");
            let job = DownloadJob {
                url: &track.url,
                format: DUB_FORMAT,
                stem: format!("{}.dub{}.{}", prefix, index, sanitize_file_name(language)),
                remux: false,
            };
            let path = self.download(&request, &job, &progress).await?;
            debug!(episode = %episode.id(), dub = language, path = %path.display(), "Dub audio downloaded");
            files.push(AcquiredFile::new(path, InputKind::Audio, track.language.as_deref()));
        }

        if let Some(fetcher) = &self.subtitles {
            if request.params.subtitles {
                files.extend(
                    fetcher
                        .fetch_all(&request.episode, &request.params, &request.temp_dir)
                        .await?,
                );
            }
        }

        Ok(AcquiredMedia {
            episode: request.episode,
            files,
            temp_dir: request.temp_dir,
        })
    }
}

fn parse_progress(line: &str) -> Option<f32> {
    DOWNLOAD_PROGRESS
        .captures(line)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<f32>().ok())
}

/// `--print after_move:filepath` writes the bare path on its own line.
fn parse_printed_path(line: &str) -> Option<PathBuf> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('[') {
        return None;
    }
    let path = Path::new(line);
    path.is_absolute().then(|| path.to_path_buf())
}
