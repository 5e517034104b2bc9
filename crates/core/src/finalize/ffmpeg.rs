//! FFmpeg-based finalizer implementation.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex_lite::Regex;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::debug;

use super::error::FinalizeError;
use super::mover::{partial_path, FileMover};
use super::traits::Finalizer;
use super::types::{FinalizeOptions, FinalizeRequest, FinalizedEpisode};
use crate::acquire::{AcquiredFile, AcquiredMedia};
use crate::config::ToolsConfig;
use crate::episode::InputKind;
use crate::progress::ProgressReporter;

static OUT_TIME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"out_time_ms=(\d+)").expect("out_time pattern is valid"));

/// FFmpeg-based finalizer.
///
/// Muxes the downloaded video with its extra audio and subtitle files and
/// optionally re-encodes to HEVC. Output goes to a scratch path first and
/// is moved over the target only after ffmpeg succeeded.
pub struct FfmpegFinalizer {
    ffmpeg_path: PathBuf,
    log_level: String,
    extra_args: Vec<String>,
    mover: FileMover,
}

impl FfmpegFinalizer {
    pub fn new(tools: &ToolsConfig) -> Self {
        Self {
            ffmpeg_path: tools.ffmpeg_path.clone(),
            log_level: tools.ffmpeg_log_level.clone(),
            extra_args: tools.ffmpeg_args.clone(),
            mover: FileMover::new(),
        }
    }

    /// Where ffmpeg writes before the result is moved to `target`.
    fn scratch_path(media: &AcquiredMedia, target: &Path, options: &FinalizeOptions) -> PathBuf {
        if options.use_temporary_path {
            let name = target
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "output.mkv".to_string());
            media.temp_dir.join(format!("encoded.{}", name))
        } else {
            partial_path(target)
        }
    }

    /// Builds ffmpeg arguments for merging and encoding.
    fn build_args(
        &self,
        primary: &AcquiredFile,
        media: &AcquiredMedia,
        options: &FinalizeOptions,
        output: &Path,
    ) -> Vec<String> {
        let mut args = vec!["-y".to_string()];

        // Hardware decoding
        if options.hwaccel {
            let accel = if options.hevc && options.nvenc {
                "cuda"
            } else {
                "auto"
            };
            args.extend(["-hwaccel".to_string(), accel.to_string()]);
        }

        args.extend(["-i".to_string(), primary.path.to_string_lossy().to_string()]);

        let audio: Vec<&AcquiredFile> = media
            .files_of(InputKind::Audio)
            .filter(|f| f.path != primary.path)
            .collect();
        let subtitles: Vec<&AcquiredFile> = if options.merge_subtitles {
            media.files_of(InputKind::Subtitle).collect()
        } else {
            Vec::new()
        };

        for file in audio.iter().chain(subtitles.iter()) {
            args.extend(["-i".to_string(), file.path.to_string_lossy().to_string()]);
        }

        // Stream mapping: primary first, then extra audio, then subtitles
        args.extend([
            "-map".to_string(),
            "0:v?".to_string(),
            "-map".to_string(),
            "0:a?".to_string(),
        ]);
        for index in 1..=audio.len() {
            args.extend(["-map".to_string(), format!("{}:a", index)]);
        }
        let first_subtitle = audio.len() + 1;
        for offset in 0..subtitles.len() {
            args.extend(["-map".to_string(), format!("{}:s", first_subtitle + offset)]);
        }

        // Language tags for mapped extra audio and subtitle files
        for (index, file) in audio.iter().enumerate() {
            if let Some(lang) = &file.language {
                args.extend([
                    format!("-metadata:s:a:{}", index + 1),
                    format!("language={}", lang),
                ]);
            }
        }
        for (index, file) in subtitles.iter().enumerate() {
            if let Some(lang) = &file.language {
                args.extend([
                    format!("-metadata:s:s:{}", index),
                    format!("language={}", lang),
                ]);
            }
        }

        // Video codec
        if options.hevc {
            let encoder = if options.nvenc { "hevc_nvenc" } else { "libx265" };
            args.extend([
                "-c:v".to_string(),
                encoder.to_string(),
                "-preset".to_string(),
                options.preset.clone(),
            ]);
        } else {
            args.extend(["-c:v".to_string(), "copy".to_string()]);
        }
        args.extend([
            "-c:a".to_string(),
            "copy".to_string(),
            "-c:s".to_string(),
            "copy".to_string(),
        ]);

        // Log level and progress
        args.extend([
            "-loglevel".to_string(),
            self.log_level.clone(),
            "-progress".to_string(),
            "pipe:2".to_string(),
        ]);

        args.extend(self.extra_args.iter().cloned());

        // Matroska output regardless of the scratch file name
        args.extend(["-f".to_string(), "matroska".to_string()]);
        args.push(output.to_string_lossy().to_string());

        args
    }

    async fn run_ffmpeg(
        &self,
        args: Vec<String>,
        duration_secs: Option<f64>,
        progress: &ProgressReporter,
    ) -> Result<(), FinalizeError> {
        let mut child = Command::new(&self.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(false)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    FinalizeError::FfmpegNotFound {
                        path: self.ffmpeg_path.clone(),
                    }
                } else {
                    FinalizeError::Io(e)
                }
            })?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| FinalizeError::encode_failed("stderr not captured", None))?;
        let mut reader = BufReader::new(stderr).lines();
        let mut error_output = String::new();

        while let Some(line) = reader.next_line().await? {
            if line.contains("Error") || line.contains("error") {
                error_output.push_str(&line);
                error_output.push('\n');
            }

            if let Some(percent) = parse_out_time(&line).and_then(|t| percent_of(t, duration_secs)) {
                progress.report(percent);
            }
        }

        let status = child.wait().await?;
        if !status.success() {
            return Err(FinalizeError::encode_failed(
                format!("FFmpeg exited with code: {:?}", status.code()),
                (!error_output.is_empty()).then_some(error_output),
            ));
        }

        Ok(())
    }
}

#[async_trait]
impl Finalizer for FfmpegFinalizer {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn finalize(
        &self,
        request: FinalizeRequest,
        progress: ProgressReporter,
    ) -> Result<FinalizedEpisode, FinalizeError> {
        let start = Instant::now();
        let FinalizeRequest {
            media,
            target,
            options,
        } = request;

        let primary = media.primary().ok_or_else(|| FinalizeError::NoInput {
            episode: media.episode.id().to_string(),
        })?;
        if !tokio::fs::try_exists(&primary.path).await.unwrap_or(false) {
            return Err(FinalizeError::InputNotFound {
                path: primary.path.clone(),
            });
        }

        let scratch = Self::scratch_path(&media, &target, &options);
        let args = self.build_args(primary, &media, &options, &scratch);
        debug!(episode = %media.episode.id(), ?args, "Running ffmpeg");

        if let Err(e) = self
            .run_ffmpeg(args, media.episode.duration_secs, &progress)
            .await
        {
            let _ = tokio::fs::remove_file(&scratch).await;
            return Err(e);
        }

        let size_bytes = self.mover.move_file(&scratch, &target).await?;

        Ok(FinalizedEpisode {
            path: target,
            size_bytes,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }
}

/// Seconds of output written so far, from a `-progress` line.
fn parse_out_time(line: &str) -> Option<f64> {
    OUT_TIME
        .captures(line)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .map(|us| us / 1_000_000.0)
}

fn percent_of(time_secs: f64, duration_secs: Option<f64>) -> Option<f32> {
    match duration_secs {
        Some(duration) if duration > 0.0 => Some((time_secs / duration * 100.0).min(100.0) as f32),
        _ => None,
    }
}
