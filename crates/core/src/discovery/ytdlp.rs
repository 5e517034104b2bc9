//! yt-dlp backed discovery.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

use super::error::DiscoveryError;
use super::traits::{Discovery, EpisodeStream};
use crate::auth::Credential;
use crate::config::ToolsConfig;
use crate::episode::{EpisodeDescriptor, EpisodeInput, InputKind, SequenceNumber};

/// Matches the dub marker providers append to titles, e.g. `(English Dub)`.
static DUB_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*\(([^()]+) Dub\)").expect("dub marker pattern is valid"));

/// `availability` values that need an account entitlement.
const PREMIUM_AVAILABILITY: &[&str] = &["premium_only", "subscriber_only", "needs_auth"];

/// Maximum length of captured stderr in errors.
const STDERR_TAIL: usize = 2000;

/// Discovery through `yt-dlp -J`.
pub struct YtDlpDiscovery {
    binary: PathBuf,
    extra_args: Vec<String>,
    format: Option<String>,
    credential: Option<Credential>,
}

impl YtDlpDiscovery {
    pub fn new(tools: &ToolsConfig) -> Self {
        Self {
            binary: tools.ytdlp_path.clone(),
            extra_args: tools.ytdlp_args.clone(),
            format: None,
            credential: None,
        }
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn with_credential(mut self, credential: Option<Credential>) -> Self {
        self.credential = credential;
        self
    }

    fn build_args(&self, url: &str) -> Vec<String> {
        let mut args = vec!["-J".to_string(), "--no-warnings".to_string()];

        if let Some(format) = &self.format {
            args.extend(["-f".to_string(), format.clone()]);
        }
        if let Some(credential) = &self.credential {
            args.extend(credential_args(credential));
        }
        args.extend(self.extra_args.iter().cloned());
        args.push(url.to_string());

        args
    }
}

#[async_trait]
impl Discovery for YtDlpDiscovery {
    fn name(&self) -> &str {
        "yt-dlp"
    }

    async fn discover(&self, url: &str) -> Result<EpisodeStream, DiscoveryError> {
        info!(url, "Getting series information");

        let output = Command::new(&self.binary)
            .args(self.build_args(url))
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    DiscoveryError::ToolNotFound {
                        path: self.binary.clone(),
                    }
                } else {
                    DiscoveryError::Io(e)
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DiscoveryError::ToolFailed {
                exit_code: output.status.code(),
                stderr: tail(&stderr, STDERR_TAIL),
            });
        }

        let entries = parse_document(&String::from_utf8_lossy(&output.stdout))?;
        debug!(url, count = entries.len(), "Series listing parsed");

        Ok(stream::iter(entries).boxed())
    }
}

/// yt-dlp arguments carrying a credential.
pub(crate) fn credential_args(credential: &Credential) -> Vec<String> {
    match credential {
        Credential::CookieJar(path) => {
            vec!["--cookies".to_string(), path.to_string_lossy().to_string()]
        }
        Credential::BearerToken(token) | Credential::AnonymousToken(token) => vec![
            "--add-header".to_string(),
            format!("Authorization:Bearer {}", token),
        ],
        Credential::Login(login) => vec![
            "-u".to_string(),
            login.username.clone(),
            "-p".to_string(),
            login.password.clone(),
        ],
    }
}

#[derive(Debug, Deserialize)]
struct RequestedDownload {
    url: Option<String>,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    vcodec: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SubtitleTrack {
    url: String,
}

#[derive(Debug, Deserialize)]
struct Entry {
    #[serde(default)]
    series: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    episode: Option<String>,
    #[serde(default)]
    episode_number: Option<f64>,
    #[serde(default)]
    season_number: Option<u32>,
    #[serde(default)]
    playlist_index: Option<u32>,
    #[serde(default)]
    webpage_url: Option<String>,
    #[serde(default)]
    original_url: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    availability: Option<String>,
    #[serde(default)]
    requested_downloads: Vec<RequestedDownload>,
    #[serde(default)]
    subtitles: BTreeMap<String, Vec<SubtitleTrack>>,
}

/// Interprets a `yt-dlp -J` document.
///
/// A `video` document yields one entry; a `playlist` yields one per
/// non-null entry. Entries that cannot be interpreted become `Err` items.
pub fn parse_document(
    json: &str,
) -> Result<Vec<Result<EpisodeDescriptor, DiscoveryError>>, DiscoveryError> {
    let root: serde_json::Value = serde_json::from_str(json)
        .map_err(|e| DiscoveryError::invalid_output(format!("not JSON: {}", e)))?;

    let kind = root
        .get("_type")
        .and_then(|t| t.as_str())
        .unwrap_or("video")
        .to_string();

    match kind.as_str() {
        "video" => Ok(vec![to_descriptor(root, None, 0)]),
        "playlist" => {
            let series = root
                .get("series")
                .or_else(|| root.get("title"))
                .and_then(|t| t.as_str())
                .map(str::to_string);

            let entries = match root.get("entries") {
                Some(serde_json::Value::Array(entries)) => entries.clone(),
                _ => return Err(DiscoveryError::invalid_output("playlist without entries")),
            };

            Ok(entries
                .into_iter()
                .filter(|entry| !entry.is_null())
                .enumerate()
                .map(|(index, entry)| to_descriptor(entry, series.as_deref(), index))
                .collect())
        }
        other => Err(DiscoveryError::UnsupportedDocument {
            kind: other.to_string(),
        }),
    }
}

fn to_descriptor(
    value: serde_json::Value,
    playlist_series: Option<&str>,
    index: usize,
) -> Result<EpisodeDescriptor, DiscoveryError> {
    let entry: Entry = serde_json::from_value(value)
        .map_err(|e| DiscoveryError::invalid_output(format!("entry {}: {}", index + 1, e)))?;

    let url = entry
        .webpage_url
        .or(entry.original_url)
        .or(entry.url)
        .ok_or_else(|| DiscoveryError::invalid_output(format!("entry {} has no URL", index + 1)))?;

    let raw_series = entry
        .series
        .or_else(|| playlist_series.map(str::to_string))
        .unwrap_or_else(|| "Unknown Series".to_string());
    let raw_title = entry
        .episode
        .or(entry.title)
        .unwrap_or_else(|| format!("Episode {}", index + 1));

    let dub_language = DUB_MARKER
        .captures(&raw_title)
        .or_else(|| DUB_MARKER.captures(&raw_series))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string());

    let sequence = match (entry.episode_number, entry.playlist_index) {
        (Some(number), _) => SequenceNumber::from_f64(number),
        (None, Some(position)) => SequenceNumber::whole(position),
        (None, None) => SequenceNumber::whole(index as u32 + 1),
    };

    let premium = entry
        .availability
        .as_deref()
        .is_some_and(|a| PREMIUM_AVAILABILITY.contains(&a));

    let mut descriptor = EpisodeDescriptor::new(
        strip_dub_marker(&raw_series),
        entry.season_number,
        sequence,
        strip_dub_marker(&raw_title),
        url,
    )
    .with_premium(premium);
    descriptor.duration_secs = entry.duration;

    if let Some(language) = dub_language {
        descriptor = descriptor.with_dub(language);
    }

    for download in entry.requested_downloads {
        let Some(url) = download.url else { continue };
        let kind = match download.vcodec.as_deref() {
            None | Some("none") | Some("") => InputKind::Audio,
            Some(_) => InputKind::Video,
        };
        descriptor = descriptor.with_input(EpisodeInput::new(url, download.language.as_deref(), kind));
    }

    for (language, tracks) in entry.subtitles {
        for track in tracks {
            descriptor = descriptor.with_input(EpisodeInput::new(
                track.url,
                Some(&language),
                InputKind::Subtitle,
            ));
        }
    }

    Ok(descriptor)
}

fn strip_dub_marker(text: &str) -> String {
    DUB_MARKER.replace_all(text, "").trim().to_string()
}

fn tail(text: &str, max: usize) -> String {
    let trimmed = text.trim();
    let start = trimmed.len().saturating_sub(max);
    let start = (start..=trimmed.len())
        .find(|&i| trimmed.is_char_boundary(i))
        .unwrap_or(trimmed.len());
    trimmed[start..].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::LoginCredentials;
    use crate::episode::EpisodeId;

    const PLAYLIST: &str = r#"{
        "_type": "playlist",
        "title": "Frieren",
        "entries": [
            {
                "series": "Frieren",
                "episode": "The Journey's End",
                "episode_number": 1,
                "season_number": 1,
                "webpage_url": "https://example.com/watch/1",
                "duration": 1440.0,
                "requested_downloads": [
                    {"url": "https://cdn/v1", "vcodec": "avc1.640028", "language": "ja-JP"},
                    {"url": "https://cdn/a1", "vcodec": "none", "language": "ja-JP"}
                ],
                "subtitles": {
                    "en-US": [{"url": "https://cdn/s1.en.ass", "ext": "ass"}]
                }
            },
            null,
            {
                "series": "Frieren",
                "episode": "It Didn't Have to Be Magic... (English Dub)",
                "episode_number": 2,
                "season_number": 1,
                "webpage_url": "https://example.com/watch/2",
                "availability": "premium_only"
            }
        ]
    }"#;

    #[test]
    fn test_parse_playlist() {
        let entries: Vec<EpisodeDescriptor> = parse_document(PLAYLIST)
            .unwrap()
            .into_iter()
            .map(Result::unwrap)
            .collect();

        assert_eq!(entries.len(), 2);

        let first = &entries[0];
        assert_eq!(first.id(), EpisodeId::new(Some(1), 1u32));
        assert_eq!(first.title, "The Journey's End");
        assert_eq!(first.duration_secs, Some(1440.0));
        assert_eq!(first.inputs_of(InputKind::Video).count(), 1);
        assert_eq!(first.inputs_of(InputKind::Audio).count(), 1);
        assert!(first.subbed);
        assert!(!first.premium);

        let second = &entries[1];
        assert!(second.premium);
        assert!(second.dubbed);
        assert_eq!(second.dub_language.as_deref(), Some("English"));
        assert_eq!(second.title, "It Didn't Have to Be Magic...");
    }

    #[test]
    fn test_parse_single_video() {
        let json = r#"{"_type": "video", "title": "Pilot", "webpage_url": "https://x/1", "playlist_index": 4}"#;
        let entries = parse_document(json).unwrap();
        let episode = entries.into_iter().next().unwrap().unwrap();
        assert_eq!(episode.title, "Pilot");
        assert_eq!(episode.season, None);
        assert_eq!(episode.sequence, SequenceNumber::whole(4));
        assert_eq!(episode.series, "Unknown Series");
    }

    #[test]
    fn test_decimal_episode_number() {
        let json = r#"{"title": "Recap", "webpage_url": "https://x/r", "episode_number": 12.5, "season_number": 1}"#;
        let episode = parse_document(json).unwrap().remove(0).unwrap();
        assert_eq!(episode.sequence, SequenceNumber::from_f64(12.5));
    }

    #[test]
    fn test_entry_without_url_is_an_item_error() {
        let json = r#"{"_type": "playlist", "title": "S", "entries": [{"title": "no url"}]}"#;
        let entries = parse_document(json).unwrap();
        assert!(matches!(entries[0], Err(DiscoveryError::InvalidOutput { .. })));
    }

    #[test]
    fn test_unsupported_document() {
        let json = r#"{"_type": "url", "url": "https://x"}"#;
        assert!(matches!(
            parse_document(json),
            Err(DiscoveryError::UnsupportedDocument { .. })
        ));
        assert!(parse_document("not json").is_err());
    }

    #[test]
    fn test_build_args() {
        let discovery = YtDlpDiscovery::new(&ToolsConfig::default())
            .with_format("best")
            .with_credential(Some(Credential::Login(LoginCredentials {
                username: "u".to_string(),
                password: "p".to_string(),
            })));

        let args = discovery.build_args("https://x/series");
        assert_eq!(
            args,
            vec!["-J", "--no-warnings", "-f", "best", "-u", "u", "-p", "p", "https://x/series"]
        );
    }

    #[test]
    fn test_credential_args() {
        assert_eq!(
            credential_args(&Credential::BearerToken("t".to_string())),
            vec!["--add-header", "Authorization:Bearer t"]
        );
        assert_eq!(
            credential_args(&Credential::CookieJar(PathBuf::from("/c.txt"))),
            vec!["--cookies", "/c.txt"]
        );
    }

    #[test]
    fn test_tail_respects_char_boundaries() {
        assert_eq!(tail("  abcdef  ", 3), "def");
        assert_eq!(tail("ééé", 3), "é");
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let tools = ToolsConfig {
            ytdlp_path: PathBuf::from("/nonexistent/yt-dlp"),
            ..Default::default()
        };
        let result = YtDlpDiscovery::new(&tools).discover("https://x").await;
        assert!(matches!(result, Err(DiscoveryError::ToolNotFound { .. })));
    }
}
