use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::params::DownloadParameters;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub download: DownloadParameters,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
}

/// Credentials for the streaming provider.
///
/// Precedence when building a credential: cookie file, then token, then
/// username/password. None of them is required for free content.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Pre-issued bearer token.
    #[serde(default)]
    pub token: Option<String>,
    /// Netscape cookie file handed to yt-dlp.
    #[serde(default)]
    pub cookie_file: Option<PathBuf>,
    /// OAuth token endpoint used for the password grant.
    #[serde(default)]
    pub token_endpoint: Option<String>,
    /// Basic-auth client id sent to the token endpoint.
    #[serde(default)]
    pub client_id: Option<String>,
}

/// External tool locations
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ToolsConfig {
    #[serde(default = "default_ytdlp_path")]
    pub ytdlp_path: PathBuf,
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,
    /// Extra arguments appended to every yt-dlp invocation.
    #[serde(default)]
    pub ytdlp_args: Vec<String>,
    /// Extra arguments appended before the ffmpeg output path.
    #[serde(default)]
    pub ffmpeg_args: Vec<String>,
    /// ffmpeg `-loglevel` value.
    #[serde(default = "default_ffmpeg_log_level")]
    pub ffmpeg_log_level: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ytdlp_path: default_ytdlp_path(),
            ffmpeg_path: default_ffmpeg_path(),
            ytdlp_args: Vec::new(),
            ffmpeg_args: Vec::new(),
            ffmpeg_log_level: default_ffmpeg_log_level(),
        }
    }
}

fn default_ytdlp_path() -> PathBuf {
    PathBuf::from("yt-dlp")
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_ffmpeg_log_level() -> String {
    "error".to_string()
}

/// Sanitized config for logging (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub download: DownloadParameters,
    pub auth: SanitizedAuthConfig,
    pub tools: ToolsConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedAuthConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub password_configured: bool,
    pub token_configured: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cookie_file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_endpoint: Option<String>,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            download: config.download.clone(),
            auth: SanitizedAuthConfig {
                username: config.auth.username.clone(),
                password_configured: config
                    .auth
                    .password
                    .as_ref()
                    .is_some_and(|p| !p.is_empty()),
                token_configured: config.auth.token.as_ref().is_some_and(|t| !t.is_empty()),
                cookie_file: config.auth.cookie_file.clone(),
                token_endpoint: config.auth.token_endpoint.clone(),
            },
            tools: config.tools.clone(),
        }
    }
}
