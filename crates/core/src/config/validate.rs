use super::{types::Config, ConfigError};
use crate::range::RangeFilter;

/// Validate configuration
/// Currently validates:
/// - Pool sizes and handoff capacity are at least 1
/// - File mask contains `{prefix}` (skip-existing relies on it)
/// - Range expressions are well formed
/// - Username and password are given together
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let download = &config.download;

    if download.download_pool_size == 0 {
        return Err(invalid("download.download_pool_size must be at least 1"));
    }
    if download.encode_pool_size == 0 {
        return Err(invalid("download.encode_pool_size must be at least 1"));
    }
    if download.handoff_capacity == 0 {
        return Err(invalid("download.handoff_capacity must be at least 1"));
    }

    if !download.file_mask.contains("{prefix}") {
        return Err(invalid("download.file_mask must contain {prefix}"));
    }

    RangeFilter::SEASONS
        .parse(download.season_range.as_deref(), 0)
        .map_err(|e| invalid(&format!("download.season_range: {}", e)))?;
    RangeFilter::EPISODES
        .parse(download.episode_range.as_deref(), 0)
        .map_err(|e| invalid(&format!("download.episode_range: {}", e)))?;

    let has_username = config.auth.username.as_ref().is_some_and(|u| !u.is_empty());
    let has_password = config.auth.password.as_ref().is_some_and(|p| !p.is_empty());
    if has_username != has_password {
        return Err(invalid(
            "auth.username and auth.password must be set together",
        ));
    }

    Ok(())
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::ValidationError(message.to_string())
}
