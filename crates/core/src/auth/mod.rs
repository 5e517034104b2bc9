mod token;
mod types;

pub use token::*;
pub use types::*;

use std::sync::Arc;
use tracing::info;

use crate::config::AuthConfig;

/// Credential and token cache built from the `[auth]` section.
pub struct ResolvedAuth {
    pub credential: Option<Credential>,
    /// Present when a token or token endpoint is configured.
    pub tokens: Option<Arc<TokenCache>>,
}

/// Builds the token cache for the configured token source, if any.
pub fn create_token_cache(
    config: &AuthConfig,
    client: &reqwest::Client,
) -> Result<Option<Arc<TokenCache>>, AuthError> {
    let login = LoginCredentials::from_parts(config.username.as_deref(), config.password.as_deref())?;

    if let Some(token) = config.token.as_ref().filter(|t| !t.is_empty()) {
        return Ok(Some(Arc::new(TokenCache::new(Arc::new(
            StaticTokenSource::new(token.clone()),
        )))));
    }

    let Some(endpoint) = config.token_endpoint.as_ref() else {
        return Ok(None);
    };
    let mut source = PasswordGrantTokenSource::new(client.clone(), endpoint.clone(), login);
    if let Some(client_id) = &config.client_id {
        source = source.with_client_id(client_id.clone());
    }
    Ok(Some(Arc::new(TokenCache::new(Arc::new(source)))))
}

/// Resolves the credential handed to the acquisition tool.
///
/// Precedence: cookie file, then a bearer token (configured or obtained
/// from the token endpoint), then a plain login. A token obtained without a
/// login comes from the anonymous grant and is not entitled to premium
/// episodes. No credential at all is valid; premium episodes then fail
/// individually.
pub async fn resolve_auth(
    config: &AuthConfig,
    client: &reqwest::Client,
) -> Result<ResolvedAuth, AuthError> {
    let login = LoginCredentials::from_parts(config.username.as_deref(), config.password.as_deref())?;
    let tokens = create_token_cache(config, client)?;

    let credential = if let Some(path) = &config.cookie_file {
        if !path.exists() {
            return Err(AuthError::ConfigurationError(format!(
                "cookie file not found: {}",
                path.display()
            )));
        }
        Some(Credential::CookieJar(path.clone()))
    } else if let Some(cache) = &tokens {
        let token = cache.get_valid_token().await?;
        let configured = config.token.as_ref().is_some_and(|t| !t.is_empty());
        if configured || login.is_some() {
            Some(Credential::BearerToken(token))
        } else {
            Some(Credential::AnonymousToken(token))
        }
    } else {
        login.map(Credential::Login)
    };

    match &credential {
        Some(c) if !c.is_entitled() => {
            info!(kind = c.kind(), "Using anonymous credential, premium episodes will be skipped")
        }
        Some(c) => info!(kind = c.kind(), "Using credential"),
        None => info!("No credential configured, premium episodes will be skipped"),
    }

    Ok(ResolvedAuth { credential, tokens })
}
