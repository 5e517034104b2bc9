//! Bearer token acquisition and caching.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::types::{AuthError, LoginCredentials};

/// Tokens this close to expiry are treated as expired.
const EXPIRY_MARGIN_SECS: i64 = 30;

/// An access token and its expiry, if known.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub value: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl AccessToken {
    pub fn new(value: impl Into<String>, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            value: value.into(),
            expires_at,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at
            .is_some_and(|at| at - Duration::seconds(EXPIRY_MARGIN_SECS) <= now)
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Something that can issue a fresh access token.
#[async_trait]
pub trait TokenSource: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch_token(&self) -> Result<AccessToken, AuthError>;
}

/// A pre-issued token, e.g. from `SERIALDL_AUTH__TOKEN`.
pub struct StaticTokenSource {
    token: String,
}

impl StaticTokenSource {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenSource for StaticTokenSource {
    fn name(&self) -> &str {
        "static"
    }

    async fn fetch_token(&self) -> Result<AccessToken, AuthError> {
        Ok(AccessToken::new(self.token.clone(), None))
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// OAuth token endpoint client.
///
/// With a login it performs the password grant; without one it requests an
/// anonymous `client_id` grant, which only covers free content.
pub struct PasswordGrantTokenSource {
    client: reqwest::Client,
    endpoint: String,
    login: Option<LoginCredentials>,
    client_id: Option<String>,
}

impl PasswordGrantTokenSource {
    pub fn new(
        client: reqwest::Client,
        endpoint: impl Into<String>,
        login: Option<LoginCredentials>,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            login,
            client_id: None,
        }
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    fn form(&self) -> Vec<(&'static str, String)> {
        match &self.login {
            Some(login) => vec![
                ("grant_type", "password".to_string()),
                ("username", login.username.clone()),
                ("password", login.password.clone()),
                ("scope", "offline_access".to_string()),
            ],
            None => vec![("grant_type", "client_id".to_string())],
        }
    }
}

#[async_trait]
impl TokenSource for PasswordGrantTokenSource {
    fn name(&self) -> &str {
        "password_grant"
    }

    async fn fetch_token(&self) -> Result<AccessToken, AuthError> {
        let mut request = self.client.post(&self.endpoint).form(&self.form());
        if let Some(client_id) = &self.client_id {
            request = request.basic_auth(client_id, None::<&str>);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AuthError::ServiceUnavailable(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(AuthError::InvalidCredentials(format!(
                "token endpoint answered {}",
                status
            )));
        }
        if !status.is_success() {
            return Err(AuthError::ServiceUnavailable(format!(
                "token endpoint answered {}",
                status
            )));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::ServiceUnavailable(format!("invalid token response: {}", e)))?;

        if self.login.is_some() {
            info!("Authenticated using username/password");
        } else {
            warn!("Authenticated anonymously, premium episodes will be unavailable");
        }

        let expires_at = body
            .expires_in
            .map(|secs| Utc::now() + Duration::seconds(secs));
        Ok(AccessToken::new(body.access_token, expires_at))
    }
}

/// Caches the current bearer token and refreshes it lazily.
///
/// Request code calls [`invalidate`](Self::invalidate) when the server
/// rejects the token; the next [`get_valid_token`](Self::get_valid_token)
/// fetches a new one.
pub struct TokenCache {
    source: Arc<dyn TokenSource>,
    current: Mutex<Option<AccessToken>>,
}

impl TokenCache {
    pub fn new(source: Arc<dyn TokenSource>) -> Self {
        Self {
            source,
            current: Mutex::new(None),
        }
    }

    /// Returns a token that is not known to be expired, fetching one if
    /// needed. Concurrent callers share a single fetch.
    pub async fn get_valid_token(&self) -> Result<String, AuthError> {
        let mut current = self.current.lock().await;

        if let Some(token) = current.as_ref() {
            if !token.is_expired_at(Utc::now()) {
                return Ok(token.value.clone());
            }
            debug!(source = self.source.name(), "Cached token expired");
        }

        let token = self.source.fetch_token().await?;
        debug!(source = self.source.name(), "Fetched new access token");
        let value = token.value.clone();
        *current = Some(token);
        Ok(value)
    }

    /// Drops the cached token.
    pub async fn invalidate(&self) {
        if self.current.lock().await.take().is_some() {
            debug!(source = self.source.name(), "Access token invalidated");
        }
    }
}
