use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Username and password must be supplied together")]
    MissingCredential,

    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("Authentication service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

/// Username/password pair for the provider account.
#[derive(Clone, PartialEq, Eq)]
pub struct LoginCredentials {
    pub username: String,
    pub password: String,
}

impl LoginCredentials {
    /// Builds a login from optional halves.
    ///
    /// Neither half yields `Ok(None)`; exactly one yields
    /// [`AuthError::MissingCredential`]. Empty strings count as absent.
    pub fn from_parts(
        username: Option<&str>,
        password: Option<&str>,
    ) -> Result<Option<Self>, AuthError> {
        let username = username.filter(|u| !u.is_empty());
        let password = password.filter(|p| !p.is_empty());

        match (username, password) {
            (Some(username), Some(password)) => Ok(Some(Self {
                username: username.to_string(),
                password: password.to_string(),
            })),
            (None, None) => Ok(None),
            _ => Err(AuthError::MissingCredential),
        }
    }
}

impl fmt::Debug for LoginCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Opaque credential handed to the acquisition tool unmodified.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// Netscape cookie file.
    CookieJar(PathBuf),
    /// Bearer token sent as an `Authorization` header.
    BearerToken(String),
    /// Token from the anonymous grant. Sent like a bearer token but only
    /// covers free content.
    AnonymousToken(String),
    /// Account login the tool performs itself.
    Login(LoginCredentials),
}

impl Credential {
    pub fn kind(&self) -> &'static str {
        match self {
            Credential::CookieJar(_) => "cookie_jar",
            Credential::BearerToken(_) => "bearer_token",
            Credential::AnonymousToken(_) => "anonymous_token",
            Credential::Login(_) => "login",
        }
    }

    /// Whether the credential belongs to an account that can open premium
    /// episodes.
    pub fn is_entitled(&self) -> bool {
        !matches!(self, Credential::AnonymousToken(_))
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::CookieJar(path) => f.debug_tuple("CookieJar").field(path).finish(),
            Credential::BearerToken(_) => f.debug_tuple("BearerToken").field(&"<redacted>").finish(),
            Credential::AnonymousToken(_) => {
                f.debug_tuple("AnonymousToken").field(&"<redacted>").finish()
            }
            Credential::Login(login) => f.debug_tuple("Login").field(login).finish(),
        }
    }
}
