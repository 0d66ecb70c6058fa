//! Authentication methods for HTTP requests
//!
//! Basic and bearer credentials, rendered as one `Authorization` header
//! when the request is built. User info embedded in a URL becomes Basic
//! credentials.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use http::HeaderValue;
use revcache_client::{Result, error};

use crate::builder::core::RequestBuilder;

/// User info section of a URL that cannot become credentials
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UserInfoError {
    #[error("user info should not be empty")]
    Empty,
}

/// Credentials sent in the `Authorization` header
#[derive(Clone, PartialEq, Eq)]
pub enum AuthScheme {
    Basic { username: String, password: String },
    Bearer(String),
}

impl AuthScheme {
    #[must_use]
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        AuthScheme::Basic {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Basic credentials from URL user info: `user`, `:pass` or `user:pass`
    ///
    /// # Errors
    ///
    /// Empty user info is rejected.
    pub fn from_user_info(user_info: &str) -> std::result::Result<Self, UserInfoError> {
        if user_info.is_empty() {
            return Err(UserInfoError::Empty);
        }
        Ok(match user_info.split_once(':') {
            Some((username, password)) => Self::basic(username, password),
            None => Self::basic(user_info, ""),
        })
    }

    /// The `Authorization` header value
    ///
    /// # Errors
    ///
    /// Fails when a bearer token contains bytes not allowed in a header.
    pub fn header_value(&self) -> Result<HeaderValue> {
        let rendered = match self {
            AuthScheme::Basic { username, password } => {
                format!("Basic {}", STANDARD.encode(format!("{username}:{password}")))
            }
            AuthScheme::Bearer(token) => format!("Bearer {token}"),
        };
        let mut value = HeaderValue::from_str(&rendered).map_err(error::invalid_header)?;
        value.set_sensitive(true);
        Ok(value)
    }
}

impl fmt::Debug for AuthScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthScheme::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"[REDACTED]")
                .finish(),
            AuthScheme::Bearer(_) => f.debug_tuple("Bearer").field(&"[REDACTED]").finish(),
        }
    }
}

/// Raw user info of an absolute URL string, if it has an `@` in its authority
pub(crate) fn raw_user_info(url: &str) -> Option<&str> {
    let (_, rest) = url.split_once("://")?;
    let authority = rest.split(['/', '?', '#']).next().unwrap_or(rest);
    authority.rsplit_once('@').map(|(user_info, _)| user_info)
}

impl RequestBuilder {
    /// Authenticate with `scheme`, replacing any earlier credentials
    #[must_use]
    pub fn auth(mut self, scheme: AuthScheme) -> Self {
        self.auth = Some(scheme);
        self
    }

    /// Set basic authentication
    ///
    /// The credentials are base64 encoded when the request is built.
    ///
    /// # Examples
    /// ```no_run
    /// use revcache::{Client, HyperTransport};
    ///
    /// # async fn run() -> revcache::Result<()> {
    /// let response = Client::new(HyperTransport::new())
    ///     .url("https://api.example.com/protected")?
    ///     .basic_auth("username", "password")
    ///     .get()
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    #[must_use]
    pub fn basic_auth(self, username: &str, password: &str) -> Self {
        self.auth(AuthScheme::basic(username, password))
    }

    /// Set bearer token authentication
    #[must_use]
    pub fn bearer_auth(self, token: &str) -> Self {
        self.auth(AuthScheme::Bearer(token.to_string()))
    }

    #[must_use]
    pub fn auth_scheme(&self) -> Option<&AuthScheme> {
        self.auth.as_ref()
    }
}
