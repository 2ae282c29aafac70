//! Credentials for connecting to the chat server.
//!
//! How a token is obtained (login form, registration, keychain) is outside
//! the client core. The session only needs the token for the endpoint query
//! and the username to show; [`AuthProvider`] is the seam for that.

use std::fmt;

/// Errors that can occur when obtaining credentials.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// No token was configured.
    #[error("no token configured (use --token or MASSG_TOKEN)")]
    MissingToken,

    /// No username was configured.
    #[error("no username configured (use --username or MASSG_USER)")]
    MissingUsername,
}

/// What the session needs from authentication.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Opaque bearer token sent as the `token` query parameter.
    pub token: String,
    /// Display name of the local user.
    pub username: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("token", &"<redacted>")
            .field("username", &self.username)
            .finish()
    }
}

/// Source of [`Credentials`].
pub trait AuthProvider {
    /// Returns the credentials to connect with.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] if no usable credentials are available.
    fn credentials(&self) -> Result<Credentials, AuthError>;
}

/// Credentials taken as-is from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticAuth {
    token: Option<String>,
    username: Option<String>,
}

impl StaticAuth {
    /// Creates a provider from optional configured values.
    #[must_use]
    pub const fn new(token: Option<String>, username: Option<String>) -> Self {
        Self { token, username }
    }
}

impl AuthProvider for StaticAuth {
    fn credentials(&self) -> Result<Credentials, AuthError> {
        let token = self
            .token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingToken)?;
        let username = self
            .username
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or(AuthError::MissingUsername)?;
        Ok(Credentials {
            token: token.to_string(),
            username: username.to_string(),
        })
    }
}
