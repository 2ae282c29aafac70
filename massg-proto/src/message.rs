//! Message types for the `massg` wire protocol.
//!
//! [`Message`] is the server-confirmed form of a chat line, [`Draft`] is what
//! a client sends before the server has seen it. The two are tied together by
//! a client-generated [`ClientId`] that the server echoes back.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum allowed draft text size in bytes (64 KB).
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// Username reserved for server notices. Messages from it are never shown.
pub const SYSTEM_USERNAME: &str = "system";

/// Client-generated correlation id matching a draft to its server echo.
///
/// Opaque on the wire: the server stores nothing about it and only copies it
/// into the broadcast of the message it came with.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(String);

impl ClientId {
    /// Creates a fresh, time-ordered correlation id (UUID v7).
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Wraps an existing id string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the id carries no characters at all.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Seconds since the UNIX epoch, as sent by the server.
///
/// The server writes whole seconds, but any JSON number is accepted.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(f64);

impl Timestamp {
    /// Creates a timestamp for the current instant, truncated to whole seconds.
    #[must_use]
    pub fn now() -> Self {
        let secs = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        Self::from_secs(secs)
    }

    /// Creates a timestamp from whole seconds since the UNIX epoch.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub const fn from_secs(secs: u64) -> Self {
        Self(secs as f64)
    }

    /// Creates a timestamp from fractional seconds since the UNIX epoch.
    #[must_use]
    pub const fn from_secs_f64(secs: f64) -> Self {
        Self(secs)
    }

    /// Returns the timestamp as fractional seconds since the UNIX epoch.
    #[must_use]
    pub const fn as_secs_f64(&self) -> f64 {
        self.0
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}s", self.0)
    }
}

/// A server-confirmed chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Server-assigned message id, absent on older servers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Author's display name.
    pub username: String,
    /// Message text, possibly empty when only an image was sent.
    #[serde(default)]
    pub text: String,
    /// Image reference; the server sends `""` when there is none.
    #[serde(default)]
    pub image_url: Option<String>,
    /// When the server stored the message.
    pub created_at: Timestamp,
    /// Correlation id echoed back to the author's connections.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<ClientId>,
}

impl Message {
    /// Whether this message comes from the reserved `system` user.
    #[must_use]
    pub fn is_system(&self) -> bool {
        self.username == SYSTEM_USERNAME
    }

    /// The image reference, with `""` treated as no image.
    #[must_use]
    pub fn image(&self) -> Option<&str> {
        self.image_url.as_deref().filter(|url| !url.is_empty())
    }
}

/// A client-authored message before the server has confirmed it.
///
/// Serializes to the outbound frame `{ text, image_url, client_id }`. The
/// server reads every field leniently, so a missing field decodes to empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draft {
    /// Message text.
    #[serde(default)]
    pub text: String,
    /// Image reference obtained from an upload, or `""`.
    #[serde(default)]
    pub image_url: String,
    /// Correlation id, present on every draft this client produces.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<ClientId>,
}

/// Error returned when a draft fails validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Neither text nor image was given.
    #[error("message has neither text nor image")]
    Empty,
    /// Draft text exceeds the maximum allowed size.
    #[error("message too large ({size} bytes, max {max} bytes)")]
    TooLarge {
        /// Actual size of the text in bytes.
        size: usize,
        /// Maximum allowed size in bytes.
        max: usize,
    },
}

impl Draft {
    /// Builds a draft with a freshly generated [`ClientId`].
    ///
    /// Text and image reference are trimmed, the same way the server trims
    /// them before deciding whether to store the message.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::Empty`] if both are blank after trimming,
    /// or [`ValidationError::TooLarge`] if the text exceeds
    /// [`MAX_MESSAGE_SIZE`].
    pub fn new(text: &str, image_url: Option<&str>) -> Result<Self, ValidationError> {
        let draft = Self {
            text: text.trim().to_string(),
            image_url: image_url.map(str::trim).unwrap_or_default().to_string(),
            client_id: Some(ClientId::generate()),
        };
        draft.validate()?;
        Ok(draft)
    }

    /// Validates this draft for sending.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::Empty`] if both fields are blank, or
    /// [`ValidationError::TooLarge`] if the text exceeds
    /// [`MAX_MESSAGE_SIZE`].
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.text.trim().is_empty() && self.image_url.trim().is_empty() {
            return Err(ValidationError::Empty);
        }
        let size = self.text.len();
        if size > MAX_MESSAGE_SIZE {
            return Err(ValidationError::TooLarge {
                size,
                max: MAX_MESSAGE_SIZE,
            });
        }
        Ok(())
    }

    /// The image reference, with `""` treated as no image.
    #[must_use]
    pub fn image(&self) -> Option<&str> {
        Some(self.image_url.as_str()).filter(|url| !url.is_empty())
    }
}
