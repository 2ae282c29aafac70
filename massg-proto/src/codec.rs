//! JSON encoding and decoding for `massg` frames.
//!
//! Server → client frames are tagged by a `type` field ([`ServerFrame`]);
//! client → server frames are bare [`Draft`] objects.

use serde::{Deserialize, Serialize};

use crate::message::{Draft, Message};

/// Error type for codec encode/decode operations.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for CodecError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// A frame pushed from the server to a connected client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerFrame {
    /// Full ordered history, sent once right after a connection is accepted.
    History {
        /// Messages oldest first.
        messages: Vec<Message>,
    },
    /// A single newly stored message.
    Message {
        /// The stored message, carrying `client_id` if the author sent one.
        message: Message,
    },
}

/// Encodes a [`ServerFrame`] as a JSON text frame.
///
/// # Errors
///
/// Returns `CodecError::Serialization` if the frame cannot be serialized.
pub fn encode_server(frame: &ServerFrame) -> Result<String, CodecError> {
    Ok(serde_json::to_string(frame)?)
}

/// Decodes a [`ServerFrame`] from JSON text.
///
/// # Errors
///
/// Returns `CodecError::Serialization` for invalid JSON, an unknown `type`,
/// or a payload that does not match the tagged shape.
pub fn decode_server(text: &str) -> Result<ServerFrame, CodecError> {
    Ok(serde_json::from_str(text)?)
}

/// Encodes a [`Draft`] as the outbound JSON text frame.
///
/// # Errors
///
/// Returns `CodecError::Serialization` if the draft cannot be serialized.
pub fn encode_draft(draft: &Draft) -> Result<String, CodecError> {
    Ok(serde_json::to_string(draft)?)
}

/// Decodes a [`Draft`] from JSON text, tolerating missing fields.
///
/// # Errors
///
/// Returns `CodecError::Serialization` if the text is not a JSON object of
/// the expected shape.
pub fn decode_draft(text: &str) -> Result<Draft, CodecError> {
    Ok(serde_json::from_str(text)?)
}
