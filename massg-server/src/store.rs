//! In-memory message history.
//!
//! The [`HistoryStore`] keeps every accepted message in arrival order, capped
//! at a configurable maximum; when the cap is exceeded the oldest message is
//! dropped. The full ordered history is replayed to every new connection.

use std::collections::VecDeque;

use massg_proto::message::{Message, Timestamp};
use parking_lot::RwLock;
use uuid::Uuid;

/// Default maximum number of messages kept before FIFO eviction.
const DEFAULT_MAX_HISTORY: usize = 1000;

/// Ordered, capped message history.
pub struct HistoryStore {
    messages: RwLock<VecDeque<Message>>,
    max_history: usize,
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl HistoryStore {
    /// Creates an empty store with the default cap.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_history(DEFAULT_MAX_HISTORY)
    }

    /// Creates an empty store with a custom cap.
    #[must_use]
    pub fn with_max_history(max_history: usize) -> Self {
        Self {
            messages: RwLock::new(VecDeque::new()),
            max_history,
        }
    }

    /// Stores a new message and returns the stored copy.
    ///
    /// The message gets a fresh id and the current time. No correlation id
    /// is stored; callers attach it to the broadcast copy only.
    pub fn append(&self, username: &str, text: &str, image_url: &str) -> Message {
        let message = Message {
            id: Some(Uuid::new_v4().simple().to_string()),
            username: username.to_string(),
            text: text.to_string(),
            image_url: Some(image_url.to_string()),
            created_at: Timestamp::now(),
            client_id: None,
        };
        let mut messages = self.messages.write();
        messages.push_back(message.clone());
        while messages.len() > self.max_history {
            messages.pop_front();
        }
        drop(messages);
        message
    }

    /// Returns the whole history, oldest first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.read().iter().cloned().collect()
    }

    /// Number of stored messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.read().len()
    }

    /// Whether no message has been stored yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.read().is_empty()
    }
}
