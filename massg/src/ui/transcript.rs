//! In-memory transcript view.
//!
//! Keeps the rendered conversation as a list of [`Entry`] values. The
//! console front end does not need it, but tests and any embedding that
//! wants to inspect what the session rendered do. A transcript shared
//! behind `Arc<Mutex<_>>` is itself a [`View`], so it can be handed to a
//! session running on another task and read from outside.

use std::sync::Arc;

use massg_proto::message::{ClientId, Draft, Message, Timestamp};
use parking_lot::Mutex;

use super::View;
use crate::chat::ConnectionState;

/// Handle to one rendered entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryId(u64);

/// Whether an entry is still an optimistic placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
    /// Rendered locally, no echo yet.
    Sending,
    /// Server-confirmed.
    Confirmed,
}

/// One line of the transcript.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    /// Handle of this entry.
    pub id: EntryId,
    /// Author; `None` until a placeholder is confirmed.
    pub username: Option<String>,
    /// Message text.
    pub text: String,
    /// Image reference, if any.
    pub image_url: Option<String>,
    /// Server timestamp; `None` while sending.
    pub created_at: Option<Timestamp>,
    /// Correlation id of a local message.
    pub client_id: Option<ClientId>,
    /// Placeholder or confirmed.
    pub status: EntryStatus,
}

/// Rendered conversation plus connection history.
#[derive(Debug, Default)]
pub struct Transcript {
    entries: Vec<Entry>,
    next_id: u64,
    states: Vec<ConnectionState>,
    notices: Vec<String>,
    cleared: usize,
}

/// A transcript shared between a running session and its observers.
pub type SharedTranscript = Arc<Mutex<Transcript>>;

impl Transcript {
    /// Creates an empty transcript.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty transcript ready to be shared.
    #[must_use]
    pub fn shared() -> SharedTranscript {
        Arc::new(Mutex::new(Self::new()))
    }

    /// Entries in display order.
    #[must_use]
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Looks up an entry by handle.
    #[must_use]
    pub fn entry(&self, id: EntryId) -> Option<&Entry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Texts in display order.
    #[must_use]
    pub fn texts(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.text.as_str()).collect()
    }

    /// Number of entries with the given status.
    #[must_use]
    pub fn count(&self, status: EntryStatus) -> usize {
        self.entries.iter().filter(|e| e.status == status).count()
    }

    /// Every connection state reported so far, oldest first.
    #[must_use]
    pub fn states(&self) -> &[ConnectionState] {
        &self.states
    }

    /// The most recently reported connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.states.last().copied().unwrap_or_default()
    }

    /// Notices shown so far.
    #[must_use]
    pub fn notices(&self) -> &[String] {
        &self.notices
    }

    /// How many times the display was cleared.
    #[must_use]
    pub const fn cleared(&self) -> usize {
        self.cleared
    }

    fn push(&mut self, mut entry: Entry) -> EntryId {
        let id = EntryId(self.next_id);
        self.next_id += 1;
        entry.id = id;
        self.entries.push(entry);
        id
    }

    fn confirmed(message: &Message) -> Entry {
        Entry {
            id: EntryId(0),
            username: Some(message.username.clone()),
            text: message.text.clone(),
            image_url: message.image().map(str::to_string),
            created_at: Some(message.created_at),
            client_id: message.client_id.clone(),
            status: EntryStatus::Confirmed,
        }
    }
}

impl View for Transcript {
    type Handle = EntryId;

    fn render_pending(&mut self, draft: &Draft) -> EntryId {
        self.push(Entry {
            id: EntryId(0),
            username: None,
            text: draft.text.clone(),
            image_url: draft.image().map(str::to_string),
            created_at: None,
            client_id: draft.client_id.clone(),
            status: EntryStatus::Sending,
        })
    }

    fn confirm(&mut self, handle: &EntryId, message: &Message) {
        let confirmed = Self::confirmed(message);
        if let Some(entry) = self.entries.iter_mut().find(|e| e.id == *handle) {
            *entry = Entry {
                id: entry.id,
                ..confirmed
            };
        } else {
            self.push(confirmed);
        }
    }

    fn append(&mut self, message: &Message) {
        self.push(Self::confirmed(message));
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.cleared += 1;
    }

    fn connection_changed(&mut self, state: ConnectionState) {
        self.states.push(state);
    }

    fn notice(&mut self, text: &str) {
        self.notices.push(text.to_string());
    }
}

impl View for SharedTranscript {
    type Handle = EntryId;

    fn render_pending(&mut self, draft: &Draft) -> EntryId {
        self.lock().render_pending(draft)
    }

    fn confirm(&mut self, handle: &EntryId, message: &Message) {
        self.lock().confirm(handle, message);
    }

    fn append(&mut self, message: &Message) {
        self.lock().append(message);
    }

    fn clear(&mut self) {
        self.lock().clear();
    }

    fn connection_changed(&mut self, state: ConnectionState) {
        self.lock().connection_changed(state);
    }

    fn notice(&mut self, text: &str) {
        self.lock().notice(text);
    }
}
