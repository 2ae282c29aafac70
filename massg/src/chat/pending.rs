//! Registry of optimistic messages waiting for their server echo.

use std::collections::HashMap;

use massg_proto::message::{ClientId, Draft};

/// One locally rendered message the server has not confirmed yet.
#[derive(Debug)]
pub struct PendingEntry<H> {
    /// The view's placeholder for this message.
    pub handle: H,
    /// What was (or will be) sent.
    pub draft: Draft,
    seq: u64,
}

/// Maps correlation ids to placeholders awaiting confirmation.
///
/// An entry is removed only when its echo is matched, so each id resolves
/// at most once. Entries never expire: an echo that arrives after any
/// number of reconnects and history replays still finds its placeholder.
#[derive(Debug)]
pub struct PendingRegistry<H> {
    entries: HashMap<ClientId, PendingEntry<H>>,
    next_seq: u64,
}

impl<H> Default for PendingRegistry<H> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            next_seq: 0,
        }
    }
}

impl<H> PendingRegistry<H> {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a placeholder for `client_id`.
    ///
    /// Re-registering an id replaces the old entry.
    pub fn register(&mut self, client_id: ClientId, handle: H, draft: Draft) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert(client_id, PendingEntry { handle, draft, seq });
    }

    /// Removes and returns the entry for `client_id`, if any.
    pub fn take(&mut self, client_id: &ClientId) -> Option<PendingEntry<H>> {
        self.entries.remove(client_id)
    }

    /// Renders every entry again through `render`, in registration order,
    /// and stores the new handles.
    ///
    /// Used after the view was cleared for a history replay. No entry is
    /// removed.
    pub fn rerender<F>(&mut self, mut render: F)
    where
        F: FnMut(&Draft) -> H,
    {
        let mut entries: Vec<&mut PendingEntry<H>> = self.entries.values_mut().collect();
        entries.sort_by_key(|entry| entry.seq);
        for entry in entries {
            entry.handle = render(&entry.draft);
        }
    }

    /// Removes every entry, in registration order.
    pub fn drain(&mut self) -> Vec<PendingEntry<H>> {
        let mut entries: Vec<PendingEntry<H>> = self.entries.drain().map(|(_, e)| e).collect();
        entries.sort_by_key(|entry| entry.seq);
        entries
    }

    /// Number of unconfirmed entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
