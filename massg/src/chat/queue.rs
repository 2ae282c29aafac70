//! Outbound queue of drafts that could not be sent yet.

use std::collections::VecDeque;

use massg_proto::message::Draft;

/// FIFO buffer of unsent drafts.
///
/// Survives any number of reconnect attempts; it is drained only by
/// [`flush`](Self::flush) while a connection is open, or handed back whole
/// by [`drain`](Self::drain) on teardown.
#[derive(Debug, Default)]
pub struct OutboundQueue {
    items: VecDeque<Draft>,
}

impl OutboundQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a draft to the tail.
    pub fn enqueue(&mut self, draft: Draft) {
        self.items.push_back(draft);
    }

    /// Sends queued drafts from the head, one at a time.
    ///
    /// A draft is removed only after `send` accepted it. The first failure
    /// stops the flush and leaves that draft and everything behind it in
    /// place. Returns how many drafts were sent.
    ///
    /// # Errors
    ///
    /// Returns the error of the first failed send.
    pub fn flush<E, F>(&mut self, mut send: F) -> Result<usize, E>
    where
        F: FnMut(&Draft) -> Result<(), E>,
    {
        let mut sent = 0;
        while let Some(draft) = self.items.front() {
            send(draft)?;
            self.items.pop_front();
            sent += 1;
        }
        Ok(sent)
    }

    /// Removes and returns every queued draft, oldest first.
    pub fn drain(&mut self) -> Vec<Draft> {
        self.items.drain(..).collect()
    }

    /// Number of queued drafts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
