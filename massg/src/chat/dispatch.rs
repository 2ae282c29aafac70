//! Inbound frame dispatch and echo reconciliation.
//!
//! Every text frame from the current connection is decoded as a
//! [`ServerFrame`]. A `history` frame replaces the display; a `message`
//! frame is matched against the pending registry by `client_id`. Frames
//! that fail to decode are logged and dropped without touching state.

use massg_proto::codec::{self, ServerFrame};
use massg_proto::message::Message;

use crate::transport::ConnectionId;
use crate::ui::View;

use super::{ChatSession, ConnectionState, Runtime};

impl<R: Runtime, V: View> ChatSession<R, V> {
    pub(super) fn on_frame(&mut self, id: ConnectionId, text: &str) {
        if !self.is_current(id) || self.state != ConnectionState::Open {
            tracing::debug!(conn = %id, "ignoring frame from stale connection");
            return;
        }
        match codec::decode_server(text) {
            Ok(ServerFrame::History { messages }) => self.replay_history(&messages),
            Ok(ServerFrame::Message { message }) => self.resolve(message),
            Err(e) => {
                tracing::warn!(conn = %id, err = %e, len = text.len(), "malformed frame dropped");
            }
        }
    }

    /// Replaces the display with the server's history.
    ///
    /// Clears the view and appends every non-system message in order, with
    /// no pending-id matching. Every pending draft keeps its entry and is
    /// rendered again after the history, so a late echo still confirms it.
    pub fn replay_history(&mut self, messages: &[Message]) {
        self.view.clear();
        let mut shown = 0usize;
        for message in messages.iter().filter(|m| !m.is_system()) {
            self.view.append(message);
            shown += 1;
        }

        let view = &mut self.view;
        self.pending.rerender(|draft| view.render_pending(draft));
        tracing::info!(
            shown,
            suppressed = messages.len() - shown,
            still_pending = self.pending.len(),
            "history replayed"
        );
    }

    /// Routes one server-confirmed message.
    ///
    /// `system` messages are suppressed and never consume a pending entry.
    /// A message whose `client_id` is pending confirms that placeholder in
    /// place and removes the entry; anything else is appended.
    pub fn resolve(&mut self, message: Message) {
        if message.is_system() {
            tracing::debug!("system message suppressed");
            return;
        }
        if let Some(client_id) = message.client_id.as_ref() {
            if let Some(entry) = self.pending.take(client_id) {
                tracing::debug!(client_id = %client_id, "pending message confirmed");
                self.view.confirm(&entry.handle, &message);
                return;
            }
        }
        self.view.append(&message);
    }
}
