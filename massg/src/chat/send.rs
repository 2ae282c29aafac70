//! Send path: optimistic render, then direct send or enqueue.
//!
//! A message is rendered as a "sending" placeholder and registered under its
//! correlation id before anything touches the network, so it shows up
//! immediately whatever the connection is doing. If the connection is open
//! and nothing is queued ahead of it, the draft is written straight to the
//! link; otherwise it joins the [`OutboundQueue`](super::queue::OutboundQueue)
//! and the session makes sure a connection attempt is under way.

use massg_proto::codec;
use massg_proto::message::{ClientId, Draft};

use crate::transport::Link;
use crate::ui::View;

use super::{ChatSession, ConnectionState, Runtime, SendError};

impl<R: Runtime, V: View> ChatSession<R, V> {
    /// Sends a new message authored by the local user.
    ///
    /// Builds a [`Draft`] with a fresh [`ClientId`], renders its placeholder,
    /// registers it as pending and hands it to [`try_send`](Self::try_send).
    /// Transport trouble is never reported here; the draft waits in the
    /// queue until a connection opens.
    ///
    /// # Errors
    ///
    /// - [`SendError::Validation`] if text and image are both blank or the
    ///   text is too large. Nothing is rendered in that case.
    /// - [`SendError::TornDown`] after [`teardown`](Self::teardown).
    pub fn send_message(
        &mut self,
        text: &str,
        image_url: Option<&str>,
    ) -> Result<ClientId, SendError> {
        if self.torn_down {
            return Err(SendError::TornDown);
        }
        let mut draft = Draft::new(text, image_url)?;
        let client_id = draft
            .client_id
            .get_or_insert_with(ClientId::generate)
            .clone();

        let handle = self.view.render_pending(&draft);
        self.pending.register(client_id.clone(), handle, draft.clone());
        tracing::debug!(client_id = %client_id, "message rendered as pending");

        self.try_send(draft);
        Ok(client_id)
    }

    /// Sends `draft` now if the connection is open, otherwise queues it and
    /// starts connecting.
    ///
    /// When drafts are already queued the new one goes behind them and the
    /// queue is flushed, so order is kept even while a previous flush is
    /// stuck. A direct send that fails because the link has just died
    /// queues the draft; the pending close event drives the reconnect.
    pub fn try_send(&mut self, draft: Draft) {
        if self.torn_down {
            return;
        }
        if self.state == ConnectionState::Open && self.queue.is_empty() {
            if let Some(link) = self.link.as_ref() {
                match send_draft(link, &draft) {
                    Ok(()) => return,
                    Err(e) => {
                        tracing::warn!(conn = %link.id(), err = %e, "direct send failed, queueing");
                    }
                }
            }
        }

        self.queue.enqueue(draft);
        if self.state == ConnectionState::Open {
            self.flush();
        } else {
            self.connect();
        }
    }

    /// Drains the outbound queue into the open link.
    ///
    /// Does nothing unless `Open`. Stops at the first failed send, leaving
    /// that draft and the rest queued for the next open.
    pub fn flush(&mut self) {
        if self.state != ConnectionState::Open {
            return;
        }
        let Some(link) = self.link.as_ref() else {
            return;
        };
        if self.queue.is_empty() {
            return;
        }

        let conn = link.id();
        let result = self.queue.flush(|draft| send_draft(link, draft));
        match result {
            Ok(sent) => tracing::debug!(conn = %conn, sent, "outbound queue flushed"),
            Err(e) => tracing::warn!(
                conn = %conn,
                err = %e,
                remaining = self.queue.len(),
                "flush stopped"
            ),
        }
    }
}

/// Encodes one draft and writes it to `link`.
fn send_draft(link: &Link, draft: &Draft) -> Result<(), SendError> {
    let frame = codec::encode_draft(draft)?;
    link.send_text(frame)?;
    Ok(())
}
