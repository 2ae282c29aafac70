//! Line-oriented console view.
//!
//! Prints one line per event to any [`Write`] sink (stdout for the `massg`
//! binary). A terminal cannot edit a line it already printed, so confirming
//! a placeholder prints a confirmation line that refers back to it by
//! number instead.

use std::io::Write;

use massg_proto::message::{Draft, Message};

use super::{View, format_timestamp};
use crate::chat::ConnectionState;

/// Status symbol for a message still being sent.
const SENDING: &str = "\u{22ef}";
/// Status symbol for a server-confirmed message.
const CONFIRMED: &str = "\u{2713}";

/// Prints the conversation as plain text lines.
pub struct ConsoleView<W: Write> {
    out: W,
    timestamp_format: String,
    next_ref: u64,
}

impl<W: Write> ConsoleView<W> {
    /// Creates a view writing to `out`.
    pub fn new(out: W, timestamp_format: impl Into<String>) -> Self {
        Self {
            out,
            timestamp_format: timestamp_format.into(),
            next_ref: 1,
        }
    }

    /// Consumes the view, returning the sink.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, text: &str) {
        if let Err(e) = writeln!(self.out, "{text}").and_then(|()| self.out.flush()) {
            tracing::warn!(err = %e, "console write failed");
        }
    }

    fn format_message(&self, message: &Message) -> String {
        let time = format_timestamp(message.created_at, &self.timestamp_format);
        let mut text = format!("[{time}] {}: {}", message.username, message.text);
        if let Some(image) = message.image() {
            if !message.text.is_empty() {
                text.push(' ');
            }
            text.push_str(&format!("<image {image}>"));
        }
        text
    }
}

impl<W: Write> View for ConsoleView<W> {
    type Handle = u64;

    fn render_pending(&mut self, draft: &Draft) -> u64 {
        let reference = self.next_ref;
        self.next_ref += 1;
        let mut text = format!("{SENDING} #{reference} {}", draft.text);
        if let Some(image) = draft.image() {
            text.push_str(&format!(" <image {image}>"));
        }
        self.line(&text);
        reference
    }

    fn confirm(&mut self, handle: &u64, message: &Message) {
        let text = format!("{CONFIRMED} #{handle} {}", self.format_message(message));
        self.line(&text);
    }

    fn append(&mut self, message: &Message) {
        let text = self.format_message(message);
        self.line(&text);
    }

    fn clear(&mut self) {
        self.line("--- history ---");
    }

    fn connection_changed(&mut self, state: ConnectionState) {
        let text = match state {
            ConnectionState::Disconnected => "* disconnected, retrying",
            ConnectionState::Connecting => "* connecting",
            ConnectionState::Open => "* connected",
        };
        self.line(text);
    }

    fn notice(&mut self, text: &str) {
        self.line(&format!("! {text}"));
    }
}
