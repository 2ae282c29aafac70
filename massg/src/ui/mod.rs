//! Rendering collaborators.
//!
//! The session core only talks to a [`View`]; it never inspects what a
//! placeholder handle is.
//!
//! - [`transcript`]: in-memory view, also used to observe sessions in tests
//! - [`console`]: line-oriented terminal output

pub mod console;
pub mod transcript;

use massg_proto::message::{Draft, Message, Timestamp};

use crate::chat::ConnectionState;

/// Where the session renders messages.
pub trait View {
    /// Opaque reference to a rendered placeholder.
    type Handle;

    /// Renders a local draft marked "sending" and returns its handle.
    fn render_pending(&mut self, draft: &Draft) -> Self::Handle;

    /// Turns the placeholder behind `handle` into the confirmed `message`,
    /// in place.
    fn confirm(&mut self, handle: &Self::Handle, message: &Message);

    /// Renders a confirmed message at the end of the display.
    fn append(&mut self, message: &Message);

    /// Removes everything from the display.
    fn clear(&mut self);

    /// Called whenever the connection state changes.
    fn connection_changed(&mut self, _state: ConnectionState) {}

    /// Shows a short out-of-band notice (rejected input, shutdown summary).
    fn notice(&mut self, _text: &str) {}
}

/// Format a server timestamp in local time using a chrono format string.
#[must_use]
pub fn format_timestamp(ts: Timestamp, format: &str) -> String {
    use chrono::{Local, TimeZone};
    let secs_f = ts.as_secs_f64();
    if !secs_f.is_finite() {
        return "??:??".to_string();
    }
    #[allow(clippy::cast_possible_truncation)]
    let secs = secs_f.floor() as i64;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let nsecs = ((secs_f - secs_f.floor()) * 1e9) as u32;
    match Local.timestamp_opt(secs, nsecs) {
        chrono::LocalResult::Single(dt) => dt.format(format).to_string(),
        _ => "??:??".to_string(),
    }
}
