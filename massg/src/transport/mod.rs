//! Transport layer for `massg`.
//!
//! A connection attempt is identified by a [`ConnectionId`]. Everything the
//! connection reports back (open, inbound frame, close) is a
//! [`ConnectionEvent`] tagged with that id, so the session can tell a live
//! connection from a superseded one. Outbound frames go through a [`Link`],
//! the session's handle on the connection's writer.
//!
//! - [`ws`]: WebSocket implementation over `tokio-tungstenite`

pub mod ws;

use std::fmt;

use tokio::sync::mpsc;
use url::Url;

/// Identifies one connection attempt. Never reused within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Wraps a raw id.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// The id that follows this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Errors that can occur during transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connection has been closed; nothing more can be written to it.
    #[error("connection closed")]
    ConnectionClosed,

    /// The connection attempt did not complete in time.
    #[error("connect timed out")]
    Timeout,

    /// The server could not be reached at all.
    #[error("server {0} is unreachable")]
    Unreachable(String),

    /// The WebSocket handshake or stream failed.
    #[error("websocket error: {0}")]
    WebSocket(String),

    /// The server URL cannot be turned into a WebSocket endpoint.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// An underlying I/O error occurred.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// What a connection reports back to its session.
#[derive(Debug)]
pub enum ConnectionEvent {
    /// The handshake completed; frames can now be written through `link`.
    Opened {
        /// The attempt that opened.
        id: ConnectionId,
        /// Writer handle for this connection.
        link: Link,
    },
    /// A text frame arrived (binary frames are passed on if they are UTF-8).
    Frame {
        /// The connection the frame arrived on.
        id: ConnectionId,
        /// Raw frame payload.
        text: String,
    },
    /// The connection ended, or the attempt failed before opening.
    Closed {
        /// The attempt or connection that ended.
        id: ConnectionId,
        /// Why it ended, if known.
        reason: Option<String>,
    },
}

/// Handle for writing text frames to one open connection.
///
/// Backed by a channel into the connection's writer task. Once that task has
/// exited, every send fails with [`TransportError::ConnectionClosed`].
/// Dropping the link makes the writer close the socket.
#[derive(Debug)]
pub struct Link {
    id: ConnectionId,
    tx: mpsc::UnboundedSender<String>,
}

impl Link {
    /// Creates a link and the receiving end its writer drains.
    #[must_use]
    pub fn channel(id: ConnectionId) -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { id, tx }, rx)
    }

    /// The connection this link writes to.
    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    /// Hands one text frame to the writer.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::ConnectionClosed`] if the writer is gone.
    pub fn send_text(&self, text: String) -> Result<(), TransportError> {
        self.tx
            .send(text)
            .map_err(|_| TransportError::ConnectionClosed)
    }

    /// Whether the writer has gone away.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Derives the WebSocket endpoint `scheme://host/ws?token=<token>`.
///
/// `http` maps to `ws` and `https` to `wss`, so the endpoint matches the
/// server's own transport security; `ws` and `wss` are kept as given.
///
/// # Errors
///
/// Returns [`TransportError::InvalidEndpoint`] if `server` does not parse,
/// has no host, or uses any other scheme.
pub fn endpoint_url(server: &str, token: &str) -> Result<Url, TransportError> {
    let mut url =
        Url::parse(server.trim()).map_err(|e| TransportError::InvalidEndpoint(e.to_string()))?;
    if url.host_str().is_none() {
        return Err(TransportError::InvalidEndpoint(format!("{server}: missing host")));
    }

    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(TransportError::InvalidEndpoint(format!(
                "unsupported scheme {other:?}"
            )));
        }
    };
    url.set_scheme(scheme)
        .map_err(|()| TransportError::InvalidEndpoint(format!("cannot use scheme {scheme}")))?;
    url.set_path("/ws");
    url.set_fragment(None);
    url.query_pairs_mut().clear().append_pair("token", token);
    Ok(url)
}
