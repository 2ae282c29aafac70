//! Tokio driver for a [`ChatSession`].
//!
//! The session itself is synchronous. This module gives it a home: one
//! background task owns it and feeds it [`SessionEvent`]s from connection
//! tasks and the reconnect timer, interleaved with [`NetCommand`]s from the
//! front end.
//!
//! # Architecture
//!
//! ```text
//! front end ─── NetCommand ──→ session task ←── SessionEvent ─── connection task
//!                                   │                        └── reconnect timer
//!                                   └── View calls
//! ```

use std::time::Duration;

use massg_proto::message::Draft;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use url::Url;

use crate::chat::{ChatSession, DEFAULT_RECONNECT_DELAY, Runtime, SessionEvent};
use crate::transport::ConnectionId;
use crate::transport::ws::{self, DEFAULT_CONNECT_TIMEOUT};
use crate::ui::View;

/// Commands sent from the front end to the session task.
#[derive(Debug)]
pub enum NetCommand {
    /// Send a message authored by the local user.
    SendMessage {
        /// The message text.
        text: String,
        /// An already uploaded image reference.
        image_url: Option<String>,
    },
    /// Tear the session down and end the task.
    Shutdown,
}

/// Configuration for the session task.
#[derive(Debug, Clone)]
pub struct NetConfig {
    /// WebSocket endpoint including the token query.
    pub endpoint: Url,
    /// Delay before reconnecting after a close.
    pub reconnect_delay: Duration,
    /// Time allowed for one dial.
    pub connect_timeout: Duration,
    /// Capacity of the command channel.
    pub channel_capacity: usize,
}

/// Default channel capacity for commands.
const DEFAULT_CHANNEL_CAPACITY: usize = 256;

impl NetConfig {
    /// Creates a `NetConfig` with default timings.
    #[must_use]
    pub const fn new(endpoint: Url) -> Self {
        Self {
            endpoint,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

/// What the session task hands back when it ends.
#[derive(Debug)]
pub struct SessionExit<V> {
    /// The view the session rendered into.
    pub view: V,
    /// Drafts that never reached the server.
    pub unsent: Vec<Draft>,
}

/// [`Runtime`] that dials with `tokio-tungstenite` and times with tokio.
#[derive(Debug, Clone)]
pub struct TokioRuntime {
    events: mpsc::UnboundedSender<SessionEvent>,
    connect_timeout: Duration,
}

impl TokioRuntime {
    /// Creates a runtime posting its events to `events`.
    #[must_use]
    pub const fn new(events: mpsc::UnboundedSender<SessionEvent>, connect_timeout: Duration) -> Self {
        Self {
            events,
            connect_timeout,
        }
    }
}

impl Runtime for TokioRuntime {
    fn dial(&mut self, id: ConnectionId, endpoint: &Url) {
        tokio::spawn(ws::run_connection(
            id,
            endpoint.clone(),
            self.connect_timeout,
            self.events.clone(),
        ));
    }

    fn schedule_reconnect(&mut self, delay: Duration) {
        let events = self.events.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(SessionEvent::ReconnectDue);
        });
    }
}

/// Spawn the session task and return its command channel and handle.
///
/// The session starts connecting right away. It runs until
/// [`NetCommand::Shutdown`] arrives or every command sender is dropped,
/// then tears down and returns its view with the unsent drafts.
pub fn spawn_session<V>(
    config: NetConfig,
    view: V,
) -> (mpsc::Sender<NetCommand>, JoinHandle<SessionExit<V>>)
where
    V: View + Send + 'static,
    V::Handle: Send,
{
    let (cmd_tx, cmd_rx) = mpsc::channel(config.channel_capacity);
    let handle = tokio::spawn(run_session(config, view, cmd_rx));
    (cmd_tx, handle)
}

/// The session event loop.
async fn run_session<V: View>(
    config: NetConfig,
    view: V,
    mut cmd_rx: mpsc::Receiver<NetCommand>,
) -> SessionExit<V> {
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let runtime = TokioRuntime::new(event_tx, config.connect_timeout);
    let mut session = ChatSession::create(config.endpoint, runtime, view)
        .with_reconnect_delay(config.reconnect_delay);
    session.connect();

    loop {
        tokio::select! {
            Some(event) = event_rx.recv() => session.handle_event(event),
            cmd = cmd_rx.recv() => match cmd {
                Some(NetCommand::SendMessage { text, image_url }) => {
                    if let Err(e) = session.send_message(&text, image_url.as_deref()) {
                        tracing::warn!(err = %e, "message rejected");
                        session.view_mut().notice(&e.to_string());
                    }
                }
                Some(NetCommand::Shutdown) | None => {
                    tracing::info!("session shutting down");
                    break;
                }
            },
        }
    }

    let unsent = session.teardown();
    if !unsent.is_empty() {
        session
            .view_mut()
            .notice(&format!("{} message(s) were never sent", unsent.len()));
    }
    SessionExit {
        view: session.into_view(),
        unsent,
    }
}
