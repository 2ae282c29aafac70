//! Chat session core for `massg`.
//!
//! [`ChatSession`] is the single owned object holding all client state: the
//! connection lifecycle, the [`OutboundQueue`](queue::OutboundQueue) and the
//! [`PendingRegistry`](pending::PendingRegistry). It never blocks and never
//! spawns anything itself; effects go through a [`Runtime`] and results come
//! back as [`SessionEvent`]s fed to [`ChatSession::handle_event`] by one
//! event-loop task.
//!
//! - [`send`]: optimistic send, direct send or enqueue, flush
//! - [`dispatch`]: inbound frames, history replay, echo reconciliation

pub mod dispatch;
pub mod pending;
pub mod queue;
pub mod send;

use std::time::Duration;

use massg_proto::codec::CodecError;
use massg_proto::message::{Draft, ValidationError};
use url::Url;

use crate::transport::{ConnectionEvent, ConnectionId, Link, TransportError};
use crate::ui::View;

use pending::PendingRegistry;
use queue::OutboundQueue;

/// Fixed delay between a close and the next connection attempt.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(800);

/// Lifecycle of the session's single connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No connection and no attempt in flight.
    #[default]
    Disconnected,
    /// A dial is in flight.
    Connecting,
    /// Connected; frames can be sent.
    Open,
}

/// Everything the session reacts to, besides user actions.
#[derive(Debug)]
pub enum SessionEvent {
    /// Something happened on a connection.
    Connection(ConnectionEvent),
    /// The reconnect timer fired.
    ReconnectDue,
}

impl From<ConnectionEvent> for SessionEvent {
    fn from(event: ConnectionEvent) -> Self {
        Self::Connection(event)
    }
}

/// Effects the session asks its environment to perform.
///
/// Both calls must return immediately; outcomes arrive later as
/// [`SessionEvent`]s.
pub trait Runtime {
    /// Starts connection attempt `id` to `endpoint`.
    fn dial(&mut self, id: ConnectionId, endpoint: &Url);

    /// Posts [`SessionEvent::ReconnectDue`] after `delay`.
    fn schedule_reconnect(&mut self, delay: Duration);
}

/// Errors that can occur when sending a message.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    /// The draft was rejected before anything was rendered.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// The draft could not be encoded.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// The link refused the frame.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The session has been torn down.
    #[error("session has been torn down")]
    TornDown,
}

/// The client's whole chat state, driven by one event loop.
pub struct ChatSession<R: Runtime, V: View> {
    endpoint: Url,
    runtime: R,
    view: V,
    state: ConnectionState,
    /// Attempt or connection whose events are current; everything else is stale.
    current: Option<ConnectionId>,
    next_id: ConnectionId,
    link: Option<Link>,
    queue: OutboundQueue,
    pending: PendingRegistry<V::Handle>,
    reconnect_scheduled: bool,
    reconnect_delay: Duration,
    torn_down: bool,
}

impl<R: Runtime, V: View> ChatSession<R, V> {
    /// Creates a disconnected session. Nothing is dialed until
    /// [`connect`](Self::connect) or the first send.
    pub fn create(endpoint: Url, runtime: R, view: V) -> Self {
        Self {
            endpoint,
            runtime,
            view,
            state: ConnectionState::Disconnected,
            current: None,
            next_id: ConnectionId::new(1),
            link: None,
            queue: OutboundQueue::new(),
            pending: PendingRegistry::new(),
            reconnect_scheduled: false,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            torn_down: false,
        }
    }

    /// Overrides the reconnect delay.
    #[must_use]
    pub const fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Starts a connection attempt unless one is in flight or open.
    ///
    /// Idempotent: while `Connecting` or `Open`, or after teardown, this
    /// does nothing.
    pub fn connect(&mut self) {
        if self.torn_down || self.state != ConnectionState::Disconnected {
            return;
        }
        let id = self.next_id;
        self.next_id = id.next();
        self.current = Some(id);
        self.set_state(ConnectionState::Connecting);
        tracing::info!(conn = %id, "connecting");
        self.runtime.dial(id, &self.endpoint);
    }

    /// Applies one event. Events after teardown are ignored.
    pub fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Connection(ConnectionEvent::Opened { id, link }) => self.on_open(id, link),
            SessionEvent::Connection(ConnectionEvent::Closed { id, reason }) => {
                self.on_close(id, reason.as_deref());
            }
            SessionEvent::Connection(ConnectionEvent::Frame { id, text }) => self.on_frame(id, &text),
            SessionEvent::ReconnectDue => self.on_reconnect_due(),
        }
    }

    /// Stops the session for good.
    ///
    /// Cancels reconnection (a timer already running fires into the void),
    /// drops the live link, which closes the socket, and returns the drafts
    /// that never left the queue.
    pub fn teardown(&mut self) -> Vec<Draft> {
        if self.torn_down {
            return Vec::new();
        }
        self.torn_down = true;
        self.reconnect_scheduled = false;
        self.current = None;
        self.link = None;
        self.set_state(ConnectionState::Disconnected);
        let unconfirmed = self.pending.drain().len();
        let unsent = self.queue.drain();
        tracing::info!(unsent = unsent.len(), unconfirmed, "session torn down");
        unsent
    }

    /// Current connection state.
    #[must_use]
    pub const fn state(&self) -> ConnectionState {
        self.state
    }

    /// Number of drafts waiting in the outbound queue.
    #[must_use]
    pub fn queued_len(&self) -> usize {
        self.queue.len()
    }

    /// Number of drafts waiting for their echo.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Whether a reconnect timer is outstanding.
    #[must_use]
    pub const fn reconnect_scheduled(&self) -> bool {
        self.reconnect_scheduled
    }

    /// Whether [`teardown`](Self::teardown) has run.
    #[must_use]
    pub const fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// The WebSocket endpoint this session dials.
    #[must_use]
    pub const fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// The rendering collaborator.
    #[must_use]
    pub const fn view(&self) -> &V {
        &self.view
    }

    /// Mutable access to the rendering collaborator.
    pub const fn view_mut(&mut self) -> &mut V {
        &mut self.view
    }

    /// The runtime effects are sent to.
    #[must_use]
    pub const fn runtime(&self) -> &R {
        &self.runtime
    }

    /// Consumes the session, returning its view.
    pub fn into_view(self) -> V {
        self.view
    }

    fn is_current(&self, id: ConnectionId) -> bool {
        !self.torn_down && self.current == Some(id)
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.state != state {
            self.state = state;
            self.view.connection_changed(state);
        }
    }

    fn on_open(&mut self, id: ConnectionId, link: Link) {
        if !self.is_current(id) || self.state != ConnectionState::Connecting {
            tracing::debug!(conn = %id, "ignoring open of stale connection");
            // Dropping the link closes the socket.
            return;
        }
        tracing::info!(conn = %id, queued = self.queue.len(), "connection open");
        self.link = Some(link);
        self.set_state(ConnectionState::Open);
        self.flush();
    }

    fn on_close(&mut self, id: ConnectionId, reason: Option<&str>) {
        if !self.is_current(id) {
            tracing::debug!(conn = %id, "ignoring close of stale connection");
            return;
        }
        tracing::warn!(conn = %id, reason = reason.unwrap_or("none"), "connection lost");
        self.current = None;
        self.link = None;
        self.set_state(ConnectionState::Disconnected);
        self.schedule_reconnect();
    }

    fn on_reconnect_due(&mut self) {
        if self.torn_down {
            return;
        }
        self.reconnect_scheduled = false;
        self.connect();
    }

    /// Arms the reconnect timer unless it is already armed.
    fn schedule_reconnect(&mut self) {
        if self.reconnect_scheduled || self.torn_down {
            return;
        }
        self.reconnect_scheduled = true;
        tracing::debug!(delay_ms = self.reconnect_delay.as_millis(), "reconnect scheduled");
        self.runtime.schedule_reconnect(self.reconnect_delay);
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn connect_is_idempotent() {
        let mut session = session();
        session.connect();
        session.connect();
        assert_eq!(session.state(), ConnectionState::Connecting);
        assert_eq!(session.runtime().dials.len(), 1);

        let _rx = open(&mut session);
        session.connect();
        assert_eq!(session.state(), ConnectionState::Open);
        assert_eq!(session.runtime().dials.len(), 1);
    }

    #[test]
    fn close_schedules_one_reconnect_at_fixed_delay() {
        let mut session = session();
        session.connect();
        close(&mut session);
        assert_eq!(session.state(), ConnectionState::Disconnected);
        assert!(session.reconnect_scheduled());
        assert_eq!(session.runtime().reconnects, vec![DEFAULT_RECONNECT_DELAY]);

        session.handle_event(SessionEvent::ReconnectDue);
        assert!(!session.reconnect_scheduled());
        assert_eq!(session.state(), ConnectionState::Connecting);
        assert_eq!(session.runtime().dials.len(), 2);
    }

    #[test]
    fn two_closes_before_timer_schedule_one_timer() {
        let mut session = session();
        session.connect();
        close(&mut session);
        // A send while disconnected dials immediately; that dial fails too.
        session.send_message("x", None).unwrap();
        assert_eq!(session.runtime().dials.len(), 2);
        close(&mut session);

        assert_eq!(session.runtime().reconnects.len(), 1);
        session.handle_event(SessionEvent::ReconnectDue);
        assert_eq!(session.runtime().dials.len(), 3);
    }

    #[test]
    fn at_most_one_attempt_in_flight() {
        let mut session = session();
        let mut closed = 0;
        let mut links = Vec::new();
        // Scripted interleaving of user connects, sends, opens, closes and
        // timer fires, including fires that race a user-initiated dial.
        let script = "ccsxtcsotxtxcsoxsstxt";
        for (step, op) in script.chars().enumerate() {
            match op {
                'c' => session.connect(),
                's' => {
                    session.send_message(&format!("m{step}"), None).unwrap();
                }
                'o' if session.state() == ConnectionState::Connecting => {
                    links.push(open(&mut session));
                }
                'x' if session.state() != ConnectionState::Disconnected => {
                    close(&mut session);
                    closed += 1;
                }
                't' if session.reconnect_scheduled() => {
                    session.handle_event(SessionEvent::ReconnectDue);
                }
                _ => {}
            }
            let in_flight = session.runtime().dials.len() - closed;
            assert!(in_flight <= 1, "step {step} ({op}): {in_flight} attempts live");
            assert!(session.runtime().reconnects.len() <= closed);
        }
    }

    #[test]
    fn stale_events_are_ignored() {
        let mut session = session();
        session.connect();
        let stale = current(&session);
        close(&mut session);
        session.handle_event(SessionEvent::ReconnectDue);
        let live = current(&session);
        assert_ne!(stale, live);

        // Open, frame and close of the superseded attempt change nothing.
        let (stale_link, stale_rx) = Link::channel(stale);
        session.handle_event(ConnectionEvent::Opened { id: stale, link: stale_link }.into());
        assert_eq!(session.state(), ConnectionState::Connecting);
        // The stale link was dropped, so its writer would close the socket.
        drop(stale_rx);

        session.handle_event(ConnectionEvent::Closed { id: stale, reason: None }.into());
        assert_eq!(session.state(), ConnectionState::Connecting);
        assert_eq!(session.runtime().reconnects.len(), 1);

        let _rx = open(&mut session);
        session.handle_event(
            ConnectionEvent::Frame {
                id: stale,
                text: r#"{"type":"history","messages":[]}"#.to_string(),
            }
            .into(),
        );
        assert_eq!(session.state(), ConnectionState::Open);
        assert_eq!(session.view().cleared(), 0);
    }

    #[test]
    fn teardown_stops_reconnect_and_returns_unsent() {
        let mut session = session();
        session.send_message("one", None).unwrap();
        session.send_message("two", None).unwrap();
        close(&mut session);
        assert_eq!(session.runtime().reconnects.len(), 1);

        let unsent = session.teardown();
        let texts: Vec<&str> = unsent.iter().map(|d| d.text.as_str()).collect();
        assert_eq!(texts, vec!["one", "two"]);
        assert!(session.is_torn_down());
        assert!(!session.reconnect_scheduled());

        // The outstanding timer fires into a torn-down session.
        session.handle_event(SessionEvent::ReconnectDue);
        session.connect();
        assert_eq!(session.runtime().dials.len(), 1);
        assert_eq!(session.state(), ConnectionState::Disconnected);
        assert!(matches!(
            session.send_message("three", None),
            Err(SendError::TornDown)
        ));
        assert!(session.teardown().is_empty());
    }

    #[test]
    fn teardown_drops_live_link() {
        let mut session = session();
        session.connect();
        let mut rx = open(&mut session);
        session.teardown();
        // Writer side sees the channel closed, which closes the socket.
        assert!(matches!(
            rx.try_recv(),
            Err(tokio::sync::mpsc::error::TryRecvError::Disconnected)
        ));
    }

    #[test]
    fn view_sees_state_transitions() {
        let mut session = session();
        session.connect();
        let _rx = open(&mut session);
        close(&mut session);
        assert_eq!(
            session.view().states(),
            &[
                ConnectionState::Connecting,
                ConnectionState::Open,
                ConnectionState::Disconnected
            ]
        );
    }
}
