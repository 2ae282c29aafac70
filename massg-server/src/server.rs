//! Chat server core: shared state, WebSocket handler, history replay and
//! broadcast.
//!
//! Each connection authenticates with `?token=` on the upgrade request. An
//! accepted connection first receives the full history, then every message
//! any connection publishes. Messages arrive as JSON drafts; blank drafts are
//! ignored, the rest are stored and broadcast with the author's `client_id`.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::extract::ws::{CloseFrame, Message, WebSocket, close_code};
use futures_util::{SinkExt, StreamExt};
use massg_proto::codec::{self, ServerFrame};
use massg_proto::message::{self, ClientId};
use parking_lot::RwLock;
use tokio::sync::mpsc;

use crate::auth::TokenRegistry;
use crate::store::HistoryStore;

/// Shared server state holding live connections, tokens and history.
pub struct ChatState {
    /// Maps connection id to a channel sender feeding its WebSocket writer.
    connections: RwLock<HashMap<u64, mpsc::UnboundedSender<Message>>>,
    /// Source of connection ids.
    next_connection: AtomicU64,
    /// Accepted bearer tokens.
    pub tokens: TokenRegistry,
    /// Stored messages, replayed on connect.
    pub history: HistoryStore,
}

impl Default for ChatState {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatState {
    /// Creates a state with no tokens and an empty, default-capped history.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(TokenRegistry::new(), HistoryStore::new())
    }

    /// Creates a state from a preloaded token registry and history store.
    #[must_use]
    pub fn with_config(tokens: TokenRegistry, history: HistoryStore) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            next_connection: AtomicU64::new(1),
            tokens,
            history,
        }
    }

    /// Registers a connection and returns its id plus the history it must
    /// be sent first.
    ///
    /// The snapshot and the registration happen under one lock so that a
    /// concurrent [`publish`](Self::publish) lands either in the snapshot or
    /// in the connection's channel, never both and never neither.
    pub fn join(&self, sender: mpsc::UnboundedSender<Message>) -> (u64, Vec<message::Message>) {
        let id = self.next_connection.fetch_add(1, Ordering::Relaxed);
        let mut conns = self.connections.write();
        let history = self.history.snapshot();
        conns.insert(id, sender);
        drop(conns);
        (id, history)
    }

    /// Removes a connection, returning whether it was registered.
    pub fn leave(&self, id: u64) -> bool {
        self.connections.write().remove(&id).is_some()
    }

    /// Number of live connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.read().len()
    }

    /// Stores a message and broadcasts it to every live connection.
    ///
    /// The correlation id is attached to the broadcast copy only; the
    /// history keeps the message without it.
    pub fn publish(
        &self,
        username: &str,
        text: &str,
        image_url: &str,
        client_id: Option<ClientId>,
    ) -> message::Message {
        let conns = self.connections.read();
        let mut stored = self.history.append(username, text, image_url);
        stored.client_id = client_id;

        let frame = ServerFrame::Message {
            message: stored.clone(),
        };
        match codec::encode_server(&frame) {
            Ok(text) => {
                for (id, sender) in conns.iter() {
                    if sender.send(Message::Text(text.clone().into())).is_err() {
                        tracing::debug!(connection = id, "broadcast to closing connection skipped");
                    }
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to encode broadcast frame");
            }
        }
        drop(conns);
        stored
    }

    /// Send a WebSocket Close frame to all connected clients.
    ///
    /// Clients see an ordinary server-side close, which makes this useful
    /// for graceful shutdown and for exercising client reconnection.
    pub fn close_all_connections(&self) {
        let conns = self.connections.read();
        for (id, sender) in conns.iter() {
            tracing::info!(connection = id, "sending close frame");
            let _ = sender.send(Message::Close(None));
        }
    }
}

/// Handles an upgraded WebSocket connection for one authenticated user.
///
/// The connection lifecycle:
/// 1. Reject with close code 1008 if the token was not recognised.
/// 2. Register the connection and send the history frame.
/// 3. Forward broadcasts from the connection's channel to the socket.
/// 4. Publish every non-blank draft the client sends.
/// 5. On disconnect, unregister the connection.
pub async fn handle_socket(mut socket: WebSocket, state: Arc<ChatState>, username: Option<String>) {
    let Some(username) = username else {
        tracing::warn!("rejecting connection with invalid token");
        let close = CloseFrame {
            code: close_code::POLICY,
            reason: "invalid token".into(),
        };
        let _ = socket.send(Message::Close(Some(close))).await;
        return;
    };

    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Create a channel for broadcasts destined to this connection.
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    let (connection, history) = state.join(tx);

    tracing::info!(connection, username = %username, "client connected");

    let count = history.len();
    let history = ServerFrame::History { messages: history };
    if let Err(e) = send_frame(&mut ws_sender, &history).await {
        tracing::warn!(connection, error = %e, "failed to send history");
        state.leave(connection);
        return;
    }
    tracing::debug!(connection, count, "history sent");

    // Writer task: broadcasts from the channel to the WebSocket.
    let mut write_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if ws_sender.send(msg).await.is_err() {
                tracing::warn!(connection, "WebSocket write failed");
                break;
            }
        }
    });

    // Reader loop: publish drafts sent by this client.
    let reader_state = Arc::clone(&state);
    let reader_username = username.clone();
    let mut read_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_receiver.next().await {
            match msg {
                Message::Text(text) => {
                    handle_draft(connection, &reader_username, text.as_str(), &reader_state);
                }
                Message::Binary(data) => match std::str::from_utf8(&data) {
                    Ok(text) => handle_draft(connection, &reader_username, text, &reader_state),
                    Err(e) => {
                        tracing::warn!(connection, error = %e, "non-UTF-8 binary frame ignored");
                    }
                },
                Message::Close(_) => {
                    tracing::info!(connection, "received close frame");
                    break;
                }
                Message::Ping(_) | Message::Pong(_) => {}
            }
        }
    });

    // Wait for either task to finish, then abort the other.
    tokio::select! {
        _ = &mut read_task => {
            write_task.abort();
        }
        _ = &mut write_task => {
            read_task.abort();
        }
    }

    state.leave(connection);
    tracing::info!(connection, username = %username, "client disconnected");
}

/// Parses one inbound draft and publishes it unless it is blank.
fn handle_draft(connection: u64, username: &str, text: &str, state: &ChatState) {
    let draft = match codec::decode_draft(text) {
        Ok(d) => d,
        Err(e) => {
            tracing::warn!(connection, error = %e, "failed to decode draft");
            return;
        }
    };

    let body = draft.text.trim();
    let image_url = draft.image_url.trim();
    if body.is_empty() && image_url.is_empty() {
        tracing::debug!(connection, "blank draft ignored");
        return;
    }

    let client_id = draft
        .client_id
        .map(|id| ClientId::new(id.as_str().trim()))
        .filter(|id| !id.is_empty());

    let stored = state.publish(username, body, image_url, client_id);
    tracing::debug!(
        connection,
        id = stored.id.as_deref().unwrap_or_default(),
        "message published"
    );
}

/// Encodes and sends a server frame directly on a WebSocket sender.
async fn send_frame(
    ws_sender: &mut (impl SinkExt<Message, Error = axum::Error> + Unpin),
    frame: &ServerFrame,
) -> Result<(), String> {
    let text = codec::encode_server(frame).map_err(|e| e.to_string())?;
    ws_sender
        .send(Message::Text(text.into()))
        .await
        .map_err(|e| format!("WebSocket send error: {e}"))
}

/// Query parameters of the `/ws` upgrade request.
#[derive(Debug, Default, serde::Deserialize)]
pub struct ConnectParams {
    /// Bearer token identifying the user.
    #[serde(default)]
    pub token: Option<String>,
}

/// Starts the chat server on the given address and returns the bound address
/// and a join handle.
///
/// This is the primary entry point used by both `main.rs` and test code.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server(
    addr: &str,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    start_server_with_state(addr, Arc::new(ChatState::new())).await
}

/// Starts the chat server with a pre-configured [`ChatState`].
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server_with_state(
    addr: &str,
    state: Arc<ChatState>,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    let app = axum::Router::new()
        .route("/ws", axum::routing::get(ws_handler))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "chat server error");
        }
    });

    Ok((bound_addr, handle))
}

/// axum handler that authenticates the token and upgrades to a WebSocket.
async fn ws_handler(
    ws: axum::extract::ws::WebSocketUpgrade,
    axum::extract::Query(params): axum::extract::Query<ConnectParams>,
    axum::extract::State(state): axum::extract::State<Arc<ChatState>>,
) -> impl axum::response::IntoResponse {
    let username = params
        .token
        .as_deref()
        .and_then(|token| state.tokens.username_for(token));
    ws.on_upgrade(move |socket| handle_socket(socket, state, username))
}
