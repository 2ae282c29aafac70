//! WebSocket connection task.
//!
//! [`run_connection`] owns one WebSocket from dial to close. It reports
//! every state change as a [`ConnectionEvent`] and writes whatever the
//! session pushes through the [`Link`] it hands out on open. A failed or
//! timed-out dial is reported as a close, so the session has one recovery
//! path for both.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

use super::{ConnectionEvent, ConnectionId, Link, TransportError};

/// Default time allowed for the TCP connect plus WebSocket handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Dials `endpoint` and runs the connection until either side closes it.
///
/// Emits exactly one `Closed` event for `id`, preceded by `Opened` if the
/// handshake succeeded. Returns early (without `Closed`) only if the
/// receiver of `events` is gone.
pub async fn run_connection<E>(
    id: ConnectionId,
    endpoint: Url,
    connect_timeout: Duration,
    events: mpsc::UnboundedSender<E>,
) where
    E: From<ConnectionEvent> + Send + 'static,
{
    let reason = match drive(id, &endpoint, connect_timeout, &events).await {
        Ok(()) => None,
        Err(e) => Some(e.to_string()),
    };
    tracing::info!(conn = %id, reason = ?reason, "connection closed");
    let _ = events.send(ConnectionEvent::Closed { id, reason }.into());
}

async fn drive<E>(
    id: ConnectionId,
    endpoint: &Url,
    connect_timeout: Duration,
    events: &mpsc::UnboundedSender<E>,
) -> Result<(), TransportError>
where
    E: From<ConnectionEvent>,
{
    tracing::debug!(conn = %id, host = ?endpoint.host_str(), "dialing");
    let (ws_stream, _response) = tokio::time::timeout(connect_timeout, connect_async(endpoint.as_str()))
        .await
        .map_err(|_| {
            tracing::warn!(conn = %id, "websocket connect timed out");
            TransportError::Timeout
        })?
        .map_err(|e| {
            tracing::warn!(conn = %id, err = %e, "websocket connect failed");
            map_ws_connect_error(endpoint, e)
        })?;

    let (mut ws_sender, mut ws_reader) = ws_stream.split();
    let (link, mut outbound) = Link::channel(id);
    if events.send(ConnectionEvent::Opened { id, link }.into()).is_err() {
        // Session is gone; nobody will ever write to this socket.
        let _ = ws_sender.close().await;
        return Ok(());
    }
    tracing::info!(conn = %id, "connection open");

    loop {
        tokio::select! {
            out = outbound.recv() => {
                let Some(text) = out else {
                    // Link dropped by the session.
                    let _ = ws_sender.close().await;
                    return Ok(());
                };
                ws_sender
                    .send(Message::Text(text.into()))
                    .await
                    .map_err(|e| {
                        tracing::warn!(conn = %id, err = %e, "websocket send failed");
                        TransportError::WebSocket(e.to_string())
                    })?;
            }
            incoming = ws_reader.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        let frame = ConnectionEvent::Frame { id, text: text.as_str().to_owned() };
                        if events.send(frame.into()).is_err() {
                            return Ok(());
                        }
                    }
                    Some(Ok(Message::Binary(data))) => match String::from_utf8(data.to_vec()) {
                        Ok(text) => {
                            if events.send(ConnectionEvent::Frame { id, text }.into()).is_err() {
                                return Ok(());
                            }
                        }
                        Err(e) => {
                            tracing::warn!(conn = %id, err = %e, "non-UTF-8 binary frame, skipping");
                        }
                    },
                    Some(Ok(Message::Close(frame))) => {
                        let detail = frame.map(|f| format!("{} {}", u16::from(f.code), f.reason));
                        tracing::info!(conn = %id, close = ?detail, "closed by server");
                        return Err(TransportError::WebSocket(
                            detail.unwrap_or_else(|| "closed by server".to_string()),
                        ));
                    }
                    Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {}
                    Some(Err(e)) => {
                        tracing::warn!(conn = %id, err = %e, "websocket read error");
                        return Err(TransportError::WebSocket(e.to_string()));
                    }
                    None => return Err(TransportError::ConnectionClosed),
                }
            }
        }
    }
}

/// Map a `tokio_tungstenite` connection error to a [`TransportError`].
fn map_ws_connect_error(endpoint: &Url, err: tokio_tungstenite::tungstenite::Error) -> TransportError {
    use tokio_tungstenite::tungstenite::Error as WsError;
    match err {
        WsError::Io(io_err) => {
            if io_err.kind() == std::io::ErrorKind::ConnectionRefused
                || io_err.kind() == std::io::ErrorKind::AddrNotAvailable
            {
                TransportError::Unreachable(endpoint.host_str().unwrap_or_default().to_string())
            } else {
                TransportError::Io(io_err)
            }
        }
        WsError::Http(response) => {
            TransportError::WebSocket(format!("HTTP error: status {}", response.status()))
        }
        other => TransportError::WebSocket(other.to_string()),
    }
}
