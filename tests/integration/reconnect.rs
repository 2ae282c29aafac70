// Test-specific lint overrides: integration tests use unwrap/expect freely,
// and some pedantic/nursery lints are not appropriate for test code.
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::future_not_send,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc,
    clippy::missing_docs_in_private_items
)]

//! Integration tests for automatic reconnection.
//!
//! These tests validate:
//! - a server-side close is followed by a reconnect and a history replay
//! - messages sent while the server is down are queued, then delivered and
//!   confirmed once it is back
//! - shutdown during reconnection hands back the unsent drafts
//!
//! ## Disconnect simulation
//!
//! Aborting the server's `JoinHandle` stops the listener but not the
//! already-accepted connections, so an outage is simulated by aborting the
//! server and then closing every live connection through the shared state.
//! Restarting binds the same address with the same state, so history
//! survives the outage.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use massg::chat::ConnectionState;
use massg::net::{self, NetCommand, NetConfig, SessionExit};
use massg::transport::endpoint_url;
use massg::ui::transcript::{EntryStatus, SharedTranscript, Transcript};
use massg_server::server::{ChatState, start_server_with_state};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const RECONNECT_DELAY: Duration = Duration::from_millis(100);

struct TestServer {
    addr: SocketAddr,
    state: Arc<ChatState>,
    handle: JoinHandle<()>,
}

impl TestServer {
    async fn start() -> Self {
        let state = Arc::new(ChatState::new());
        let (addr, handle) = start_server_with_state("127.0.0.1:0", Arc::clone(&state))
            .await
            .expect("failed to start test server");
        Self {
            addr,
            state,
            handle,
        }
    }

    /// Stops accepting and drops every live connection.
    async fn stop(&self) {
        self.handle.abort();
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.state.close_all_connections();
    }

    /// Serves again on the same address with the same state.
    async fn restart(&mut self) {
        let (addr, handle) =
            start_server_with_state(&self.addr.to_string(), Arc::clone(&self.state))
                .await
                .expect("failed to restart test server");
        assert_eq!(addr, self.addr);
        self.handle = handle;
    }
}

fn spawn_client(
    addr: SocketAddr,
    token: &str,
) -> (
    SharedTranscript,
    mpsc::Sender<NetCommand>,
    JoinHandle<SessionExit<SharedTranscript>>,
) {
    let endpoint = endpoint_url(&format!("http://{addr}"), token).unwrap();
    let mut config = NetConfig::new(endpoint);
    config.reconnect_delay = RECONNECT_DELAY;
    let transcript = Transcript::shared();
    let (commands, handle) = net::spawn_session(config, Arc::clone(&transcript));
    (transcript, commands, handle)
}

async fn send(commands: &mpsc::Sender<NetCommand>, text: &str) {
    commands
        .send(NetCommand::SendMessage {
            text: text.to_string(),
            image_url: None,
        })
        .await
        .unwrap();
}

fn opens(transcript: &SharedTranscript) -> usize {
    transcript
        .lock()
        .states()
        .iter()
        .filter(|s| **s == ConnectionState::Open)
        .count()
}

/// Polls `cond` until it holds or ten seconds pass.
async fn wait_for(what: &str, mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test]
async fn server_close_triggers_reconnect_and_history_replay() {
    let server = TestServer::start().await;
    let token = server.state.tokens.issue("alice");
    let (transcript, commands, _handle) = spawn_client(server.addr, &token);
    wait_for("first open", || opens(&transcript) == 1).await;

    send(&commands, "before").await;
    wait_for("confirmation", || {
        transcript.lock().count(EntryStatus::Confirmed) == 1
    })
    .await;

    let started = Instant::now();
    server.state.close_all_connections();
    wait_for("second open", || opens(&transcript) == 2).await;
    assert!(
        started.elapsed() >= RECONNECT_DELAY,
        "reconnected before the fixed delay"
    );
    wait_for("history replay", || transcript.lock().cleared() == 2).await;

    let t = transcript.lock();
    assert_eq!(t.texts(), ["before"]);
    assert_eq!(t.count(EntryStatus::Confirmed), 1);
    assert!(t.states().contains(&ConnectionState::Disconnected));
}

#[tokio::test]
async fn message_sent_during_outage_is_delivered_after_restart() {
    let mut server = TestServer::start().await;
    let alice_token = server.state.tokens.issue("alice");
    let (alice, commands, handle) = spawn_client(server.addr, &alice_token);
    wait_for("open", || opens(&alice) == 1).await;
    send(&commands, "before").await;
    wait_for("first confirmation", || {
        alice.lock().count(EntryStatus::Confirmed) == 1
    })
    .await;

    server.stop().await;
    wait_for("disconnect", || {
        alice.lock().state() != ConnectionState::Open
    })
    .await;

    send(&commands, "offline one").await;
    send(&commands, "offline two").await;
    wait_for("placeholders", || {
        alice.lock().count(EntryStatus::Sending) == 2
    })
    .await;
    // A few failed attempts while the server is away.
    tokio::time::sleep(RECONNECT_DELAY * 3).await;
    assert_eq!(server.state.history.len(), 1);

    server.restart().await;
    wait_for("all confirmed", || {
        alice.lock().count(EntryStatus::Confirmed) == 3
    })
    .await;

    {
        let t = alice.lock();
        assert_eq!(t.texts(), ["before", "offline one", "offline two"]);
        assert_eq!(t.count(EntryStatus::Sending), 0);
    }
    let stored: Vec<String> = server
        .state
        .history
        .snapshot()
        .into_iter()
        .map(|m| m.text)
        .collect();
    assert_eq!(stored, ["before", "offline one", "offline two"]);

    // A client that joins now sees the same conversation.
    let bob_token = server.state.tokens.issue("bob");
    let (bob, _bob_commands, _bob_handle) = spawn_client(server.addr, &bob_token);
    wait_for("bob history", || bob.lock().texts().len() == 3).await;

    commands.send(NetCommand::Shutdown).await.unwrap();
    let exit = handle.await.unwrap();
    assert!(exit.unsent.is_empty());
}

#[tokio::test]
async fn shutdown_during_outage_returns_unsent() {
    let server = TestServer::start().await;
    let token = server.state.tokens.issue("alice");
    let (transcript, commands, handle) = spawn_client(server.addr, &token);
    wait_for("open", || opens(&transcript) == 1).await;

    server.stop().await;
    wait_for("disconnect", || {
        transcript.lock().state() != ConnectionState::Open
    })
    .await;
    send(&commands, "never delivered").await;
    wait_for("placeholder", || {
        transcript.lock().count(EntryStatus::Sending) == 1
    })
    .await;

    commands.send(NetCommand::Shutdown).await.unwrap();
    let exit = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("session did not stop")
        .unwrap();
    assert_eq!(exit.unsent.len(), 1);
    assert_eq!(exit.unsent[0].text, "never delivered");
    assert!(server.state.history.is_empty());
}
