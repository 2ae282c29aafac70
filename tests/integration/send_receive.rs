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

//! End-to-end send/receive through a real session task and the in-memory
//! server.
//!
//! These tests validate:
//! - a message sent by the author ends as exactly one confirmed entry
//! - other connected users see it as a plain append
//! - history is replayed on connect, with `system` messages hidden
//! - a rejected token keeps the client retrying without giving up

use std::sync::Arc;
use std::time::{Duration, Instant};

use massg::chat::ConnectionState;
use massg::net::{self, NetCommand, NetConfig, SessionExit};
use massg::transport::endpoint_url;
use massg::ui::transcript::{EntryStatus, SharedTranscript, Transcript};
use massg_server::server::{ChatState, start_server_with_state};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

async fn start_server() -> (std::net::SocketAddr, Arc<ChatState>) {
    let state = Arc::new(ChatState::new());
    let (addr, _handle) = start_server_with_state("127.0.0.1:0", Arc::clone(&state))
        .await
        .expect("failed to start test server");
    (addr, state)
}

struct Client {
    transcript: SharedTranscript,
    commands: mpsc::Sender<NetCommand>,
    handle: JoinHandle<SessionExit<SharedTranscript>>,
}

impl Client {
    fn spawn(addr: std::net::SocketAddr, token: &str) -> Self {
        let endpoint = endpoint_url(&format!("http://{addr}"), token).unwrap();
        let mut config = NetConfig::new(endpoint);
        config.reconnect_delay = Duration::from_millis(50);
        let transcript = Transcript::shared();
        let (commands, handle) = net::spawn_session(config, Arc::clone(&transcript));
        Self {
            transcript,
            commands,
            handle,
        }
    }

    async fn send(&self, text: &str, image_url: Option<&str>) {
        self.commands
            .send(NetCommand::SendMessage {
                text: text.to_string(),
                image_url: image_url.map(str::to_string),
            })
            .await
            .unwrap();
    }

    fn state(&self) -> ConnectionState {
        self.transcript.lock().state()
    }

    fn texts(&self) -> Vec<String> {
        self.transcript
            .lock()
            .texts()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    async fn shutdown(self) -> SessionExit<SharedTranscript> {
        self.commands.send(NetCommand::Shutdown).await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), self.handle)
            .await
            .expect("session did not stop")
            .unwrap()
    }
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
async fn author_sees_one_confirmed_entry_and_others_see_append() {
    let (addr, state) = start_server().await;
    let alice = Client::spawn(addr, &state.tokens.issue("alice"));
    let bob = Client::spawn(addr, &state.tokens.issue("bob"));
    wait_for("both connected", || {
        alice.state() == ConnectionState::Open && bob.state() == ConnectionState::Open
    })
    .await;
    wait_for("both registered", || state.connection_count() == 2).await;

    alice.send("hi", None).await;
    wait_for("alice confirmed", || {
        alice.transcript.lock().count(EntryStatus::Confirmed) == 1
    })
    .await;
    wait_for("bob received", || bob.texts() == ["hi"]).await;

    {
        let transcript = alice.transcript.lock();
        assert_eq!(transcript.entries().len(), 1);
        assert_eq!(transcript.count(EntryStatus::Sending), 0);
        assert_eq!(transcript.entries()[0].username.as_deref(), Some("alice"));
    }
    {
        let transcript = bob.transcript.lock();
        assert_eq!(transcript.entries()[0].username.as_deref(), Some("alice"));
        assert_eq!(transcript.entries()[0].status, EntryStatus::Confirmed);
    }

    // The server stored it once, without the correlation id.
    let history = state.history.snapshot();
    assert_eq!(history.len(), 1);
    assert!(history[0].client_id.is_none());

    let exit = alice.shutdown().await;
    assert!(exit.unsent.is_empty());
    bob.shutdown().await;
}

#[tokio::test]
async fn message_sent_before_connect_is_confirmed_once() {
    let (addr, state) = start_server().await;
    let alice = Client::spawn(addr, &state.tokens.issue("alice"));
    // Queued before the first connection has opened.
    alice.send("early", None).await;

    wait_for("confirmation", || {
        alice.transcript.lock().count(EntryStatus::Confirmed) == 1
    })
    .await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(alice.texts(), ["early"]);
    assert_eq!(state.history.len(), 1);
    alice.shutdown().await;
}

#[tokio::test]
async fn history_is_replayed_without_system_messages() {
    let (addr, state) = start_server().await;
    state.history.append("carol", "first", "");
    state.history.append("system", "carol joined", "");
    state.history.append("dave", "", "/uploads/pic.png");

    let alice = Client::spawn(addr, &state.tokens.issue("alice"));
    wait_for("history", || alice.texts().len() == 2).await;

    let transcript = alice.transcript.lock();
    let entries = transcript.entries();
    assert_eq!(entries[0].username.as_deref(), Some("carol"));
    assert_eq!(entries[0].text, "first");
    assert_eq!(entries[1].image_url.as_deref(), Some("/uploads/pic.png"));
    assert!(entries.iter().all(|e| e.status == EntryStatus::Confirmed));
    assert_eq!(transcript.cleared(), 1);
}

#[tokio::test]
async fn image_message_round_trips() {
    let (addr, state) = start_server().await;
    let alice = Client::spawn(addr, &state.tokens.issue("alice"));
    wait_for("connected", || alice.state() == ConnectionState::Open).await;

    alice.send("look", Some("/uploads/cat.png")).await;
    wait_for("confirmation", || {
        alice.transcript.lock().count(EntryStatus::Confirmed) == 1
    })
    .await;
    let entry = alice.transcript.lock().entries()[0].clone();
    assert_eq!(entry.text, "look");
    assert_eq!(entry.image_url.as_deref(), Some("/uploads/cat.png"));
}

#[tokio::test]
async fn blank_message_is_rejected_locally() {
    let (addr, state) = start_server().await;
    let alice = Client::spawn(addr, &state.tokens.issue("alice"));
    wait_for("connected", || alice.state() == ConnectionState::Open).await;

    alice.send("   ", None).await;
    wait_for("notice", || !alice.transcript.lock().notices().is_empty()).await;
    assert!(alice.texts().is_empty());
    assert!(state.history.is_empty());
}

#[tokio::test]
async fn rejected_token_keeps_retrying() {
    let (addr, _state) = start_server().await;
    let mallory = Client::spawn(addr, "not-a-token");

    wait_for("several attempts", || {
        mallory
            .transcript
            .lock()
            .states()
            .iter()
            .filter(|s| **s == ConnectionState::Connecting)
            .count()
            >= 3
    })
    .await;
    assert!(mallory.texts().is_empty());
    mallory.shutdown().await;
}
