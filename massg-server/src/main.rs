//! `massg` development server -- in-memory chat backend.
//!
//! An axum WebSocket server speaking the `massg` JSON protocol: token check
//! on connect, history replay, and broadcast with correlation-id echo.
//!
//! # Usage
//!
//! ```bash
//! # Run on default address 0.0.0.0:8000 with one user
//! cargo run --bin massg-server -- --token alice=secret
//!
//! # Run on custom address
//! cargo run --bin massg-server -- --bind 127.0.0.1:8080 --token bob=t0k
//! ```

use std::sync::Arc;

use clap::Parser;
use massg_server::auth::TokenRegistry;
use massg_server::config::{ServerCliArgs, ServerConfig};
use massg_server::server::{self, ChatState};
use massg_server::store::HistoryStore;

#[tokio::main]
async fn main() {
    let cli = ServerCliArgs::parse();

    // Load config from CLI args + config file + env vars + defaults.
    let config = match ServerConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            std::process::exit(1);
        }
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    if config.tokens.is_empty() {
        tracing::warn!("no tokens configured; every connection will be rejected");
    }
    tracing::info!(addr = %config.bind_addr, users = config.tokens.len(), "starting massg server");

    let state = Arc::new(ChatState::with_config(
        TokenRegistry::with_tokens(config.tokens),
        HistoryStore::with_max_history(config.max_history),
    ));

    match server::start_server_with_state(&config.bind_addr, state).await {
        Ok((bound_addr, handle)) => {
            tracing::info!(addr = %bound_addr, "chat server listening");
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "chat server task failed");
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to start chat server");
            std::process::exit(1);
        }
    }
}
