//! `massg`: realtime terminal chat client.
//!
//! Reads lines from stdin and sends them as chat messages; prints the
//! conversation to stdout. Configuration via CLI flags, environment
//! variables, or config file (`~/.config/massg/config.toml`).
//!
//! ```bash
//! cargo run --bin massg -- --server-url http://127.0.0.1:8000 \
//!     --token secret --username alice
//!
//! # Or via environment variables
//! MASSG_SERVER_URL=http://127.0.0.1:8000 MASSG_TOKEN=secret MASSG_USER=alice cargo run
//! ```
//!
//! Input: a plain line sends text, `/image <url> [caption]` sends an image
//! reference, `/quit` (or end of input) exits.

use std::io;
use std::path::Path;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_appender::non_blocking::WorkerGuard;

use massg::auth::AuthProvider;
use massg::config::{CliArgs, ClientConfig};
use massg::net::{self, NetCommand};
use massg::ui::console::ConsoleView;

#[tokio::main]
async fn main() -> io::Result<()> {
    let cli = CliArgs::parse();

    let config = match ClientConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            std::process::exit(1);
        }
    };

    // Logs go to a file; stdout is the chat display.
    let _log_guard = init_logging(&cli.log_level, cli.log_file.as_deref());
    tracing::info!("massg starting");

    let credentials = match config.auth().credentials() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Cannot connect: {e}");
            std::process::exit(2);
        }
    };
    let net_config = match config.to_net_config(&credentials) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Cannot connect: {e}");
            std::process::exit(2);
        }
    };

    println!(
        "massg: chatting as {} (/image <url> [caption], /quit)",
        credentials.username
    );
    let view = ConsoleView::new(io::stdout(), config.timestamp_format.clone());
    let (cmd_tx, session) = net::spawn_session(net_config, view);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let command = match parse_input(&line) {
            Input::Quit => break,
            Input::Nothing => continue,
            Input::Send { text, image_url } => NetCommand::SendMessage { text, image_url },
        };
        if cmd_tx.send(command).await.is_err() {
            tracing::warn!("session task ended early");
            break;
        }
    }

    let _ = cmd_tx.send(NetCommand::Shutdown).await;
    match session.await {
        Ok(exit) => {
            for draft in &exit.unsent {
                eprintln!("unsent: {}", draft.text);
            }
        }
        Err(e) => tracing::error!(error = %e, "session task failed"),
    }

    tracing::info!("massg exiting");
    Ok(())
}

/// Initialize file-based logging.
///
/// Returns a [`WorkerGuard`] that must be held until shutdown to ensure all
/// buffered log entries are flushed.
fn init_logging(level: &str, file_path: Option<&Path>) -> Option<WorkerGuard> {
    let default_path = std::env::temp_dir().join("massg.log");
    let log_path = file_path.unwrap_or(&default_path);

    let log_dir = log_path.parent()?;
    let file_name = log_path.file_name()?.to_str()?;

    let file_appender = tracing_appender::rolling::never(log_dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(env_filter)
        .with_ansi(false)
        .init();

    Some(guard)
}

/// One line of user input, interpreted.
#[derive(Debug, PartialEq, Eq)]
enum Input {
    /// Send a message.
    Send {
        text: String,
        image_url: Option<String>,
    },
    /// Leave.
    Quit,
    /// Blank line.
    Nothing,
}

fn parse_input(line: &str) -> Input {
    let line = line.trim();
    if line.is_empty() {
        return Input::Nothing;
    }
    if line == "/quit" {
        return Input::Quit;
    }
    if let Some(rest) = line.strip_prefix("/image ") {
        let rest = rest.trim_start();
        let (url, caption) = rest.split_once(' ').unwrap_or((rest, ""));
        return Input::Send {
            text: caption.trim().to_string(),
            image_url: Some(url.to_string()),
        };
    }
    Input::Send {
        text: line.to_string(),
        image_url: None,
    }
}
