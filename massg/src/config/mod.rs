//! Configuration system for the `massg` client.
//!
//! Supports layered configuration with the following priority (highest first):
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/massg/config.toml`)
//! 4. Compiled defaults
//!
//! Missing config file is not an error (defaults are used). An explicit
//! `--config` path that doesn't exist is an error.

use std::path::PathBuf;
use std::time::Duration;

use crate::auth::{Credentials, StaticAuth};
use crate::net::NetConfig;
use crate::transport::{self, TransportError};

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),

    /// No server URL was given anywhere.
    #[error("no server URL configured (use --server-url or MASSG_SERVER_URL)")]
    MissingServerUrl,

    /// The server URL cannot be turned into a WebSocket endpoint.
    #[error("bad server URL: {0}")]
    Endpoint(#[from] TransportError),
}

// ---------------------------------------------------------------------------
// TOML file structs (all fields Option for partial overrides)
// ---------------------------------------------------------------------------

/// Top-level TOML config file structure.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ConfigFile {
    server: ServerFileConfig,
    session: SessionFileConfig,
    ui: UiFileConfig,
}

/// `[server]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ServerFileConfig {
    url: Option<String>,
    token: Option<String>,
    username: Option<String>,
    connect_timeout_secs: Option<u64>,
    reconnect_delay_ms: Option<u64>,
}

/// `[session]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct SessionFileConfig {
    channel_capacity: Option<usize>,
}

/// `[ui]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct UiFileConfig {
    timestamp_format: Option<String>,
}

// ---------------------------------------------------------------------------
// Resolved configuration (concrete types, all fields populated)
// ---------------------------------------------------------------------------

/// Fully resolved client configuration.
#[derive(Clone)]
pub struct ClientConfig {
    // -- Server --
    /// Base URL of the chat server (`http`, `https`, `ws` or `wss`).
    pub server_url: Option<String>,
    /// Bearer token for the WebSocket endpoint.
    pub token: Option<String>,
    /// Local display name.
    pub username: Option<String>,
    /// Timeout for one connection attempt.
    pub connect_timeout: Duration,
    /// Fixed delay before reconnecting.
    pub reconnect_delay: Duration,

    // -- Session --
    /// Capacity of the command channel.
    pub channel_capacity: usize,

    // -- UI --
    /// Timestamp display format string (chrono).
    pub timestamp_format: String,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("server_url", &self.server_url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("username", &self.username)
            .field("connect_timeout", &self.connect_timeout)
            .field("reconnect_delay", &self.reconnect_delay)
            .field("channel_capacity", &self.channel_capacity)
            .field("timestamp_format", &self.timestamp_format)
            .finish()
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: None,
            token: None,
            username: None,
            connect_timeout: Duration::from_secs(10),
            reconnect_delay: Duration::from_millis(800),
            channel_capacity: 256,
            timestamp_format: "%H:%M".to_string(),
        }
    }
}

impl ClientConfig {
    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// If `--config` is given and the file does not exist, returns an
    /// error. If no `--config` is given, the default path
    /// (`~/.config/massg/config.toml`) is tried and silently ignored if
    /// missing.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the config file cannot be read or parsed.
    pub fn load(cli: &CliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Ok(Self::resolve(cli, &file))
    }

    /// Resolve a `ClientConfig` from CLI args and a parsed config file.
    ///
    /// Priority: CLI > file > default. Separate from `load()` so it can be
    /// tested without CLI parsing.
    #[must_use]
    fn resolve(cli: &CliArgs, file: &ConfigFile) -> Self {
        let defaults = Self::default();

        Self {
            server_url: cli
                .server_url
                .clone()
                .or_else(|| file.server.url.clone()),
            token: cli.token.clone().or_else(|| file.server.token.clone()),
            username: cli
                .username
                .clone()
                .or_else(|| file.server.username.clone()),
            connect_timeout: file
                .server
                .connect_timeout_secs
                .map_or(defaults.connect_timeout, Duration::from_secs),
            reconnect_delay: cli
                .reconnect_delay_ms
                .or(file.server.reconnect_delay_ms)
                .map_or(defaults.reconnect_delay, Duration::from_millis),
            channel_capacity: file
                .session
                .channel_capacity
                .unwrap_or(defaults.channel_capacity),
            timestamp_format: cli
                .timestamp_format
                .clone()
                .or_else(|| file.ui.timestamp_format.clone())
                .unwrap_or(defaults.timestamp_format),
        }
    }

    /// The auth provider backed by the configured token and username.
    #[must_use]
    pub fn auth(&self) -> StaticAuth {
        StaticAuth::new(self.token.clone(), self.username.clone())
    }

    /// Build a [`NetConfig`] for connecting with `credentials`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingServerUrl`] if no server URL is set,
    /// or [`ConfigError::Endpoint`] if it cannot be mapped to a WebSocket
    /// endpoint.
    pub fn to_net_config(&self, credentials: &Credentials) -> Result<NetConfig, ConfigError> {
        let server_url = self
            .server_url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or(ConfigError::MissingServerUrl)?;
        let endpoint = transport::endpoint_url(server_url, &credentials.token)?;

        Ok(NetConfig {
            endpoint,
            reconnect_delay: self.reconnect_delay,
            connect_timeout: self.connect_timeout,
            channel_capacity: self.channel_capacity,
        })
    }
}

/// CLI arguments parsed by clap.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "Realtime terminal chat client")]
pub struct CliArgs {
    /// Base URL of the chat server (e.g. `http://127.0.0.1:8000`).
    #[arg(long, env = "MASSG_SERVER_URL")]
    pub server_url: Option<String>,

    /// Access token issued by the server.
    #[arg(long, env = "MASSG_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Your display name.
    #[arg(long, env = "MASSG_USER")]
    pub username: Option<String>,

    /// Path to config file (default: `~/.config/massg/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Delay before reconnecting, in milliseconds.
    #[arg(long)]
    pub reconnect_delay_ms: Option<u64>,

    /// Timestamp display format (chrono format string).
    #[arg(long)]
    pub timestamp_format: Option<String>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "MASSG_LOG")]
    pub log_level: String,

    /// Path to log file (default: `$TMPDIR/massg.log`).
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Load and parse a TOML config file.
///
/// If `explicit_path` is `Some`, the file must exist (error if not).
/// If `explicit_path` is `None`, the default path is tried and missing file
/// is treated as empty config.
fn load_config_file(explicit_path: Option<&std::path::Path>) -> Result<ConfigFile, ConfigError> {
    let path = if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    } else {
        let Some(config_dir) = dirs::config_dir() else {
            return Ok(ConfigFile::default());
        };
        config_dir.join("massg").join("config.toml")
    };

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}
