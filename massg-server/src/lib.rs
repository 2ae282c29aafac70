//! `massg` development server library.
//!
//! Exposes the chat server for use in tests and embedding. The server
//! accepts token-authenticated WebSocket connections, replays the stored
//! history to each new connection, and broadcasts every accepted message to
//! all connections with the author's correlation id attached.

pub mod auth;
pub mod config;
pub mod server;
pub mod store;
