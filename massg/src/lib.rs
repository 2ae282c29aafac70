//! `massg`: realtime chat client library.
//!
//! The core is [`chat::ChatSession`]: one owned object holding the
//! connection state, the outbound queue and the pending-echo registry,
//! driven by discrete [`chat::SessionEvent`]s. [`net`] runs it on tokio
//! over a real WebSocket; [`ui`] provides the rendering side.

pub mod auth;
pub mod chat;
pub mod config;
pub mod net;
pub mod transport;
pub mod ui;
