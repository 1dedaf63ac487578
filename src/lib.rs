//! Multi-room chat over QUIC
//!
//! This library provides an in-memory chat engine (rooms with append-only
//! message logs, plus a user/room membership registry), a QUIC RPC server
//! exposing it, a client for that server and an interactive console client.
//!
//! Clients fetch new messages by polling with a per-room cursor; the server
//! never pushes.

pub mod client;
pub mod console;
pub mod engine;
pub mod error;
pub mod protocol;
pub mod server;

pub use client::{ChatClient, ChatClientConfig};
pub use console::{Console, ConsoleConfig};
pub use engine::{ChatEngine, Message, RoomInfo};
pub use error::{ChatError, Result};
pub use server::ChatServer;

use std::net::SocketAddr;
use std::time::{SystemTime, UNIX_EPOCH};

/// Room every client lands in on startup
pub const DEFAULT_ROOM: &str = "general";

/// ALPN identifier negotiated by client and server
pub const ALPN_PROTOCOL: &[u8] = b"roomchat";

/// Get current timestamp in milliseconds since UNIX epoch
pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Chat server configuration
#[derive(Clone, Debug)]
pub struct ChatConfig {
    /// Server listen address
    pub bind_addr: SocketAddr,
    /// Maximum number of concurrent connections
    pub max_connections: usize,
    /// Connection idle timeout in seconds
    pub idle_timeout_secs: u64,
    /// Maximum request size in bytes
    pub max_request_size: usize,
    /// Maximum reply payload in bytes, never above [`protocol::MAX_FRAME_SIZE`]
    pub max_reply_size: usize,
    /// Room created when the server starts
    pub default_room: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 4433)),
            max_connections: 1000,
            idle_timeout_secs: 300,
            max_request_size: 1024 * 1024, // 1MB
            max_reply_size: protocol::MAX_FRAME_SIZE,
            default_room: DEFAULT_ROOM.to_string(),
        }
    }
}
