//! Error handling for the chat transport and client
//!
//! The chat engine itself never fails; everything here belongs to the
//! RPC layer wrapped around it.

use std::fmt;

/// Result type alias for transport and client operations
pub type Result<T> = std::result::Result<T, ChatError>;

/// Chat transport error types
#[derive(Debug, Clone)]
pub enum ChatError {
    /// Network-related errors
    Network(String),
    /// Protocol errors (bad frame, unexpected reply type)
    Protocol(String),
    /// Connection errors
    Connection(String),
    /// Invalid request or user input
    InvalidMessage(String),
    /// Error reply sent back by the server
    Server(String),
    /// Internal error
    Internal(String),
    /// Configuration error
    Config(String),
    /// Timeout error
    Timeout(String),
}

impl ChatError {
    /// Get error code for this error type
    pub fn code(&self) -> u32 {
        match self {
            ChatError::Network(_) => 1000,
            ChatError::Protocol(_) => 1003,
            ChatError::Connection(_) => 1004,
            ChatError::InvalidMessage(_) => 1005,
            ChatError::Server(_) => 1006,
            ChatError::Internal(_) => 1009,
            ChatError::Config(_) => 1010,
            ChatError::Timeout(_) => 1011,
        }
    }

    /// Get human-readable error message
    pub fn message(&self) -> &str {
        match self {
            ChatError::Network(msg)
            | ChatError::Protocol(msg)
            | ChatError::Connection(msg)
            | ChatError::InvalidMessage(msg)
            | ChatError::Server(msg)
            | ChatError::Internal(msg)
            | ChatError::Config(msg)
            | ChatError::Timeout(msg) => msg,
        }
    }

    /// Whether the underlying connection is gone and retrying is pointless
    pub fn is_fatal(&self) -> bool {
        matches!(self, ChatError::Connection(_))
    }

    pub fn network<T: Into<String>>(msg: T) -> Self {
        ChatError::Network(msg.into())
    }

    pub fn protocol<T: Into<String>>(msg: T) -> Self {
        ChatError::Protocol(msg.into())
    }

    pub fn connection<T: Into<String>>(msg: T) -> Self {
        ChatError::Connection(msg.into())
    }

    pub fn invalid_message<T: Into<String>>(msg: T) -> Self {
        ChatError::InvalidMessage(msg.into())
    }

    pub fn server<T: Into<String>>(msg: T) -> Self {
        ChatError::Server(msg.into())
    }

    pub fn internal<T: Into<String>>(msg: T) -> Self {
        ChatError::Internal(msg.into())
    }

    pub fn config<T: Into<String>>(msg: T) -> Self {
        ChatError::Config(msg.into())
    }

    pub fn timeout<T: Into<String>>(msg: T) -> Self {
        ChatError::Timeout(msg.into())
    }
}

impl fmt::Display for ChatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatError::Network(msg) => write!(f, "Network error: {}", msg),
            ChatError::Protocol(msg) => write!(f, "Protocol error: {}", msg),
            ChatError::Connection(msg) => write!(f, "Connection error: {}", msg),
            ChatError::InvalidMessage(msg) => write!(f, "Invalid message: {}", msg),
            ChatError::Server(msg) => write!(f, "Server error: {}", msg),
            ChatError::Internal(msg) => write!(f, "Internal error: {}", msg),
            ChatError::Config(msg) => write!(f, "Configuration error: {}", msg),
            ChatError::Timeout(msg) => write!(f, "Timeout: {}", msg),
        }
    }
}

impl std::error::Error for ChatError {}

impl From<std::io::Error> for ChatError {
    fn from(err: std::io::Error) -> Self {
        ChatError::Network(format!("IO error: {}", err))
    }
}

impl From<quinn::ConnectError> for ChatError {
    fn from(err: quinn::ConnectError) -> Self {
        ChatError::Connection(format!("QUIC connection error: {}", err))
    }
}

impl From<quinn::ConnectionError> for ChatError {
    fn from(err: quinn::ConnectionError) -> Self {
        ChatError::Connection(format!("QUIC connection error: {}", err))
    }
}

impl From<quinn::WriteError> for ChatError {
    fn from(err: quinn::WriteError) -> Self {
        ChatError::Network(format!("QUIC write error: {}", err))
    }
}

impl From<quinn::ReadToEndError> for ChatError {
    fn from(err: quinn::ReadToEndError) -> Self {
        ChatError::Network(format!("QUIC read to end error: {}", err))
    }
}

impl From<quinn::ClosedStream> for ChatError {
    fn from(err: quinn::ClosedStream) -> Self {
        ChatError::Connection(format!("Stream closed: {}", err))
    }
}

impl From<rustls::Error> for ChatError {
    fn from(err: rustls::Error) -> Self {
        ChatError::Config(format!("TLS error: {}", err))
    }
}
