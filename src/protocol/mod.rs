//! Protocol layer for the chat RPC transport
//!
//! This module provides:
//! - Binary frame encoding/decoding
//! - Request and reply payload definitions
//! - Codec traits and the closed `Request` / `Reply` sets

pub mod codec;
pub mod frame;
pub mod messages;

// Re-export commonly used types
pub use codec::{Decodable, Encodable, Reply, Request, decode};
pub use frame::{FRAME_HEADER_SIZE, Frame, FrameType, MAX_FRAME_SIZE};
pub use messages::*;
