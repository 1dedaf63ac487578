//! Codec for encoding/decoding protocol messages to/from frames
//!
//! This module provides the bridge between typed messages and binary frames,
//! and the two closed message sets: [`Request`] and [`Reply`].

use super::frame::{Frame, FrameType};
use super::messages::*;
use bytes::Bytes;
use std::io::{self, Error as IoError, ErrorKind};

/// Trait for messages that can be encoded to frames
pub trait Encodable {
    /// Get the frame type for this message
    fn frame_type(&self) -> FrameType;

    /// Encode the message payload to bytes
    fn encode_payload(&self) -> io::Result<Bytes>;

    /// Encode the complete frame
    fn encode_frame(&self) -> io::Result<Frame> {
        Ok(Frame::new(self.frame_type(), self.encode_payload()?))
    }
}

/// Trait for messages that can be decoded from frames
pub trait Decodable: Sized {
    /// Expected frame type for this message
    fn expected_frame_type() -> FrameType;

    /// Decode the message from a payload
    fn decode_payload(payload: &[u8]) -> io::Result<Self>;

    /// Decode from a complete frame, validating the frame type
    fn decode_frame(frame: &Frame) -> io::Result<Self> {
        if frame.frame_type != Self::expected_frame_type() {
            return Err(IoError::new(
                ErrorKind::InvalidData,
                format!(
                    "Expected frame type {:?}, got {:?}",
                    Self::expected_frame_type(),
                    frame.frame_type
                ),
            ));
        }
        Self::decode_payload(&frame.payload)
    }
}

/// Helper macro to implement Encodable and Decodable for a message type
macro_rules! impl_codec {
    ($type:ty, $frame_type:expr) => {
        impl Encodable for $type {
            fn frame_type(&self) -> FrameType {
                $frame_type
            }

            fn encode_payload(&self) -> io::Result<Bytes> {
                serde_json::to_vec(self)
                    .map(Bytes::from)
                    .map_err(|e| IoError::new(ErrorKind::InvalidData, e))
            }
        }

        impl Decodable for $type {
            fn expected_frame_type() -> FrameType {
                $frame_type
            }

            fn decode_payload(payload: &[u8]) -> io::Result<Self> {
                serde_json::from_slice(payload).map_err(|e| IoError::new(ErrorKind::InvalidData, e))
            }
        }
    };
}

// Requests
impl_codec!(SendMessage, FrameType::SendMessage);
impl_codec!(ReceiveMessage, FrameType::ReceiveMessage);
impl_codec!(ListRooms, FrameType::ListRooms);
impl_codec!(JoinRoom, FrameType::JoinRoom);
impl_codec!(LeaveRoom, FrameType::LeaveRoom);

// Replies
impl_codec!(SendMessageReply, FrameType::SendMessageReply);
impl_codec!(ReceiveMessageReply, FrameType::ReceiveMessageReply);
impl_codec!(ListRoomsReply, FrameType::ListRoomsReply);
impl_codec!(JoinRoomReply, FrameType::JoinRoomReply);
impl_codec!(LeaveRoomReply, FrameType::LeaveRoomReply);

// Error
impl_codec!(ErrorReply, FrameType::Error);

/// Every request a client can make
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    SendMessage(SendMessage),
    ReceiveMessage(ReceiveMessage),
    ListRooms(ListRooms),
    JoinRoom(JoinRoom),
    LeaveRoom(LeaveRoom),
}

impl Request {
    /// Decode a request frame; reply and error frames are rejected
    pub fn decode(frame: &Frame) -> io::Result<Self> {
        match frame.frame_type {
            FrameType::SendMessage => Ok(Self::SendMessage(decode(frame)?)),
            FrameType::ReceiveMessage => Ok(Self::ReceiveMessage(decode(frame)?)),
            FrameType::ListRooms => Ok(Self::ListRooms(decode(frame)?)),
            FrameType::JoinRoom => Ok(Self::JoinRoom(decode(frame)?)),
            FrameType::LeaveRoom => Ok(Self::LeaveRoom(decode(frame)?)),
            other => Err(IoError::new(
                ErrorKind::InvalidData,
                format!("Expected a request frame, got {:?}", other),
            )),
        }
    }

    /// Operation name, for logging
    pub fn operation(&self) -> &'static str {
        match self {
            Self::SendMessage(_) => "SendMessage",
            Self::ReceiveMessage(_) => "ReceiveMessage",
            Self::ListRooms(_) => "ListRooms",
            Self::JoinRoom(_) => "JoinRoom",
            Self::LeaveRoom(_) => "LeaveRoom",
        }
    }
}

impl Encodable for Request {
    fn frame_type(&self) -> FrameType {
        match self {
            Self::SendMessage(m) => m.frame_type(),
            Self::ReceiveMessage(m) => m.frame_type(),
            Self::ListRooms(m) => m.frame_type(),
            Self::JoinRoom(m) => m.frame_type(),
            Self::LeaveRoom(m) => m.frame_type(),
        }
    }

    fn encode_payload(&self) -> io::Result<Bytes> {
        match self {
            Self::SendMessage(m) => m.encode_payload(),
            Self::ReceiveMessage(m) => m.encode_payload(),
            Self::ListRooms(m) => m.encode_payload(),
            Self::JoinRoom(m) => m.encode_payload(),
            Self::LeaveRoom(m) => m.encode_payload(),
        }
    }
}

/// Every reply a server can send
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    SendMessage(SendMessageReply),
    ReceiveMessage(ReceiveMessageReply),
    ListRooms(ListRoomsReply),
    JoinRoom(JoinRoomReply),
    LeaveRoom(LeaveRoomReply),
    Error(ErrorReply),
}

impl Reply {
    /// Decode a reply frame; request frames are rejected
    pub fn decode(frame: &Frame) -> io::Result<Self> {
        match frame.frame_type {
            FrameType::SendMessageReply => Ok(Self::SendMessage(decode(frame)?)),
            FrameType::ReceiveMessageReply => Ok(Self::ReceiveMessage(decode(frame)?)),
            FrameType::ListRoomsReply => Ok(Self::ListRooms(decode(frame)?)),
            FrameType::JoinRoomReply => Ok(Self::JoinRoom(decode(frame)?)),
            FrameType::LeaveRoomReply => Ok(Self::LeaveRoom(decode(frame)?)),
            FrameType::Error => Ok(Self::Error(decode(frame)?)),
            other => Err(IoError::new(
                ErrorKind::InvalidData,
                format!("Expected a reply frame, got {:?}", other),
            )),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

impl Encodable for Reply {
    fn frame_type(&self) -> FrameType {
        match self {
            Self::SendMessage(m) => m.frame_type(),
            Self::ReceiveMessage(m) => m.frame_type(),
            Self::ListRooms(m) => m.frame_type(),
            Self::JoinRoom(m) => m.frame_type(),
            Self::LeaveRoom(m) => m.frame_type(),
            Self::Error(m) => m.frame_type(),
        }
    }

    fn encode_payload(&self) -> io::Result<Bytes> {
        match self {
            Self::SendMessage(m) => m.encode_payload(),
            Self::ReceiveMessage(m) => m.encode_payload(),
            Self::ListRooms(m) => m.encode_payload(),
            Self::JoinRoom(m) => m.encode_payload(),
            Self::LeaveRoom(m) => m.encode_payload(),
            Self::Error(m) => m.encode_payload(),
        }
    }
}

/// Decode a frame to a specific message type (convenience function)
pub fn decode<T: Decodable>(frame: &Frame) -> io::Result<T> {
    T::decode_frame(frame)
}
