//! Binary frame protocol with length-prefixed messages
//!
//! Frame format:
//! ```text
//! +---------+---------------+------------+
//! | type    | length        | payload    |
//! | (1 byte)| (4 bytes, BE) | (variable) |
//! +---------+---------------+------------+
//! ```

use bytes::{BufMut, Bytes, BytesMut};
use std::io;

/// Frame header size: 1 byte type + 4 bytes length
pub const FRAME_HEADER_SIZE: usize = 5;

/// Maximum frame payload size (16 MB)
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Frame types, one per request and reply shape
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameType {
    // Requests, client -> server (0x10 - 0x2F)
    SendMessage = 0x10,
    ReceiveMessage = 0x11,
    ListRooms = 0x12,
    JoinRoom = 0x13,
    LeaveRoom = 0x14,

    // Replies, server -> client (0x30 - 0x4F)
    SendMessageReply = 0x30,
    ReceiveMessageReply = 0x31,
    ListRoomsReply = 0x32,
    JoinRoomReply = 0x33,
    LeaveRoomReply = 0x34,

    // Error (0xFF)
    Error = 0xFF,
}

impl FrameType {
    /// Convert from u8, returns None for unknown types
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x10 => Some(FrameType::SendMessage),
            0x11 => Some(FrameType::ReceiveMessage),
            0x12 => Some(FrameType::ListRooms),
            0x13 => Some(FrameType::JoinRoom),
            0x14 => Some(FrameType::LeaveRoom),

            0x30 => Some(FrameType::SendMessageReply),
            0x31 => Some(FrameType::ReceiveMessageReply),
            0x32 => Some(FrameType::ListRoomsReply),
            0x33 => Some(FrameType::JoinRoomReply),
            0x34 => Some(FrameType::LeaveRoomReply),

            0xFF => Some(FrameType::Error),
            _ => None,
        }
    }
}

/// A single protocol frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub frame_type: FrameType,
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame with the given type and payload
    pub fn new(frame_type: FrameType, payload: impl Into<Bytes>) -> Self {
        Self {
            frame_type,
            payload: payload.into(),
        }
    }

    /// Get the total encoded size of this frame
    pub fn encoded_size(&self) -> usize {
        FRAME_HEADER_SIZE + self.payload.len()
    }

    /// Encode this frame into a buffer.
    ///
    /// Payloads over [`MAX_FRAME_SIZE`] are rejected; the peer would refuse them.
    pub fn encode(&self, buf: &mut BytesMut) -> io::Result<()> {
        let payload_len = check_payload_len(self.payload.len())?;
        buf.reserve(self.encoded_size());
        buf.put_u8(self.frame_type as u8);
        buf.put_u32(payload_len as u32);
        buf.put_slice(&self.payload);
        Ok(())
    }

    /// Encode this frame into a new Bytes
    pub fn encode_to_bytes(&self) -> io::Result<Bytes> {
        let mut buf = BytesMut::with_capacity(self.encoded_size());
        self.encode(&mut buf)?;
        Ok(buf.freeze())
    }

    /// Decode a single frame from a complete buffer.
    ///
    /// Used for stream-per-request transport, where the whole stream is one
    /// frame; trailing bytes are rejected.
    pub fn decode_complete(data: &[u8]) -> io::Result<Frame> {
        if data.len() < FRAME_HEADER_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "Incomplete frame header",
            ));
        }

        let frame_type = parse_frame_type(data[0])?;
        let payload_len =
            check_payload_len(u32::from_be_bytes([data[1], data[2], data[3], data[4]]) as usize)?;

        let expected_len = FRAME_HEADER_SIZE + payload_len;
        if data.len() != expected_len {
            return Err(io::Error::new(
                if data.len() < expected_len {
                    io::ErrorKind::UnexpectedEof
                } else {
                    io::ErrorKind::InvalidData
                },
                format!(
                    "Frame length mismatch: expected {} bytes, got {}",
                    expected_len,
                    data.len()
                ),
            ));
        }

        let payload = Bytes::copy_from_slice(&data[FRAME_HEADER_SIZE..]);

        Ok(Frame {
            frame_type,
            payload,
        })
    }
}

fn parse_frame_type(byte: u8) -> io::Result<FrameType> {
    FrameType::from_u8(byte).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Unknown frame type: 0x{:02X}", byte),
        )
    })
}

fn check_payload_len(len: usize) -> io::Result<usize> {
    if len > MAX_FRAME_SIZE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "Frame payload too large: {} bytes (max: {})",
                len, MAX_FRAME_SIZE
            ),
        ));
    }
    Ok(len)
}
