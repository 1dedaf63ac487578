//! Request and reply payloads carried inside frames
//!
//! One request struct per chat operation, one reply struct per request, plus
//! [`ErrorReply`] for requests the server could not process. Payloads are JSON.

use serde::{Deserialize, Serialize};

pub use crate::engine::{Message, RoomInfo};

// =============================================================================
// Requests (0x10 - 0x2F) - Client -> Server
// =============================================================================

/// Post a message to a room
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendMessage {
    pub username: String,
    pub text: String,
    pub room: String,
}

/// Fetch messages from a room starting at a client-held cursor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveMessage {
    pub room: String,
    /// Index of the first message wanted
    pub from_index: i64,
}

/// List every room
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListRooms {}

/// Join a room (created if missing)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinRoom {
    pub username: String,
    pub room: String,
}

/// Leave a room
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveRoom {
    pub username: String,
    pub room: String,
}

// =============================================================================
// Replies (0x30 - 0x4F) - Server -> Client
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendMessageReply {
    pub success: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveMessageReply {
    /// Messages in index order
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListRoomsReply {
    pub rooms: Vec<RoomInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinRoomReply {
    pub success: bool,
    pub message: String,
    /// Members in the room after the join
    pub user_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveRoomReply {
    pub success: bool,
    pub message: String,
    /// Members left in the room
    pub remaining_users: usize,
}

// =============================================================================
// Error Reply (0xFF)
// =============================================================================

/// Error response for requests that never reached the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReply {
    pub code: u32,
    pub message: String,
}

impl ErrorReply {
    pub const INVALID_FRAME: u32 = 1001;
    pub const INVALID_REQUEST: u32 = 1007;
    pub const REQUEST_TOO_LARGE: u32 = 1008;
    pub const SERVER_ERROR: u32 = 1010;

    pub fn new(code: u32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn invalid_frame(message: impl Into<String>) -> Self {
        Self::new(Self::INVALID_FRAME, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(Self::INVALID_REQUEST, message)
    }

    pub fn request_too_large(max: usize) -> Self {
        Self::new(
            Self::REQUEST_TOO_LARGE,
            format!("Request too large (max: {} bytes)", max),
        )
    }

    pub fn server_error(message: impl Into<String>) -> Self {
        Self::new(Self::SERVER_ERROR, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_receive_message_wire_shape() {
        let json = serde_json::to_value(ReceiveMessage {
            room: "general".to_string(),
            from_index: -1,
        })
        .unwrap();

        assert_eq!(json["room"], "general");
        assert_eq!(json["from_index"], -1);
    }

    #[test]
    fn test_message_reply_wire_shape() {
        let reply = ReceiveMessageReply {
            messages: vec![Message {
                username: "alice".to_string(),
                text: "hi".to_string(),
                room: "general".to_string(),
                timestamp: 1_700_000_000_000,
            }],
        };

        let json = serde_json::to_value(&reply).unwrap();
        let first = &json["messages"][0];
        assert_eq!(first["username"], "alice");
        assert_eq!(first["text"], "hi");
        assert_eq!(first["room"], "general");
        assert_eq!(first["timestamp"], 1_700_000_000_000u64);
    }

    #[test]
    fn test_list_rooms_accepts_empty_object() {
        let request: ListRooms = serde_json::from_str("{}").unwrap();
        assert_eq!(request, ListRooms {});

        let reply: ListRoomsReply =
            serde_json::from_str(r#"{"rooms":[{"room_name":"tech"}]}"#).unwrap();
        assert_eq!(reply.rooms[0].room_name, "tech");
    }

    #[test]
    fn test_error_constructors() {
        let err = ErrorReply::invalid_request("missing field `room`");
        assert_eq!(err.code, ErrorReply::INVALID_REQUEST);

        let err = ErrorReply::request_too_large(1024);
        assert_eq!(err.code, ErrorReply::REQUEST_TOO_LARGE);
        assert!(err.message.contains("1024"));
    }
}
