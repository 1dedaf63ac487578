//! Request dispatch onto the chat engine
//!
//! Maps each [`Request`] variant onto exactly one [`ChatEngine`] operation and
//! wraps the result in the matching [`Reply`]. Transport-agnostic: anything
//! that can produce a `Request` can drive the engine through here.

use std::sync::Arc;

use tracing::debug;

use crate::engine::ChatEngine;
use crate::protocol::messages::*;
use crate::protocol::{MAX_FRAME_SIZE, Reply, Request};

/// Payload of a `ReceiveMessageReply` carrying no messages: `{"messages":[]}`
const EMPTY_RECEIVE_REPLY_SIZE: usize = 15;

/// Routes decoded requests to the engine
#[derive(Debug, Clone)]
pub struct Dispatcher {
    engine: Arc<ChatEngine>,
    /// Upper bound on a `ReceiveMessage` reply payload
    max_reply_size: usize,
}

impl Dispatcher {
    pub fn new(engine: Arc<ChatEngine>) -> Self {
        Self::with_reply_limit(engine, MAX_FRAME_SIZE)
    }

    /// Dispatcher whose message replies stay within `max_reply_size` bytes
    /// (itself capped at [`MAX_FRAME_SIZE`])
    pub fn with_reply_limit(engine: Arc<ChatEngine>, max_reply_size: usize) -> Self {
        Self {
            engine,
            max_reply_size: max_reply_size.min(MAX_FRAME_SIZE),
        }
    }

    /// Get the engine
    pub fn engine(&self) -> Arc<ChatEngine> {
        Arc::clone(&self.engine)
    }

    /// Run one request against the engine
    pub async fn dispatch(&self, request: Request) -> Reply {
        match request {
            Request::SendMessage(SendMessage {
                username,
                text,
                room,
            }) => {
                let success = self.engine.send_message(&username, &text, &room).await;
                Reply::SendMessage(SendMessageReply { success })
            }

            Request::ReceiveMessage(ReceiveMessage { room, from_index }) => {
                let mut messages = self.engine.receive_messages(&room, from_index).await;
                let available = messages.len();
                truncate_to_fit(&mut messages, self.max_reply_size);
                if messages.len() < available {
                    debug!(
                        "Reply for {} cut to {} of {} messages",
                        room,
                        messages.len(),
                        available
                    );
                }
                Reply::ReceiveMessage(ReceiveMessageReply { messages })
            }

            Request::ListRooms(ListRooms {}) => {
                let rooms = self.engine.list_rooms().await;
                Reply::ListRooms(ListRoomsReply { rooms })
            }

            Request::JoinRoom(JoinRoom { username, room }) => {
                let outcome = self.engine.join_room(&username, &room).await;
                let message = if outcome.newly_joined {
                    format!("joined room {}", room)
                } else {
                    format!("already in room {}", room)
                };
                Reply::JoinRoom(JoinRoomReply {
                    success: true,
                    message,
                    user_count: outcome.user_count,
                })
            }

            Request::LeaveRoom(LeaveRoom { username, room }) => {
                let outcome = self.engine.leave_room(&username, &room).await;
                let message = if outcome.was_member {
                    format!("left room {}", room)
                } else {
                    format!("not in room {}", room)
                };
                Reply::LeaveRoom(LeaveRoomReply {
                    success: true,
                    message,
                    remaining_users: outcome.remaining_users,
                })
            }
        }
    }
}

/// Keep the longest prefix of `messages` whose JSON reply fits in `budget`.
///
/// The first message is always kept, so a reader's cursor keeps advancing.
fn truncate_to_fit(messages: &mut Vec<Message>, budget: usize) {
    let mut used = EMPTY_RECEIVE_REPLY_SIZE;
    let mut keep = 0;

    for (index, message) in messages.iter().enumerate() {
        let separator = usize::from(index > 0);
        let size = serde_json::to_vec(message)
            .map(|json| json.len())
            .unwrap_or(usize::MAX)
            .saturating_add(separator);

        if keep > 0 && used.saturating_add(size) > budget {
            break;
        }
        used = used.saturating_add(size);
        keep += 1;
    }

    messages.truncate(keep);
}
