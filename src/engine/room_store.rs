//! Per-room append-only message logs
//!
//! Rooms are created lazily (first join or first send) and never removed.
//! A message's position in its room log is its index; indices start at zero
//! and grow by one per append.

use std::collections::BTreeMap;

use super::Message;
use crate::current_timestamp;

/// Storage for every room's message log, keyed by room name.
///
/// `BTreeMap` keeps room enumeration in name order.
#[derive(Debug, Default)]
pub struct RoomStore {
    rooms: BTreeMap<String, Vec<Message>>,
}

impl RoomStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty log for `name` if it does not exist yet
    pub fn ensure_room(&mut self, name: &str) {
        if !self.rooms.contains_key(name) {
            self.rooms.insert(name.to_string(), Vec::new());
        }
    }

    /// Append a message to `room`, creating the room if needed.
    ///
    /// Returns the index assigned to the new message.
    pub fn append(&mut self, room: &str, username: &str, text: &str) -> usize {
        let log = self.rooms.entry(room.to_string()).or_default();

        let index = log.len();
        log.push(Message {
            username: username.to_string(),
            text: text.to_string(),
            room: room.to_string(),
            timestamp: current_timestamp(),
        });
        index
    }

    /// All messages of `room` at index >= `from_index`, in log order.
    ///
    /// Unknown rooms and out-of-range cursors (negative, or past the end of
    /// the log) yield an empty vector.
    pub fn messages_from(&self, room: &str, from_index: i64) -> Vec<Message> {
        let Some(log) = self.rooms.get(room) else {
            return Vec::new();
        };

        match usize::try_from(from_index) {
            Ok(start) if start <= log.len() => log[start..].to_vec(),
            _ => Vec::new(),
        }
    }

    /// Names of every room ever created, in name order
    pub fn room_names(&self) -> Vec<String> {
        self.rooms.keys().cloned().collect()
    }

    pub fn contains(&self, room: &str) -> bool {
        self.rooms.contains_key(room)
    }

    /// Length of a room's log (0 for unknown rooms)
    pub fn log_len(&self, room: &str) -> usize {
        self.rooms.get(room).map(Vec::len).unwrap_or(0)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Total number of messages across all rooms
    pub fn message_count(&self) -> usize {
        self.rooms.values().map(Vec::len).sum()
    }
}
