//! Server-side chat state engine
//!
//! [`ChatEngine`] combines a [`RoomStore`] and a [`MembershipRegistry`] behind
//! one lock and exposes the five chat operations: send, receive, list rooms,
//! join and leave. None of them can fail; odd input degrades to an empty
//! result or a no-op.

pub mod membership;
pub mod room_store;

pub use membership::MembershipRegistry;
pub use room_store::RoomStore;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

/// A chat message as stored in a room log
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub username: String,
    pub text: String,
    pub room: String,
    /// Milliseconds since UNIX epoch, assigned at append time
    pub timestamp: u64,
}

/// Room listing entry
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomInfo {
    pub room_name: String,
}

/// Result of a join
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct JoinOutcome {
    /// Members in the room after the join
    pub user_count: usize,
    /// False when the user was already a member
    pub newly_joined: bool,
}

/// Result of a leave
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LeaveOutcome {
    /// Members left in the room
    pub remaining_users: usize,
    /// False when the user was not a member
    pub was_member: bool,
}

/// Engine-wide counters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub rooms: usize,
    pub messages: usize,
    pub memberships: usize,
}

#[derive(Debug, Default)]
struct EngineState {
    rooms: RoomStore,
    members: MembershipRegistry,
}

/// Facade over room logs and membership
///
/// Every operation runs under a single engine-wide lock, so operations are
/// linearizable and concurrent sends to a room get gap-free, unique indices.
#[derive(Debug, Default)]
pub struct ChatEngine {
    state: RwLock<EngineState>,
}

impl ChatEngine {
    /// Build an engine around existing state
    pub fn new(rooms: RoomStore, members: MembershipRegistry) -> Self {
        Self {
            state: RwLock::new(EngineState { rooms, members }),
        }
    }

    /// Append `text` from `username` to `room`, creating the room if needed.
    ///
    /// Always succeeds.
    pub async fn send_message(&self, username: &str, text: &str, room: &str) -> bool {
        let index = self.append_message(username, text, room).await;
        debug!("Message #{} from {} in room {}", index, username, room);
        true
    }

    /// Append like [`ChatEngine::send_message`] and return the index the
    /// message landed at
    pub async fn append_message(&self, username: &str, text: &str, room: &str) -> usize {
        let mut state = self.state.write().await;
        state.rooms.append(room, username, text)
    }

    /// Messages of `room` starting at `from_index`.
    ///
    /// The caller tracks its own cursor; nothing is recorded here.
    pub async fn receive_messages(&self, room: &str, from_index: i64) -> Vec<Message> {
        let state = self.state.read().await;
        state.rooms.messages_from(room, from_index)
    }

    /// Every room that has been created, in name order
    pub async fn list_rooms(&self) -> Vec<RoomInfo> {
        let state = self.state.read().await;
        state
            .rooms
            .room_names()
            .into_iter()
            .map(|room_name| RoomInfo { room_name })
            .collect()
    }

    /// Add `username` to `room`, creating the room if needed
    pub async fn join_room(&self, username: &str, room: &str) -> JoinOutcome {
        let (user_count, newly_joined) = {
            let mut state = self.state.write().await;
            state.rooms.ensure_room(room);
            state.members.join(username, room)
        };

        if newly_joined {
            info!("User {} joined room {} ({} members)", username, room, user_count);
        } else {
            debug!("User {} already in room {}", username, room);
        }

        JoinOutcome {
            user_count,
            newly_joined,
        }
    }

    /// Remove `username` from `room`; a no-op if they are not a member.
    ///
    /// The room itself stays, even when it empties.
    pub async fn leave_room(&self, username: &str, room: &str) -> LeaveOutcome {
        let (remaining_users, was_member) = {
            let mut state = self.state.write().await;
            state.members.leave(username, room)
        };

        if was_member {
            info!(
                "User {} left room {} ({} remaining)",
                username, room, remaining_users
            );
        } else {
            debug!("User {} was not in room {}", username, room);
        }

        LeaveOutcome {
            remaining_users,
            was_member,
        }
    }

    /// Create `room` if it does not exist yet
    pub async fn ensure_room(&self, room: &str) {
        let mut state = self.state.write().await;
        state.rooms.ensure_room(room);
    }

    /// Rooms `username` currently belongs to
    pub async fn rooms_of(&self, username: &str) -> Vec<String> {
        let state = self.state.read().await;
        state.members.rooms_of(username)
    }

    /// Current members of `room`
    pub async fn members_of(&self, room: &str) -> Vec<String> {
        let state = self.state.read().await;
        state.members.members_of(room)
    }

    pub async fn stats(&self) -> EngineStats {
        let state = self.state.read().await;
        EngineStats {
            rooms: state.rooms.room_count(),
            messages: state.rooms.message_count(),
            memberships: state.members.membership_count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_send_then_receive() {
        let engine = ChatEngine::default();

        assert!(engine.send_message("alice", "hi", "general").await);

        let messages = engine.receive_messages("general", 0).await;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].username, "alice");
        assert_eq!(messages[0].text, "hi");
        assert_eq!(messages[0].room, "general");
        assert!(messages[0].timestamp > 0);
    }

    #[tokio::test]
    async fn test_join_send_list() {
        let engine = ChatEngine::default();

        let joined = engine.join_room("bob", "tech").await;
        assert_eq!(joined.user_count, 1);
        assert!(joined.newly_joined);

        engine.send_message("bob", "hello", "tech").await;
        let messages = engine.receive_messages("tech", 0).await;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].username, "bob");
        assert_eq!(messages[0].text, "hello");

        let rooms = engine.list_rooms().await;
        assert!(rooms.contains(&RoomInfo {
            room_name: "tech".to_string()
        }));
    }

    #[tokio::test]
    async fn test_receive_edges() {
        let engine = ChatEngine::default();
        for i in 0..3 {
            engine.send_message("alice", &format!("m{}", i), "general").await;
        }

        assert_eq!(engine.receive_messages("general", 0).await.len(), 3);
        assert_eq!(engine.receive_messages("general", 1).await.len(), 2);
        assert!(engine.receive_messages("general", 3).await.is_empty());
        assert!(engine.receive_messages("general", 4).await.is_empty());
        assert!(engine.receive_messages("general", -5).await.is_empty());
        assert!(engine.receive_messages("missing", 0).await.is_empty());
    }

    #[tokio::test]
    async fn test_join_twice_same_count() {
        let engine = ChatEngine::default();
        engine.join_room("alice", "general").await;

        let once = engine.join_room("bob", "general").await;
        let twice = engine.join_room("bob", "general").await;

        assert_eq!(once.user_count, twice.user_count);
        assert!(!twice.newly_joined);
    }

    #[tokio::test]
    async fn test_leave_after_join() {
        let engine = ChatEngine::default();
        engine.join_room("alice", "general").await;
        let before = engine.join_room("bob", "general").await.user_count;

        let left = engine.leave_room("bob", "general").await;
        assert!(left.was_member);
        assert_eq!(left.remaining_users, before - 1);
        assert!(engine.rooms_of("bob").await.is_empty());
    }

    #[tokio::test]
    async fn test_leave_unknown_room_does_not_create_it() {
        let engine = ChatEngine::default();

        let left = engine.leave_room("alice", "ghost").await;
        assert_eq!(left.remaining_users, 0);
        assert!(!left.was_member);
        assert!(engine.list_rooms().await.is_empty());
    }

    #[tokio::test]
    async fn test_rooms_survive_empty_membership() {
        let engine = ChatEngine::default();
        engine.join_room("alice", "tech").await;
        engine.leave_room("alice", "tech").await;

        let rooms = engine.list_rooms().await;
        assert_eq!(rooms.len(), 1);
        assert_eq!(rooms[0].room_name, "tech");
        assert!(engine.members_of("tech").await.is_empty());
    }

    #[tokio::test]
    async fn test_injected_state() {
        let mut rooms = RoomStore::new();
        rooms.append("general", "seed", "welcome");
        let mut members = MembershipRegistry::new();
        members.join("seed", "general");

        let engine = ChatEngine::new(rooms, members);
        assert_eq!(engine.receive_messages("general", 0).await[0].text, "welcome");
        assert_eq!(engine.members_of("general").await, vec!["seed".to_string()]);
        assert_eq!(
            engine.stats().await,
            EngineStats {
                rooms: 1,
                messages: 1,
                memberships: 1
            }
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_sends_get_unique_indices() {
        let engine = Arc::new(ChatEngine::default());
        let per_sender = 500;

        let mut handles = Vec::new();
        for sender in ["t0", "t1"] {
            let engine = Arc::clone(&engine);
            handles.push(tokio::spawn(async move {
                for i in 0..per_sender {
                    engine
                        .send_message(sender, &format!("{}-{}", sender, i), "general")
                        .await;
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let messages = engine.receive_messages("general", 0).await;
        assert_eq!(messages.len(), 2 * per_sender);

        // Every send landed exactly once
        let distinct: HashSet<_> = messages.iter().map(|m| m.text.clone()).collect();
        assert_eq!(distinct.len(), 2 * per_sender);

        // Each sender's messages appear in the order they were sent
        for sender in ["t0", "t1"] {
            let seq: Vec<usize> = messages
                .iter()
                .filter(|m| m.username == sender)
                .map(|m| m.text.rsplit('-').next().unwrap().parse().unwrap())
                .collect();
            assert_eq!(seq, (0..per_sender).collect::<Vec<_>>());
        }

        // Reading from any index gives the matching suffix
        for cursor in [0usize, 1, 499, 999, 1000] {
            let tail = engine.receive_messages("general", cursor as i64).await;
            assert_eq!(tail.len(), 2 * per_sender - cursor);
            assert_eq!(tail.as_slice(), &messages[cursor..]);
        }
    }
}
