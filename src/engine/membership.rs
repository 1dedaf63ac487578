//! User <-> room membership
//!
//! The relation is stored twice, once per direction, so both "which rooms is
//! this user in" and "who is in this room" are single lookups. Both views are
//! updated together; a pair present in one view and missing from the other is
//! a bug and panics.

use std::collections::{HashMap, HashSet};

/// Bidirectional membership registry
#[derive(Debug, Default)]
pub struct MembershipRegistry {
    /// User to rooms mapping
    user_rooms: HashMap<String, HashSet<String>>,
    /// Room to users mapping
    room_users: HashMap<String, HashSet<String>>,
}

impl MembershipRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `user` to `room`.
    ///
    /// Returns `(member_count, newly_joined)`. Joining a room twice is a
    /// no-op and reports `newly_joined == false`.
    pub fn join(&mut self, user: &str, room: &str) -> (usize, bool) {
        let added_to_room = self
            .room_users
            .entry(room.to_string())
            .or_default()
            .insert(user.to_string());
        let added_to_user = self
            .user_rooms
            .entry(user.to_string())
            .or_default()
            .insert(room.to_string());

        assert_eq!(
            added_to_room, added_to_user,
            "membership views diverged for ({user}, {room})"
        );

        (self.member_count(room), added_to_room)
    }

    /// Remove `user` from `room`.
    ///
    /// Returns `(remaining_members, was_member)`. Leaving a room the user is
    /// not in changes nothing.
    pub fn leave(&mut self, user: &str, room: &str) -> (usize, bool) {
        let removed_from_room = Self::unlink(&mut self.room_users, room, user);
        let removed_from_user = Self::unlink(&mut self.user_rooms, user, room);

        assert_eq!(
            removed_from_room, removed_from_user,
            "membership views diverged for ({user}, {room})"
        );

        (self.member_count(room), removed_from_room)
    }

    /// Number of members currently in `room`
    pub fn member_count(&self, room: &str) -> usize {
        self.room_users.get(room).map(HashSet::len).unwrap_or(0)
    }

    pub fn is_member(&self, user: &str, room: &str) -> bool {
        self.room_users
            .get(room)
            .map(|users| users.contains(user))
            .unwrap_or(false)
    }

    /// Rooms `user` belongs to, sorted by name
    pub fn rooms_of(&self, user: &str) -> Vec<String> {
        Self::sorted(self.user_rooms.get(user))
    }

    /// Members of `room`, sorted by name
    pub fn members_of(&self, room: &str) -> Vec<String> {
        Self::sorted(self.room_users.get(room))
    }

    /// Total number of (user, room) pairs
    pub fn membership_count(&self) -> usize {
        self.room_users.values().map(HashSet::len).sum()
    }

    /// Remove `value` from the set stored under `key`, dropping emptied sets
    fn unlink(map: &mut HashMap<String, HashSet<String>>, key: &str, value: &str) -> bool {
        let Some(set) = map.get_mut(key) else {
            return false;
        };
        let removed = set.remove(value);
        if set.is_empty() {
            map.remove(key);
        }
        removed
    }

    fn sorted(set: Option<&HashSet<String>>) -> Vec<String> {
        let mut names: Vec<String> = set
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }
}
