//! The room directory: partitioned index of rooms by lifecycle stage.
//!
//! Three indexes under one mutex:
//!
//! - `by_id` — every room for its whole lifetime
//! - `waiting` — ids of rooms with one player, in creation order, so
//!   matchmaking pairs players first-come-first-served
//! - `playing` — ids of rooms with a game running
//!
//! A room sits in exactly one of `waiting`/`playing` until it finishes,
//! at which point [`remove`](RoomDirectory::remove) purges it everywhere.
//! The lock is held only across index mutation; the only nested
//! acquisition is a room's own lock (directory → room order).

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use uuid::Uuid;

use crate::Room;

#[derive(Default)]
struct DirInner {
    by_id: HashMap<Uuid, Arc<Room>>,
    waiting: VecDeque<Uuid>,
    playing: HashSet<Uuid>,
}

/// Index of all live rooms.
#[derive(Default)]
pub struct RoomDirectory {
    inner: Mutex<DirInner>,
}

impl RoomDirectory {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, DirInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a freshly created room in the waiting index.
    pub fn insert_waiting(&self, room: Arc<Room>) {
        let mut inner = self.lock();
        let id = room.id();
        inner.by_id.insert(id, room);
        inner.waiting.push_back(id);
    }

    /// Pops the oldest waiting room that doesn't already seat `username`.
    ///
    /// The popped room leaves the waiting index atomically, so a racing
    /// bot-join timer (which promotes via [`remove_waiting`]) can't also
    /// claim it. The self-exclusion stops a player from being matched
    /// into their own abandoned room.
    pub fn take_waiting_excluding(
        &self,
        username: &str,
    ) -> Option<Arc<Room>> {
        let mut inner = self.lock();
        let mut skipped = Vec::new();
        let mut found = None;
        while let Some(id) = inner.waiting.pop_front() {
            match inner.by_id.get(&id) {
                None => continue, // stale id from a deleted room
                Some(room) if room.has_player(username) => skipped.push(id),
                Some(room) => {
                    found = Some(Arc::clone(room));
                    break;
                }
            }
        }
        for id in skipped.into_iter().rev() {
            inner.waiting.push_front(id);
        }
        found
    }

    /// Claims a specific room out of the waiting index.
    ///
    /// Returns `false` when the room isn't waiting anymore — the
    /// bot-join timer uses this as its am-I-still-relevant check.
    pub fn remove_waiting(&self, id: Uuid) -> bool {
        let mut inner = self.lock();
        let before = inner.waiting.len();
        inner.waiting.retain(|rid| *rid != id);
        inner.waiting.len() != before
    }

    /// Marks a room as playing. The room must already be in `by_id`.
    pub fn insert_playing(&self, id: Uuid) {
        self.lock().playing.insert(id);
    }

    /// Looks up a room by id.
    pub fn get(&self, id: Uuid) -> Option<Arc<Room>> {
        self.lock().by_id.get(&id).cloned()
    }

    /// Purges a room from every index, returning it for final teardown.
    pub fn remove(&self, id: Uuid) -> Option<Arc<Room>> {
        let mut inner = self.lock();
        inner.waiting.retain(|rid| *rid != id);
        inner.playing.remove(&id);
        inner.by_id.remove(&id)
    }

    /// `(waiting, playing, total)` — for logs and assertions.
    pub fn counts(&self) -> (usize, usize, usize) {
        let inner = self.lock();
        (inner.waiting.len(), inner.playing.len(), inner.by_id.len())
    }
}

// =========================================================================
// Tests
// =========================================================================
