//! The client registry: twin identity maps plus the playing-room index.
//!
//! # Concurrency note
//!
//! All three maps live inside one `Inner` struct behind a single
//! `std::sync::Mutex`. The twin maps (`clients` and `usernames`) must
//! mutate together or they drift apart under concurrent admits and
//! drops — never derive one from the other. The lock is held only across
//! index mutation; nothing awaits under it, which is also what lets the
//! synchronous upgrade-admission callback call into the registry.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use fourstack_transport::{ClientSender, ConnectionId};
use uuid::Uuid;

use crate::RegistryError;

/// What the registry stores per live username.
#[derive(Debug, Clone)]
pub struct ClientHandle {
    /// The connection that currently owns the username.
    pub id: ConnectionId,
    /// Delivery channel for that connection.
    pub sender: ClientSender,
}

#[derive(Default)]
struct Inner {
    /// username → live connection.
    clients: HashMap<String, ClientHandle>,
    /// connection → username (kept in sync with `clients`).
    usernames: HashMap<ConnectionId, String>,
    /// username → the room they are currently playing in. Survives a
    /// dropped connection until the room resolves the disconnect.
    playing: HashMap<String, Uuid>,
}

/// Tracks every live connection and each player's current room.
#[derive(Default)]
pub struct ClientRegistry {
    inner: Mutex<Inner>,
}

impl ClientRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A poisoned lock means a panicking task died mid-mutation; the
        // maps are still structurally sound, so keep serving.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Checks whether `username` may open a new connection.
    ///
    /// A username with no live connection is always free. A busy
    /// username is admitted only when `reconnectable` says its bound
    /// room is holding a seat open for it (the disconnected-set check —
    /// the caller runs it under the room lock, which nests correctly
    /// inside the registry lock).
    pub fn check_available<F>(
        &self,
        username: &str,
        reconnectable: F,
    ) -> Result<(), RegistryError>
    where
        F: FnOnce(Uuid) -> bool,
    {
        let inner = self.lock();
        if !inner.clients.contains_key(username) {
            return Ok(());
        }
        match inner.playing.get(username) {
            Some(&room_id) if reconnectable(room_id) => Ok(()),
            _ => Err(RegistryError::UsernameInUse(username.to_string())),
        }
    }

    /// Records `handle` as the live connection for `username`.
    ///
    /// An existing mapping is replaced — that's the reconnection path,
    /// where a fresh transport supersedes the dead one. The stale
    /// inverse entry is removed so the old reader's teardown can't
    /// touch the new session.
    pub fn register(&self, username: &str, handle: ClientHandle) {
        let mut inner = self.lock();
        let conn_id = handle.id;
        if let Some(old) = inner.clients.insert(username.to_string(), handle)
        {
            inner.usernames.remove(&old.id);
            tracing::debug!(%username, old = %old.id, new = %conn_id, "replaced live connection");
        }
        inner.usernames.insert(conn_id, username.to_string());
        tracing::debug!(%username, %conn_id, "client registered");
    }

    /// Returns `true` if a live connection owns `username`.
    pub fn is_live(&self, username: &str) -> bool {
        self.lock().clients.contains_key(username)
    }

    /// The delivery channel for `username`, if live.
    pub fn sender(&self, username: &str) -> Option<ClientSender> {
        self.lock().clients.get(username).map(|h| h.sender.clone())
    }

    /// Removes the identity mapping for a connection that went away.
    ///
    /// Returns the username that owned the connection, or `None` when
    /// the connection was unknown *or already superseded* by a
    /// reconnect — in that case the caller must not run the disconnect
    /// path, because the username is alive on another transport.
    ///
    /// The playing-room binding is deliberately preserved; the room
    /// state machine decides when it ends.
    pub fn drop_connection(&self, id: ConnectionId) -> Option<String> {
        let mut inner = self.lock();
        let username = inner.usernames.get(&id)?.clone();
        // Only the current owner removes the forward mapping.
        let current = inner
            .clients
            .get(&username)
            .is_some_and(|h| h.id == id);
        if !current {
            inner.usernames.remove(&id);
            return None;
        }
        inner.clients.remove(&username);
        inner.usernames.remove(&id);
        tracing::debug!(%username, %id, "client dropped");
        Some(username)
    }

    /// Binds `username` to the room they are playing in.
    pub fn bind_room(&self, username: &str, room_id: Uuid) {
        self.lock().playing.insert(username.to_string(), room_id);
    }

    /// Clears the playing-room binding, but only if it still points at
    /// `room_id`.
    ///
    /// The guard matters for delayed cleanup: by the time a finished
    /// room's linger expires, the player may already be bound to a new
    /// game.
    pub fn unbind_room(&self, username: &str, room_id: Uuid) {
        let mut inner = self.lock();
        if inner.playing.get(username) == Some(&room_id) {
            inner.playing.remove(username);
        }
    }

    /// The room `username` is currently playing in, if any.
    pub fn room_of(&self, username: &str) -> Option<Uuid> {
        self.lock().playing.get(username).copied()
    }

    /// Number of live connections.
    pub fn connected(&self) -> usize {
        self.lock().clients.len()
    }
}

// =========================================================================
// Tests
// =========================================================================
