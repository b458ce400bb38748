//! Room registry: room id to [`Game`].
//!
//! Each room is its own `DashMap` entry, so [`RoomRegistry::mutate`] gives
//! room-scoped exclusivity: two mutations on the same room never interleave,
//! while mutations on different rooms proceed in parallel. Closures passed to
//! `mutate` must not call back into the registry.

use dashmap::DashMap;
use tracing::{debug, warn};

use crate::errors::{RelayError, Result};
use crate::game::Game;

/// In-memory store of every live game, keyed by room id.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: DashMap<String, Game>,
}

impl RoomRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
        }
    }

    /// Register `game` under `room_id`, replacing any existing game.
    ///
    /// Returns `true` when a previous game was overwritten.
    pub fn create(&self, room_id: impl Into<String>, game: Game) -> bool {
        let room_id = room_id.into();
        let replaced = self.rooms.insert(room_id.clone(), game).is_some();
        if replaced {
            warn!(room_id, "game recreated, previous state overwritten");
        } else {
            debug!(room_id, "game registered");
        }
        replaced
    }

    /// Snapshot of the game in `room_id`.
    pub fn get(&self, room_id: &str) -> Result<Game> {
        self.rooms
            .get(room_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| RelayError::room_not_found(room_id))
    }

    /// Apply `f` to the game in `room_id` while holding that room exclusively.
    pub fn mutate<F, R>(&self, room_id: &str, f: F) -> Result<R>
    where
        F: FnOnce(&mut Game) -> R,
    {
        let mut entry = self
            .rooms
            .get_mut(room_id)
            .ok_or_else(|| RelayError::room_not_found(room_id))?;
        Ok(f(entry.value_mut()))
    }

    /// Whether a game exists for `room_id`.
    pub fn contains(&self, room_id: &str) -> bool {
        self.rooms.contains_key(room_id)
    }

    /// Number of registered rooms, empty ones included.
    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    /// Whether no rooms are registered.
    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}
