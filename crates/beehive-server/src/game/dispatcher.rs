//! Room snapshot fan-out.
//!
//! Every change to a room and the snapshot that follows it run under that
//! room's async lock, so snapshots reach each member's queue in mutation
//! order and the last one a client receives is the room's current state.

use std::sync::Arc;

use beehive_core::{Game, RelayError, Result, RoomRegistry, ServerEvent};
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::debug;

use crate::websocket::broadcast::BroadcastManager;

/// Sends the full game snapshot of a room to everyone subscribed to it.
pub struct BroadcastDispatcher {
    registry: Arc<RoomRegistry>,
    hub: Arc<BroadcastManager>,
    /// One lock per registered room, held across mutate + snapshot + enqueue.
    room_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl BroadcastDispatcher {
    /// Create a dispatcher over a registry and transport.
    pub fn new(registry: Arc<RoomRegistry>, hub: Arc<BroadcastManager>) -> Self {
        Self {
            registry,
            hub,
            room_locks: DashMap::new(),
        }
    }

    fn room_lock(&self, room_id: &str) -> Arc<Mutex<()>> {
        self.room_locks
            .entry(room_id.to_owned())
            .or_default()
            .value()
            .clone()
    }

    /// Lock for an existing room; unknown rooms never get a lock entry.
    fn existing_room_lock(&self, room_id: &str) -> Result<Arc<Mutex<()>>> {
        if self.registry.contains(room_id) {
            Ok(self.room_lock(room_id))
        } else {
            debug!(room_id, "no game for room");
            Err(RelayError::room_not_found(room_id))
        }
    }

    /// Register `game` under `room_id`, ordered with other room changes.
    ///
    /// Returns `true` when a previous game was overwritten.
    pub async fn create_room(&self, room_id: &str, game: Game) -> bool {
        let lock = self.room_lock(room_id);
        let _guard = lock.lock().await;
        self.registry.create(room_id, game)
    }

    /// Apply `f` to the room without broadcasting.
    pub async fn mutate<F, R>(&self, room_id: &str, f: F) -> Result<R>
    where
        F: FnOnce(&mut Game) -> R,
    {
        let lock = self.existing_room_lock(room_id)?;
        let _guard = lock.lock().await;
        self.registry.mutate(room_id, f)
    }

    /// Apply `f` to the room, then broadcast the resulting snapshot before
    /// any other change to the room can run.
    ///
    /// Returns `f`'s result and how many members the snapshot was queued for.
    pub async fn mutate_and_broadcast<F, R>(&self, room_id: &str, f: F) -> Result<(R, usize)>
    where
        F: FnOnce(&mut Game) -> R,
    {
        let lock = self.existing_room_lock(room_id)?;
        let _guard = lock.lock().await;
        let out = self.registry.mutate(room_id, f)?;
        let delivered = self.send_snapshot(room_id).await?;
        Ok((out, delivered))
    }

    /// Send `information(room_id, game)` to every member of `room_id`.
    ///
    /// Reads a snapshot and never mutates, so calling it twice sends the
    /// same state twice. Returns how many members it was queued for. A room
    /// with no game sends nothing and returns [`RelayError::RoomNotFound`].
    pub async fn broadcast(&self, room_id: &str) -> Result<usize> {
        let lock = self.existing_room_lock(room_id)?;
        let _guard = lock.lock().await;
        self.send_snapshot(room_id).await
    }

    /// Caller holds the room lock.
    async fn send_snapshot(&self, room_id: &str) -> Result<usize> {
        let game = self.registry.get(room_id).inspect_err(|e| {
            debug!(room_id, code = e.code(), "no game to broadcast");
        })?;
        let event = ServerEvent::Information {
            room_id: room_id.to_owned(),
            game,
        };
        Ok(self.hub.broadcast_to_group(room_id, &event).await)
    }
}
