//! Room creation, joining and membership bookkeeping.
//!
//! A room's id is the id of the connection that created it. Players are
//! added and removed in response to transport membership changes rather
//! than directly by `join_game`, so a connection that is already in a group
//! never shows up twice.

use std::sync::Arc;

use async_trait::async_trait;
use beehive_core::{Game, ServerEvent};
use metrics::counter;
use tracing::{debug, info};

use super::dispatcher::BroadcastDispatcher;
use crate::websocket::broadcast::BroadcastManager;
use crate::websocket::membership::MembershipObserver;

/// Creates rooms, subscribes connections and keeps player lists in sync
/// with group membership.
pub struct SessionLifecycle {
    hub: Arc<BroadcastManager>,
    dispatcher: Arc<BroadcastDispatcher>,
}

impl SessionLifecycle {
    /// Create a lifecycle manager.
    pub fn new(hub: Arc<BroadcastManager>, dispatcher: Arc<BroadcastDispatcher>) -> Self {
        Self { hub, dispatcher }
    }

    /// Start a game owned by `connection_id` and return its room id.
    ///
    /// The creator is the only player, with the given score. An existing
    /// game under the same id is overwritten. The creator receives
    /// `gameCreated`, then every room member receives the snapshot.
    pub async fn create_game(
        &self,
        connection_id: &str,
        edge_letters: Vec<String>,
        center_letter: String,
        words: Vec<String>,
        found_words: Vec<String>,
        score: i64,
    ) -> String {
        let room_id = connection_id.to_owned();
        let game = Game::new_for_player(
            connection_id,
            edge_letters,
            center_letter,
            words,
            found_words,
            score,
        );
        let _ = self.dispatcher.create_room(&room_id, game).await;
        counter!(crate::metrics::ROOMS_CREATED_TOTAL).increment(1);
        info!(room_id, "game created");

        let _ = self.hub.join(&room_id, connection_id).await;
        let _ = self
            .hub
            .send_to(
                connection_id,
                &ServerEvent::GameCreated {
                    room_id: room_id.clone(),
                },
            )
            .await;
        let _ = self.dispatcher.broadcast(&room_id).await;
        room_id
    }

    /// Subscribe `connection_id` to `room_id` and broadcast the room.
    ///
    /// The player entry itself is added by [`MembershipObserver::member_joined`].
    /// Joining a room with no game still subscribes; the broadcast is then
    /// a no-op.
    pub async fn join_game(&self, connection_id: &str, room_id: &str) {
        info!(connection_id, room_id, "player joins");
        let _ = self.hub.join(room_id, connection_id).await;
        let _ = self.dispatcher.broadcast(room_id).await;
    }
}

#[async_trait]
impl MembershipObserver for SessionLifecycle {
    async fn member_joined(&self, group_id: &str, member_id: &str) {
        match self
            .dispatcher
            .mutate(group_id, |game| game.add_player(member_id))
            .await
        {
            Ok(()) => debug!(room_id = group_id, player = member_id, "player added"),
            Err(e) => debug!(
                room_id = group_id,
                player = member_id,
                code = e.code(),
                "joined group has no game"
            ),
        }
    }

    async fn member_left(&self, group_id: &str, member_id: &str) {
        match self
            .dispatcher
            .mutate_and_broadcast(group_id, |game| game.remove_player(member_id))
            .await
        {
            Ok((removed, _)) => {
                info!(room_id = group_id, player = member_id, removed, "player left");
            }
            Err(e) => debug!(
                room_id = group_id,
                player = member_id,
                code = e.code(),
                "left group has no game"
            ),
        }
    }
}
