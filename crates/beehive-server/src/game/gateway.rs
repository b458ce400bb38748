//! Per-connection entry point for game events.

use std::sync::Arc;

use beehive_core::{ClientEvent, Result, ServerEvent};
use metrics::counter;
use tracing::{debug, info};

use super::aggregator::UpdateAggregator;
use super::lifecycle::SessionLifecycle;
use crate::websocket::broadcast::BroadcastManager;
use crate::websocket::connection::{ClientConnection, DisconnectReason};

/// Routes connection events and decoded client events to the game
/// components.
pub struct ConnectionGateway {
    hub: Arc<BroadcastManager>,
    lifecycle: Arc<SessionLifecycle>,
    aggregator: Arc<UpdateAggregator>,
}

impl ConnectionGateway {
    /// Create a gateway.
    pub fn new(
        hub: Arc<BroadcastManager>,
        lifecycle: Arc<SessionLifecycle>,
        aggregator: Arc<UpdateAggregator>,
    ) -> Self {
        Self {
            hub,
            lifecycle,
            aggregator,
        }
    }

    /// Register a new connection and tell it its id.
    pub async fn on_connect(&self, connection: Arc<ClientConnection>) {
        let event = ServerEvent::Identification {
            connection_id: connection.id.to_string(),
        };
        self.hub.add(connection.clone()).await;
        if !connection.send_event(&event) {
            debug!(connection_id = %connection.id, "identification not queued");
        }
    }

    /// Handle one decoded client event.
    pub async fn dispatch(&self, connection_id: &str, event: ClientEvent) -> Result<()> {
        counter!(crate::metrics::GAME_EVENTS_TOTAL, "event" => event.name()).increment(1);
        match event {
            ClientEvent::CreateGame {
                edge_letters,
                center_letter,
                words,
                found_words,
                score,
            } => {
                let _ = self
                    .lifecycle
                    .create_game(
                        connection_id,
                        edge_letters,
                        center_letter,
                        words,
                        found_words,
                        score,
                    )
                    .await;
                Ok(())
            }
            ClientEvent::JoinGame { room_id } => {
                self.lifecycle.join_game(connection_id, &room_id).await;
                Ok(())
            }
            ClientEvent::GameUpdate {
                room_id,
                word,
                player_state,
            } => {
                self.aggregator
                    .apply_update(&room_id, &word, &player_state)
                    .await
            }
        }
    }

    /// Drop a connection, leaving every room it was in.
    pub async fn on_disconnect(&self, connection_id: &str, reason: &DisconnectReason) {
        info!(connection_id, %reason, "client disconnected");
        let rooms = self.hub.remove(connection_id).await;
        debug!(connection_id, rooms = ?rooms, "left rooms");
    }
}
