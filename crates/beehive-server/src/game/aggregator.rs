//! Word and score updates.

use std::sync::Arc;

use beehive_core::{PlayerState, RelayError, Result, RoomRegistry};
use tracing::{debug, warn};

use super::dispatcher::BroadcastDispatcher;

/// Folds `gameUpdate` events into room state.
pub struct UpdateAggregator {
    registry: Arc<RoomRegistry>,
    dispatcher: Arc<BroadcastDispatcher>,
}

impl UpdateAggregator {
    /// Create an aggregator.
    pub fn new(registry: Arc<RoomRegistry>, dispatcher: Arc<BroadcastDispatcher>) -> Self {
        Self {
            registry,
            dispatcher,
        }
    }

    /// Record `word` in `room_id` and set the reporting player's score.
    ///
    /// Both changes happen in one room-scoped mutation, and the snapshot is
    /// queued for the room's members before any other change to the room
    /// runs. The room is broadcast even when the player is unknown (the word is
    /// still recorded, the score change is dropped and
    /// [`RelayError::PlayerNotFound`] is returned). An unknown room changes
    /// and broadcasts nothing.
    pub async fn apply_update(
        &self,
        room_id: &str,
        word: &str,
        player_state: &PlayerState,
    ) -> Result<()> {
        let (outcome, _) = self
            .dispatcher
            .mutate_and_broadcast(room_id, |game| game.apply_update(room_id, word, player_state))
            .await
            .inspect_err(|e| {
                warn!(room_id, word, code = e.code(), "update for unknown room dropped");
            })?;

        if let Err(RelayError::PlayerNotFound { name, .. }) = &outcome {
            warn!(room_id, word, player = %name, "player not in room, score unchanged");
            if let Ok(game) = self.registry.get(room_id) {
                debug!(room_id, ?game, "room state after unmatched update");
            }
        } else {
            debug!(room_id, word, player = %player_state.name, score = player_state.score, "update applied");
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use beehive_core::{Player, ServerEvent};

    use crate::game::test_support::{Harness, drain};

    fn state(name: &str, score: i64) -> PlayerState {
        PlayerState {
            name: name.into(),
            score,
            previous_score: 0,
        }
    }

    #[tokio::test]
    async fn records_word_and_score() {
        let h = Harness::new();
        let mut rx1 = h.connect("C1").await;
        let mut rx2 = h.connect("C2").await;
        let _ = h.create("C1").await;
        h.lifecycle.join_game("C2", "C1").await;
        let _ = (drain(&mut rx1), drain(&mut rx2));

        h.aggregator
            .apply_update("C1", "dab", &state("C2", 5))
            .await
            .unwrap();

        let game = h.registry.get("C1").unwrap();
        assert_eq!(game.found_words(), &["dab"]);
        assert_eq!(game.players(), &[Player::new("C1", 0), Player::new("C2", 5)]);
        for rx in [&mut rx1, &mut rx2] {
            let events = drain(rx);
            assert_eq!(events.len(), 1);
            assert_matches!(&events[0], ServerEvent::Information { game: g, .. } => {
                assert_eq!(g, &game);
            });
        }
    }

    #[tokio::test]
    async fn unknown_player_keeps_word_and_broadcasts() {
        let h = Harness::new();
        let mut rx1 = h.connect("C1").await;
        let _ = h.create("C1").await;
        let _ = drain(&mut rx1);

        let result = h.aggregator.apply_update("C1", "bad", &state("C7", 99)).await;
        assert_matches!(result, Err(RelayError::PlayerNotFound { name, .. }) if name == "C7");

        let game = h.registry.get("C1").unwrap();
        assert_eq!(game.found_words(), &["bad"]);
        assert_eq!(game.players(), &[Player::new("C1", 0)]);
        assert_eq!(drain(&mut rx1).len(), 1);
    }

    #[tokio::test]
    async fn unknown_room_does_nothing() {
        let h = Harness::new();
        let mut rx1 = h.connect("C1").await;

        let result = h.aggregator.apply_update("C1", "dab", &state("C1", 1)).await;
        assert_matches!(result, Err(RelayError::RoomNotFound { .. }));
        assert!(h.registry.is_empty());
        assert!(drain(&mut rx1).is_empty());
    }

    #[tokio::test]
    async fn duplicate_words_are_kept() {
        let h = Harness::new();
        let _rx1 = h.connect("C1").await;
        let _ = h.create("C1").await;
        for score in 1..=3 {
            h.aggregator
                .apply_update("C1", "dab", &state("C1", score))
                .await
                .unwrap();
        }
        let game = h.registry.get("C1").unwrap();
        assert_eq!(game.found_words(), &["dab", "dab", "dab"]);
        assert_eq!(game.player("C1").map(|p| p.score), Some(3));
    }

    #[tokio::test]
    async fn concurrent_updates_all_land() {
        let h = Harness::new();
        let _rx1 = h.connect("C1").await;
        let _ = h.create("C1").await;

        let mut tasks = Vec::new();
        for i in 0..20 {
            let aggregator = h.aggregator.clone();
            tasks.push(tokio::spawn(async move {
                let _ = aggregator
                    .apply_update("C1", &format!("w{i}"), &state("C1", i))
                    .await;
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(h.registry.get("C1").unwrap().found_words().len(), 20);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn last_snapshot_matches_room_under_contention() {
        for _ in 0..50 {
            let h = Harness::new();
            let mut rx1 = h.connect("C1").await;
            let _ = h.create("C1").await;

            let mut tasks = Vec::new();
            for i in 0..16 {
                let aggregator = h.aggregator.clone();
                tasks.push(tokio::spawn(async move {
                    let _ = aggregator
                        .apply_update("C1", &format!("w{i}"), &state("C1", i))
                        .await;
                }));
            }
            for task in tasks {
                task.await.unwrap();
            }

            let events = drain(&mut rx1);
            assert_eq!(events.len(), 2 + 16);
            let current = h.registry.get("C1").unwrap();
            assert_eq!(current.found_words().len(), 16);
            assert_matches!(events.last(), Some(ServerEvent::Information { game, .. }) => {
                assert_eq!(game, &current);
            });
        }
    }
}
