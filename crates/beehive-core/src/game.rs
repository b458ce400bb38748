//! Game state for a single room.
//!
//! Only `players` and `found_words` change after creation. The round's
//! letters and word list are private and exposed read-only.

use serde::{Deserialize, Serialize};

use crate::errors::{RelayError, Result};

/// A named participant inside a game.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    /// Connection id of the participant.
    pub name: String,
    /// Absolute score as last reported by a client.
    pub score: i64,
}

impl Player {
    /// Create a player.
    pub fn new(name: impl Into<String>, score: i64) -> Self {
        Self {
            name: name.into(),
            score,
        }
    }
}

/// Player score report carried by a `gameUpdate` event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerState {
    /// Name of the player whose score changes.
    pub name: String,
    /// New absolute score.
    pub score: i64,
    /// Score before this update. Carried for clients; not used when merging.
    #[serde(default)]
    pub previous_score: i64,
}

/// Full state of one round.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Game {
    players: Vec<Player>,
    found_words: Vec<String>,
    words: Vec<String>,
    edge_letters: Vec<String>,
    center_letter: String,
}

impl Game {
    /// New game whose only player is its creator.
    pub fn new_for_player(
        player_id: impl Into<String>,
        edge_letters: Vec<String>,
        center_letter: String,
        words: Vec<String>,
        found_words: Vec<String>,
        score: i64,
    ) -> Self {
        Self {
            players: vec![Player::new(player_id, score)],
            found_words,
            words,
            edge_letters,
            center_letter,
        }
    }

    /// Players in join order.
    pub fn players(&self) -> &[Player] {
        &self.players
    }

    /// Words found so far, in submission order.
    pub fn found_words(&self) -> &[String] {
        &self.found_words
    }

    /// Valid words for the round.
    pub fn words(&self) -> &[String] {
        &self.words
    }

    /// Outer letters of the grid.
    pub fn edge_letters(&self) -> &[String] {
        &self.edge_letters
    }

    /// Mandatory centre letter.
    pub fn center_letter(&self) -> &str {
        &self.center_letter
    }

    /// Look up a player by name.
    pub fn player(&self, name: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.name == name)
    }

    /// Append a player with a zero score.
    pub fn add_player(&mut self, name: impl Into<String>) {
        self.players.push(Player::new(name, 0));
    }

    /// Drop every player with this name. Returns how many were removed.
    pub fn remove_player(&mut self, name: &str) -> usize {
        let before = self.players.len();
        self.players.retain(|p| p.name != name);
        before - self.players.len()
    }

    /// Append a found word. No deduplication, no validation against `words`.
    pub fn record_word(&mut self, word: impl Into<String>) {
        self.found_words.push(word.into());
    }

    /// Record `word` and overwrite the reporting player's score.
    ///
    /// The word is kept even when the player is missing; in that case
    /// [`RelayError::PlayerNotFound`] is returned and no score changes.
    pub fn apply_update(
        &mut self,
        room_id: &str,
        word: impl Into<String>,
        state: &PlayerState,
    ) -> Result<()> {
        self.record_word(word);
        let Some(player) = self.players.iter_mut().find(|p| p.name == state.name) else {
            return Err(RelayError::PlayerNotFound {
                room_id: room_id.to_owned(),
                name: state.name.clone(),
            });
        };
        player.score = state.score;
        Ok(())
    }
}
