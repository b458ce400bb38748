//! Wire format for WebSocket event frames.
//!
//! Every frame is a JSON object naming the event and carrying its positional
//! arguments:
//!
//! ```json
//! {"event": "joinGame", "args": ["0192f0c2..."]}
//! ```
//!
//! Inbound frames are parsed into [`ClientEvent`], one variant per event,
//! with argument types checked up front. Anything that does not fit becomes
//! [`RelayError::InvalidPayload`].

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{RelayError, Result};
use crate::game::{Game, PlayerState};

/// Inbound: create a game owned by the sender.
pub const CREATE_GAME: &str = "createGame";
/// Inbound: subscribe the sender to an existing room.
pub const JOIN_GAME: &str = "joinGame";
/// Inbound: report a found word and a new score.
pub const GAME_UPDATE: &str = "gameUpdate";
/// Outbound: the connection's own id, sent once on connect.
pub const IDENTIFICATION: &str = "identification";
/// Outbound: room id of a freshly created game, sent to its creator.
pub const GAME_CREATED: &str = "gameCreated";
/// Outbound: full room snapshot, sent to every member.
pub const INFORMATION: &str = "information";

/// Maximum byte length of any single string argument.
pub const MAX_PARAM_LENGTH: usize = 8_192;

/// Raw event frame before argument decoding.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Event name.
    pub event: String,
    /// Positional arguments.
    #[serde(default)]
    pub args: Vec<Value>,
}

/// Event sent by a client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClientEvent {
    /// `createGame(edgeLetters, centerLetter, words, foundWords, score)`
    CreateGame {
        /// Outer letters of the grid.
        edge_letters: Vec<String>,
        /// Mandatory centre letter.
        center_letter: String,
        /// Valid words for the round.
        words: Vec<String>,
        /// Words the creator already found.
        found_words: Vec<String>,
        /// Creator's starting score.
        score: i64,
    },
    /// `joinGame(roomId)`
    JoinGame {
        /// Room to subscribe to.
        room_id: String,
    },
    /// `gameUpdate(roomId, word, playerState)`
    GameUpdate {
        /// Room the word was found in.
        room_id: String,
        /// The found word.
        word: String,
        /// Reporting player and their new score.
        player_state: PlayerState,
    },
}

impl ClientEvent {
    /// Parse and validate one inbound text frame.
    pub fn parse(text: &str) -> Result<Self> {
        let frame: Frame = serde_json::from_str(text)
            .map_err(|e| RelayError::invalid_payload(format!("malformed frame: {e}")))?;
        Self::from_frame(frame)
    }

    /// Decode the arguments of an already-parsed frame.
    pub fn from_frame(frame: Frame) -> Result<Self> {
        let event = match frame.event.as_str() {
            CREATE_GAME => {
                let (edge_letters, center_letter, words, found_words, score): (
                    Vec<String>,
                    String,
                    Vec<String>,
                    Vec<String>,
                    i64,
                ) = decode_args(CREATE_GAME, frame.args)?;
                Self::CreateGame {
                    edge_letters,
                    center_letter,
                    words,
                    found_words,
                    score,
                }
            }
            JOIN_GAME => {
                let (room_id,): (String,) = decode_args(JOIN_GAME, frame.args)?;
                Self::JoinGame { room_id }
            }
            GAME_UPDATE => {
                let (room_id, word, player_state): (String, String, PlayerState) =
                    decode_args(GAME_UPDATE, frame.args)?;
                Self::GameUpdate {
                    room_id,
                    word,
                    player_state,
                }
            }
            other => {
                return Err(RelayError::invalid_payload(format!("unknown event '{other}'")));
            }
        };
        event.validate()?;
        Ok(event)
    }

    /// Event name as it appears on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateGame { .. } => CREATE_GAME,
            Self::JoinGame { .. } => JOIN_GAME,
            Self::GameUpdate { .. } => GAME_UPDATE,
        }
    }

    /// Encode as a wire frame (used by clients and tests).
    pub fn to_frame(&self) -> Frame {
        let args = match self {
            Self::CreateGame {
                edge_letters,
                center_letter,
                words,
                found_words,
                score,
            } => vec![
                Value::from(edge_letters.clone()),
                Value::from(center_letter.clone()),
                Value::from(words.clone()),
                Value::from(found_words.clone()),
                Value::from(*score),
            ],
            Self::JoinGame { room_id } => vec![Value::from(room_id.clone())],
            Self::GameUpdate {
                room_id,
                word,
                player_state,
            } => vec![
                Value::from(room_id.clone()),
                Value::from(word.clone()),
                serde_json::json!({
                    "name": player_state.name,
                    "score": player_state.score,
                    "previousScore": player_state.previous_score,
                }),
            ],
        };
        Frame {
            event: self.name().to_owned(),
            args,
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            Self::CreateGame {
                edge_letters,
                center_letter,
                words,
                found_words,
                ..
            } => {
                validate_string_param(center_letter, "centerLetter")?;
                for letter in edge_letters {
                    validate_string_param(letter, "edgeLetters")?;
                }
                for word in words.iter().chain(found_words) {
                    validate_string_param(word, "words")?;
                }
                Ok(())
            }
            Self::JoinGame { room_id } => validate_room_id(room_id),
            Self::GameUpdate {
                room_id,
                word,
                player_state,
            } => {
                validate_room_id(room_id)?;
                validate_string_param(word, "word")?;
                validate_string_param(&player_state.name, "playerState.name")
            }
        }
    }
}

/// Event sent by the server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ServerEvent {
    /// `identification(connectionId)`
    Identification {
        /// The receiving connection's own id.
        connection_id: String,
    },
    /// `gameCreated(roomId)`
    GameCreated {
        /// Id of the room just created.
        room_id: String,
    },
    /// `information(roomId, game)`
    Information {
        /// Room the snapshot belongs to.
        room_id: String,
        /// Full game snapshot.
        game: Game,
    },
}

impl ServerEvent {
    /// Event name as it appears on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Identification { .. } => IDENTIFICATION,
            Self::GameCreated { .. } => GAME_CREATED,
            Self::Information { .. } => INFORMATION,
        }
    }

    /// Encode as a wire frame.
    pub fn to_frame(&self) -> serde_json::Result<Frame> {
        let args = match self {
            Self::Identification { connection_id } => vec![Value::from(connection_id.clone())],
            Self::GameCreated { room_id } => vec![Value::from(room_id.clone())],
            Self::Information { room_id, game } => {
                vec![Value::from(room_id.clone()), serde_json::to_value(game)?]
            }
        };
        Ok(Frame {
            event: self.name().to_owned(),
            args,
        })
    }

    /// Serialize to the JSON text sent over the socket.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.to_frame()?)
    }

    /// Parse an outbound frame (used by clients and tests).
    pub fn parse(text: &str) -> Result<Self> {
        let frame: Frame = serde_json::from_str(text)
            .map_err(|e| RelayError::invalid_payload(format!("malformed frame: {e}")))?;
        match frame.event.as_str() {
            IDENTIFICATION => {
                let (connection_id,): (String,) = decode_args(IDENTIFICATION, frame.args)?;
                Ok(Self::Identification { connection_id })
            }
            GAME_CREATED => {
                let (room_id,): (String,) = decode_args(GAME_CREATED, frame.args)?;
                Ok(Self::GameCreated { room_id })
            }
            INFORMATION => {
                let (room_id, game): (String, Game) = decode_args(INFORMATION, frame.args)?;
                Ok(Self::Information { room_id, game })
            }
            other => Err(RelayError::invalid_payload(format!("unknown event '{other}'"))),
        }
    }
}

fn decode_args<T: DeserializeOwned>(event: &str, args: Vec<Value>) -> Result<T> {
    serde_json::from_value(Value::Array(args))
        .map_err(|e| RelayError::invalid_payload(format!("bad arguments for '{event}': {e}")))
}

fn validate_room_id(room_id: &str) -> Result<()> {
    if room_id.is_empty() {
        return Err(RelayError::invalid_payload("room id must not be empty"));
    }
    validate_string_param(room_id, "roomId")
}

/// Validate that a string argument does not exceed [`MAX_PARAM_LENGTH`] bytes.
pub fn validate_string_param(value: &str, name: &str) -> Result<()> {
    if value.len() > MAX_PARAM_LENGTH {
        return Err(RelayError::invalid_payload(format!(
            "argument '{name}' exceeds maximum length ({} > {MAX_PARAM_LENGTH})",
            value.len()
        )));
    }
    Ok(())
}
