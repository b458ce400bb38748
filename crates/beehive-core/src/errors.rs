//! Relay error taxonomy.
//!
//! None of these are ever sent to a client. They exist so the server can log
//! a stable code and carry on.

use thiserror::Error;

/// Room id has no registered game.
pub const ROOM_NOT_FOUND: &str = "ROOM_NOT_FOUND";
/// Update referenced a player name absent from the room.
pub const PLAYER_NOT_FOUND: &str = "PLAYER_NOT_FOUND";
/// Inbound frame did not match any known event schema.
pub const INVALID_PAYLOAD: &str = "INVALID_PAYLOAD";

/// Recoverable failures in the room/session model.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RelayError {
    /// Lookup against a room id with no game.
    #[error("room '{room_id}' not found")]
    RoomNotFound {
        /// The room that was looked up.
        room_id: String,
    },

    /// Score update for a name that is not a player in the room.
    #[error("player '{name}' not found in room '{room_id}'")]
    PlayerNotFound {
        /// Room the update targeted.
        room_id: String,
        /// Name carried in the update's player state.
        name: String,
    },

    /// Malformed or schema-violating inbound frame.
    #[error("invalid payload: {message}")]
    InvalidPayload {
        /// What was wrong with it.
        message: String,
    },
}

impl RelayError {
    /// Machine-readable error code for this variant.
    pub fn code(&self) -> &'static str {
        match self {
            Self::RoomNotFound { .. } => ROOM_NOT_FOUND,
            Self::PlayerNotFound { .. } => PLAYER_NOT_FOUND,
            Self::InvalidPayload { .. } => INVALID_PAYLOAD,
        }
    }

    /// Shorthand for [`RelayError::RoomNotFound`].
    pub fn room_not_found(room_id: impl Into<String>) -> Self {
        Self::RoomNotFound {
            room_id: room_id.into(),
        }
    }

    /// Shorthand for [`RelayError::InvalidPayload`].
    pub fn invalid_payload(message: impl Into<String>) -> Self {
        Self::InvalidPayload {
            message: message.into(),
        }
    }
}

/// Result alias for relay operations.
pub type Result<T> = std::result::Result<T, RelayError>;
