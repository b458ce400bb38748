//! # beehive-core
//!
//! Foundation types shared by every beehive crate:
//!
//! - **Game model**: [`Game`], [`Player`], [`PlayerState`]
//! - **Room registry**: [`RoomRegistry`], the single source of truth for room state
//! - **Wire protocol**: [`ClientEvent`] / [`ServerEvent`] JSON frames
//! - **Errors**: [`RelayError`] with stable machine-readable codes
//! - **Branded IDs**: [`ConnectionId`]
//! - **Logging**: `tracing` subscriber setup

#![deny(unsafe_code)]

pub mod errors;
pub mod game;
pub mod ids;
pub mod logging;
pub mod protocol;
pub mod registry;

pub use errors::{RelayError, Result};
pub use game::{Game, Player, PlayerState};
pub use ids::ConnectionId;
pub use protocol::{ClientEvent, ServerEvent};
pub use registry::RoomRegistry;
