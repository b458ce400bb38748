//! # beehive-server
//!
//! Axum HTTP + `WebSocket` relay for the multiplayer word game.
//!
//! - `WebSocket` transport: connections, named broadcast groups, join/leave
//!   notifications, heartbeat
//! - Game components: session lifecycle, update aggregation, snapshot
//!   broadcasting, and the per-connection event gateway
//! - HTTP endpoints: `/health`, `/metrics`
//! - Graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod game;
pub mod health;
pub mod metrics;
pub mod server;
pub mod shutdown;
pub mod websocket;
