//! WebSocket transport: connections, broadcast groups, frame dispatch, and
//! the per-client session loop.

pub mod broadcast;
pub mod connection;
pub mod handler;
pub mod membership;
pub mod session;
