//! Game components wired on top of the WebSocket transport.
//!
//! [`ConnectionGateway`] routes decoded client events to the
//! [`SessionLifecycle`] and [`UpdateAggregator`]; both publish the resulting
//! room snapshot through the [`BroadcastDispatcher`].

pub mod aggregator;
pub mod dispatcher;
pub mod gateway;
pub mod lifecycle;

pub use aggregator::UpdateAggregator;
pub use dispatcher::BroadcastDispatcher;
pub use gateway::ConnectionGateway;
pub use lifecycle::SessionLifecycle;
