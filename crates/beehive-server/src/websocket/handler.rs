//! Inbound frame dispatch: decode text as a [`ClientEvent`] and hand it to
//! the [`ConnectionGateway`].

use beehive_core::{ClientEvent, Result};
use metrics::counter;
use tracing::{debug, instrument, warn};

use crate::game::ConnectionGateway;

/// Handle one inbound text frame from `connection_id`.
///
/// Malformed frames are logged and dropped; nothing is ever sent back to the
/// client on error. The error is returned for the caller's bookkeeping.
#[instrument(skip_all, fields(connection_id, event))]
pub async fn handle_message(
    message: &str,
    connection_id: &str,
    gateway: &ConnectionGateway,
) -> Result<()> {
    let _ = tracing::Span::current().record("connection_id", connection_id);
    let event = match ClientEvent::parse(message) {
        Ok(event) => event,
        Err(e) => {
            warn!(code = e.code(), error = %e, len = message.len(), "invalid frame dropped");
            counter!(crate::metrics::GAME_EVENT_ERRORS_TOTAL, "code" => e.code()).increment(1);
            return Err(e);
        }
    };

    let _ = tracing::Span::current().record("event", event.name());
    debug!("dispatching event");

    let result = gateway.dispatch(connection_id, event).await;
    if let Err(e) = &result {
        counter!(crate::metrics::GAME_EVENT_ERRORS_TOTAL, "code" => e.code()).increment(1);
        debug!(code = e.code(), error = %e, "event handled with error");
    }
    result
}
