//! WebSocket session lifecycle: handles a single connected client from
//! upgrade through disconnect.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use beehive_core::ConnectionId;
use futures::{SinkExt, StreamExt};
use metrics::{counter, gauge, histogram};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use super::connection::{ClientConnection, DisconnectReason};
use super::handler::handle_message;
use crate::config::ServerConfig;
use crate::game::ConnectionGateway;

/// How long the writer gets to flush a Close frame once the session ends.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Run a WebSocket session for a connected client.
///
/// 1. Registers the connection and sends `identification`
/// 2. Dispatches incoming text (or UTF-8 binary) frames as game events
/// 3. Forwards queued outbound events through a writer task
/// 4. Sends periodic Ping frames and drops clients silent past the timeout
/// 5. Leaves every room on disconnect
///
/// `cancel` ends the session; the server hands out children of its
/// shutdown token.
#[instrument(skip_all, fields(client_id = %client_id))]
pub async fn run_ws_session(
    ws: WebSocket,
    client_id: ConnectionId,
    gateway: Arc<ConnectionGateway>,
    config: Arc<ServerConfig>,
    cancel: CancellationToken,
) {
    let (mut ws_tx, mut ws_rx) = ws.split();

    let (send_tx, mut send_rx) = mpsc::channel::<Arc<String>>(config.outbound_buffer.max(1));
    let connection = Arc::new(ClientConnection::new(client_id.clone(), send_tx));

    info!("client connected");
    counter!(crate::metrics::WS_CONNECTIONS_TOTAL).increment(1);
    gauge!(crate::metrics::WS_CONNECTIONS_ACTIVE).increment(1.0);

    gateway.on_connect(connection.clone()).await;

    // Writer: drains the outbound queue and owns the heartbeat.
    let outbound_conn = connection.clone();
    let outbound_cancel = cancel.clone();
    let ping_every = config.heartbeat_interval();
    let pong_timeout = config.heartbeat_timeout();
    let mut outbound = tokio::spawn(async move {
        let mut ping_interval = tokio::time::interval(ping_every);
        // Skip the immediate first tick
        let _ = ping_interval.tick().await;

        let reason = loop {
            tokio::select! {
                msg = send_rx.recv() => {
                    let Some(text) = msg else { break None };
                    if let Err(e) = ws_tx.send(Message::Text(text.to_string().into())).await {
                        break Some(DisconnectReason::TransportError(e.to_string()));
                    }
                }
                _ = ping_interval.tick() => {
                    if !outbound_conn.check_alive()
                        && outbound_conn.last_pong_elapsed() > pong_timeout
                    {
                        warn!(timeout = ?pong_timeout, "client unresponsive, disconnecting");
                        let _ = ws_tx.send(Message::Close(None)).await;
                        break Some(DisconnectReason::HeartbeatTimeout);
                    }
                    if let Err(e) = ws_tx.send(Message::Ping(vec![].into())).await {
                        break Some(DisconnectReason::TransportError(e.to_string()));
                    }
                }
                () = outbound_cancel.cancelled() => {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    break None;
                }
            }
        };
        outbound_cancel.cancel();
        reason
    });

    let inbound = loop {
        tokio::select! {
            frame = ws_rx.next() => {
                let msg = match frame {
                    Some(Ok(msg)) => msg,
                    Some(Err(e)) => break DisconnectReason::TransportError(e.to_string()),
                    None => break DisconnectReason::ClientClosed,
                };
                connection.mark_alive();

                let text = match msg {
                    Message::Text(t) => t.to_string(),
                    Message::Binary(data) => match String::from_utf8(data.to_vec()) {
                        Ok(s) => s,
                        Err(_) => {
                            info!(len = data.len(), "received non-UTF8 binary frame");
                            continue;
                        }
                    },
                    Message::Close(_) => {
                        info!("client sent close frame");
                        break DisconnectReason::ClientClosed;
                    }
                    Message::Ping(_) | Message::Pong(_) => continue,
                };
                let _ = handle_message(&text, &client_id, &gateway).await;
            }
            () = cancel.cancelled() => break DisconnectReason::ServerShutdown,
        }
    };

    cancel.cancel();
    let outbound_reason = match tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut outbound).await {
        Ok(Ok(reason)) => reason,
        Ok(Err(e)) => {
            warn!(error = %e, "writer task failed");
            None
        }
        Err(_) => {
            outbound.abort();
            None
        }
    };
    let reason = resolve_reason(inbound, outbound_reason);

    gateway.on_disconnect(&client_id, &reason).await;
    counter!(crate::metrics::WS_DISCONNECTIONS_TOTAL, "reason" => reason.label()).increment(1);
    gauge!(crate::metrics::WS_CONNECTIONS_ACTIVE).decrement(1.0);
    histogram!(crate::metrics::WS_CONNECTION_DURATION_SECONDS)
        .record(connection.age().as_secs_f64());
}

/// The writer's reason wins when the reader only saw the session token fire.
fn resolve_reason(inbound: DisconnectReason, outbound: Option<DisconnectReason>) -> DisconnectReason {
    match (inbound, outbound) {
        (DisconnectReason::ServerShutdown, Some(reason)) => reason,
        (reason, _) => reason,
    }
}
