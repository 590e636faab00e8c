//! WebSocket connection state machine.
//!
//! Handles the read/write loop for a single WebSocket connection:
//! registers it, dispatches inbound events through the router, pumps
//! outbound frames from the fanout, and tears registry state down when the
//! socket goes — from whichever side, at whatever moment.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};

use super::events::EventRouter;
use super::messages::WsMessage;
use crate::auth::Identity;
use crate::domain::connection::DeviceMeta;
use crate::domain::{Connection, ConnectionState, OutboundFrame};
use crate::service::PresenceService;

/// Runs the read/write loop for a single authenticated WebSocket
/// connection.
///
/// - Reads client events and dispatches them through the [`EventRouter`].
/// - Forwards frames from the connection's outbound channel to the socket.
/// - Any exit path deregisters the connection; a disconnect concurrent with
///   in-flight handlers is a legal outcome everywhere downstream.
pub async fn run_connection(
    socket: WebSocket,
    service: Arc<PresenceService>,
    identity: Identity,
    device_meta: DeviceMeta,
) {
    // Token already verified before the upgrade completed.
    let mut lifecycle = ConnectionState::Handshaking
        .advance(ConnectionState::Authenticated)
        .unwrap_or(ConnectionState::Closed);

    let conn = Connection::new(identity.user_id, device_meta);
    let conn_id = conn.id;
    let user_id = conn.user_id;
    let (sender, mut outbound_rx) = tokio::sync::mpsc::unbounded_channel();
    let (mut ws_tx, mut ws_rx) = socket.split();

    if let Err(err) = service.register_connection(conn, sender).await {
        tracing::warn!(%user_id, %err, "refusing connection at registration");
        let msg = WsMessage::error(err.error_code(), &err.to_string());
        if let Ok(json) = serde_json::to_string(&msg) {
            let _ = ws_tx.send(Message::text(json)).await;
        }
        let _ = ws_tx.send(Message::Close(None)).await;
        return;
    }
    lifecycle = lifecycle
        .advance(ConnectionState::Active)
        .unwrap_or(ConnectionState::Closed);
    tracing::debug!(%conn_id, %user_id, "ws connection active");

    let router = EventRouter::new(Arc::clone(&service));

    loop {
        tokio::select! {
            // Incoming message from client
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let _ = service.registry().touch(conn_id).await;
                        router.handle(conn_id, user_id, &text).await;
                    }
                    Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                        let _ = service.registry().touch(conn_id).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        tracing::debug!(%conn_id, %err, "socket read error");
                        break;
                    }
                }
            }
            // Frame from the fanout / heartbeat
            frame = outbound_rx.recv() => {
                match frame {
                    Some(OutboundFrame::Event { event, data }) => {
                        let msg = WsMessage::event(&event, data);
                        let json = serde_json::to_string(&msg).unwrap_or_default();
                        if ws_tx.send(Message::text(json)).await.is_err() {
                            break;
                        }
                    }
                    // Close pushed by disconnect_all or heartbeat eviction,
                    // or all senders gone.
                    Some(OutboundFrame::Close) | None => break,
                }
            }
        }
    }

    lifecycle = lifecycle
        .advance(ConnectionState::Closed)
        .unwrap_or(ConnectionState::Closed);
    service.handle_disconnect(conn_id).await;
    let _ = ws_tx.send(Message::Close(None)).await;
    tracing::debug!(%conn_id, %user_id, state = ?lifecycle, "ws connection closed");
}
