//! /ws — the realtime channel.
//!
//! Each connection runs two halves: a reader that parses client frames and
//! hands them to the session controller in arrival order, and a writer that
//! drains the connection's bounded outbound queue into the socket. Whichever
//! half finishes first ends the connection.

use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

use hubbub_core::{ClientEvent, ConnectionId};
use hubbub_services::{Frame, RegistryError, SessionController};

use super::ApiState;

pub async fn handle_ws(
    ws: WebSocketUpgrade,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    State(state): State<ApiState>,
) -> Response {
    // Fast path only; `connect` enforces the cap exactly after the upgrade.
    if state.controller.at_capacity() {
        let cap = state.relay.max_connections;
        tracing::warn!(addr = %remote, cap, "connection refused: at capacity");
        return (StatusCode::SERVICE_UNAVAILABLE, "relay at capacity").into_response();
    }

    let limit = state.relay.max_message_bytes;
    ws.max_message_size(limit)
        .max_frame_size(limit)
        .on_upgrade(move |socket| run_connection(socket, remote.ip().to_string(), state))
}

async fn run_connection(socket: WebSocket, addr: String, state: ApiState) {
    let id = ConnectionId(state.next_id.fetch_add(1, Ordering::Relaxed));
    let (tx, mut rx) = mpsc::channel::<Frame>(state.relay.outbound_queue.max(1));

    match state.controller.connect(id, &addr, tx) {
        Ok(()) => {}
        Err(e @ RegistryError::AtCapacity { .. }) => {
            tracing::warn!(conn = %id, addr = %addr, error = %e, "connection refused");
            return;
        }
        Err(e) => {
            tracing::error!(conn = %id, addr = %addr, error = %e, "failed to register connection");
            return;
        }
    }

    let (mut sink, mut stream) = socket.split();

    let mut writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if let Err(e) = sink.send(Message::Text(frame.as_ref().into())).await {
                tracing::debug!(conn = %id, error = %e, "send failed");
                return;
            }
        }
        // Queue closed: the registry let go of this connection.
        let _ = sink.close().await;
    });

    let _guard = ConnectionGuard::new(state.controller.clone(), id, writer.abort_handle());

    let controller = state.controller.clone();
    let reader = async move {
        while let Some(msg) = stream.next().await {
            match msg {
                Ok(Message::Text(text)) => match ClientEvent::parse(text.as_str()) {
                    Ok(event) => controller.handle_event(id, event),
                    Err(e) => {
                        tracing::debug!(conn = %id, error = %e, "ignoring malformed frame");
                    }
                },
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(conn = %id, error = %e, "receive failed");
                    break;
                }
            }
        }
    };

    tokio::select! {
        _ = reader => {}
        _ = &mut writer => {}
    }
}

/// Unregisters a connection and stops its writer when dropped, so cleanup
/// also runs if a handler panics or the connection task is cancelled.
struct ConnectionGuard {
    controller: Arc<SessionController>,
    id: ConnectionId,
    writer: AbortHandle,
}

impl ConnectionGuard {
    fn new(controller: Arc<SessionController>, id: ConnectionId, writer: AbortHandle) -> Self {
        Self {
            controller,
            id,
            writer,
        }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.writer.abort();
        self.controller.disconnect(self.id);
    }
}
