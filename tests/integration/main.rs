//! hubbub integration test harness.
//!
//! Every test boots its own relay on an ephemeral loopback port and
//! talks to it over real WebSocket and HTTP connections:
//!
//!   cargo test --test integration
//!
//! Servers are dropped with the test's runtime, so tests never share state.

mod relay;
mod status;

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use hubbub_api::ApiState;
use hubbub_core::config::RelayConfig;
use hubbub_core::{ClientEvent, ServerEvent};

// ── Harness ───────────────────────────────────────────────────────────────────

pub const TIMEOUT: Duration = Duration::from_secs(5);

pub type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Bind 127.0.0.1:0 and serve a fresh relay on it.
pub async fn boot(relay: RelayConfig) -> Result<SocketAddr> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let state = ApiState::from_config(relay);
    tokio::spawn(hubbub_api::serve_on(listener, state));
    Ok(addr)
}

pub async fn boot_default() -> Result<SocketAddr> {
    boot(RelayConfig::default()).await
}

pub async fn connect(addr: SocketAddr) -> Result<WsStream> {
    let (ws, _) = connect_async(format!("ws://{addr}/ws"))
        .await
        .context("websocket handshake failed")?;
    Ok(ws)
}

/// Connect and wait until the relay reports `count` members.
pub async fn join(addr: SocketAddr, count: usize) -> Result<WsStream> {
    let mut ws = connect(addr).await?;
    wait_for_count(&mut ws, count).await?;
    Ok(ws)
}

pub async fn send(ws: &mut WsStream, event: &ClientEvent) -> Result<()> {
    ws.send(Message::text(event.to_frame()?)).await?;
    Ok(())
}

pub async fn send_raw(ws: &mut WsStream, frame: &str) -> Result<()> {
    ws.send(Message::text(frame)).await?;
    Ok(())
}

/// Next server event, skipping non-text frames.
pub async fn next_event(ws: &mut WsStream) -> Result<ServerEvent> {
    loop {
        let msg = timeout(TIMEOUT, ws.next())
            .await
            .context("timeout waiting for event")?
            .context("stream closed")??;
        if let Message::Text(text) = msg {
            return Ok(ServerEvent::parse(text.as_str())?);
        }
    }
}

/// Skip events until an `update_users` with the given count arrives.
pub async fn wait_for_count(ws: &mut WsStream, count: usize) -> Result<()> {
    loop {
        match next_event(ws).await? {
            ServerEvent::UpdateUsers(n) if n == count => return Ok(()),
            ServerEvent::UpdateUsers(_) => continue,
            other => bail!("expected update_users({count}), got {other:?}"),
        }
    }
}

/// Next chat message, skipping membership updates.
pub async fn next_message(ws: &mut WsStream) -> Result<hubbub_core::MessagePayload> {
    loop {
        if let ServerEvent::Message(payload) = next_event(ws).await? {
            return Ok(payload);
        }
    }
}

/// Assert nothing but membership updates arrive within `wait`.
pub async fn assert_no_message(ws: &mut WsStream, wait: Duration) -> Result<()> {
    let deadline = tokio::time::Instant::now() + wait;
    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            return Ok(());
        }
        match timeout(remaining, ws.next()).await {
            Err(_) => return Ok(()),
            Ok(None) => bail!("stream closed"),
            Ok(Some(msg)) => {
                if let Message::Text(text) = msg? {
                    if let ServerEvent::Message(p) = ServerEvent::parse(text.as_str())? {
                        bail!("unexpected message: {p:?}");
                    }
                }
            }
        }
    }
}

pub async fn api_get(addr: SocketAddr, path: &str) -> Result<serde_json::Value> {
    let url = format!("http://{addr}/api{path}");
    let value = reqwest::get(&url)
        .await
        .with_context(|| format!("GET {url}"))?
        .error_for_status()?
        .json()
        .await?;
    Ok(value)
}
