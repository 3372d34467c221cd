//! hubbubd — realtime broadcast relay daemon.

use std::time::Duration;

use anyhow::{Context, Result};

use hubbub_api::ApiState;
use hubbub_core::config::HubbubConfig;

/// How often idle uploads are swept and the connection snapshot is logged.
const HOUSEKEEPING_INTERVAL: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load config
    if let Err(e) = HubbubConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    let config = HubbubConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        HubbubConfig::default()
    });
    tracing::info!(
        listen = %config.listen_addr(),
        echo_to_sender = config.relay.echo_to_sender,
        outbound_queue = config.relay.outbound_queue,
        max_message_bytes = config.relay.max_message_bytes,
        max_connections = config.relay.max_connections,
        "hubbubd starting"
    );

    // Shared state
    let state = ApiState::from_config(config.relay.clone());
    let controller = state.controller.clone();

    let listener = tokio::net::TcpListener::bind(config.listen_addr())
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr()))?;
    tracing::info!(addr = %listener.local_addr()?, "relay listening");

    // ── Spawn tasks ──────────────────────────────────────────────────────────

    let server_task = tokio::spawn(hubbub_api::serve_on(listener, state));

    let idle_timeout = config.relay.upload_idle_timeout();
    let housekeeping_task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(HOUSEKEEPING_INTERVAL);
        loop {
            interval.tick().await;
            if let Some(max_idle) = idle_timeout {
                let dropped = controller.sweep_stale_uploads(max_idle);
                if dropped > 0 {
                    tracing::info!(dropped, "stale uploads swept");
                }
            }
            tracing::info!(
                connections = controller.registry().size(),
                uploads = controller.reassembler().in_progress(),
                "connection snapshot"
            );
        }
    });

    // ── Wait for exit ────────────────────────────────────────────────────────

    tokio::select! {
        _ = tokio::signal::ctrl_c() => tracing::info!("shutdown signal received"),
        r = server_task => match r {
            Ok(Ok(())) => tracing::warn!("server exited"),
            Ok(Err(e)) => tracing::error!(error = %e, "server failed"),
            Err(e) => tracing::error!(error = %e, "server task panicked"),
        },
        r = housekeeping_task => tracing::error!("housekeeping task exited: {:?}", r),
    }

    Ok(())
}
