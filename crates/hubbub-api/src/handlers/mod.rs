//! HTTP and WebSocket handlers.

pub mod assets;
pub mod status;
pub mod ws;

use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::Instant;

use hubbub_core::config::RelayConfig;
use hubbub_services::SessionController;

#[derive(Clone)]
pub struct ApiState {
    pub controller: Arc<SessionController>,
    /// Queue sizes, frame limits and the connection cap.
    pub relay: RelayConfig,
    /// Source of connection ids. Never reused within a process.
    pub next_id: Arc<AtomicU64>,
    pub started_at: Instant,
}

impl ApiState {
    pub fn new(controller: Arc<SessionController>, relay: RelayConfig) -> Self {
        Self {
            controller,
            relay,
            next_id: Arc::new(AtomicU64::new(1)),
            started_at: Instant::now(),
        }
    }

    /// Wire up a fresh controller from relay settings.
    pub fn from_config(relay: RelayConfig) -> Self {
        let controller = Arc::new(SessionController::from_config(&relay));
        Self::new(controller, relay)
    }
}

// Re-export handler functions for use in router setup.
pub use assets::{handle_asset, handle_index};
pub use status::{handle_connections, handle_status};
pub use ws::handle_ws;
