//! Broadcast fan-out to live connections.
//!
//! Delivery is a non-blocking enqueue onto each connection's bounded
//! outbound queue. A full queue marks the connection as overflowed; the
//! caller decides what to do with it (the session controller evicts it).
//! A closed queue means the connection is already on its way out and is
//! skipped.

use std::sync::Arc;

use tokio::sync::mpsc::error::TrySendError;

use hubbub_core::{ChatMessage, ConnectionId, ServerEvent};

use crate::registry::{ConnectionRegistry, Frame};

/// What happened to one broadcast.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Frames enqueued.
    pub delivered: usize,
    /// Connections whose outbound queue was full.
    pub overflowed: Vec<ConnectionId>,
}

/// Fans server events out to every connection in the registry.
#[derive(Clone)]
pub struct BroadcastDispatcher {
    registry: ConnectionRegistry,
}

impl BroadcastDispatcher {
    pub fn new(registry: ConnectionRegistry) -> Self {
        Self { registry }
    }

    /// Broadcast a chat message to all live connections, skipping `exclude`.
    pub fn broadcast(&self, msg: &ChatMessage, exclude: Option<ConnectionId>) -> DeliveryReport {
        self.send_event(&ServerEvent::from(msg), exclude)
    }

    /// Broadcast the live connection count to everyone.
    pub fn broadcast_count(&self, count: usize) -> DeliveryReport {
        self.send_event(&ServerEvent::UpdateUsers(count), None)
    }

    /// Serialize once, enqueue for every recipient in the current snapshot.
    pub fn send_event(&self, event: &ServerEvent, exclude: Option<ConnectionId>) -> DeliveryReport {
        let frame: Frame = match event.to_frame() {
            Ok(f) => Arc::from(f),
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize event");
                return DeliveryReport::default();
            }
        };

        let mut report = DeliveryReport::default();
        for (id, outbound) in self.registry.recipients() {
            if Some(id) == exclude {
                continue;
            }
            match outbound.try_send(Arc::clone(&frame)) {
                Ok(()) => report.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(conn = %id, "outbound queue full");
                    report.overflowed.push(id);
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!(conn = %id, "outbound queue closed, skipping");
                }
            }
        }
        tracing::trace!(
            recipients = report.delivered,
            overflowed = report.overflowed.len(),
            "broadcast event"
        );
        report
    }
}
