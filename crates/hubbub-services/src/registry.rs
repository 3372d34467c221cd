//! Connection registry — tracks every live connection and who it belongs to.

use std::sync::Arc;
use std::time::Instant;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::mpsc;

use hubbub_core::{ConnectionId, UNKNOWN_USER};

/// One serialized server frame, shared between all recipients of a broadcast.
pub type Frame = Arc<str>;

/// Sending half of a connection's bounded outbound queue.
pub type Outbound = mpsc::Sender<Frame>;

/// A live connection.
#[derive(Debug)]
pub struct Connection {
    pub id: ConnectionId,
    /// Remote address, used as the sender label on broadcasts.
    pub addr: String,
    pub outbound: Outbound,
    pub connected_at: Instant,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("connection {0} is already registered")]
    DuplicateConnection(ConnectionId),
    #[error("relay is at capacity ({limit} connections)")]
    AtCapacity { limit: usize },
}

/// Read-only view of a registry entry.
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    pub id: ConnectionId,
    pub addr: String,
    pub connected_at: Instant,
}

/// The connection table — shared between the transport, the dispatcher and
/// the session controller. Keyed on connection id.
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    connections: Arc<DashMap<ConnectionId, Connection>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: Arc::new(DashMap::new()),
        }
    }

    /// Register a new connection. Ids are allocated by the transport, so a
    /// duplicate indicates a transport bug; the existing entry is kept.
    pub fn on_connect(
        &self,
        id: ConnectionId,
        addr: impl Into<String>,
        outbound: Outbound,
    ) -> Result<(), RegistryError> {
        match self.connections.entry(id) {
            Entry::Occupied(_) => Err(RegistryError::DuplicateConnection(id)),
            Entry::Vacant(v) => {
                v.insert(Connection {
                    id,
                    addr: addr.into(),
                    outbound,
                    connected_at: Instant::now(),
                });
                Ok(())
            }
        }
    }

    /// Remove a connection. Returns the removed entry, or `None` if it was
    /// already gone (disconnects can race or repeat).
    pub fn on_disconnect(&self, id: ConnectionId) -> Option<Connection> {
        self.connections.remove(&id).map(|(_, conn)| conn)
    }

    pub fn lookup(&self, id: ConnectionId) -> Option<String> {
        self.connections.get(&id).map(|c| c.addr.clone())
    }

    /// Address to label a message from `id` with. Never fails: a connection
    /// removed mid-flight is labelled [`UNKNOWN_USER`].
    pub fn sender_label(&self, id: ConnectionId) -> String {
        self.lookup(id).unwrap_or_else(|| UNKNOWN_USER.to_string())
    }

    pub fn size(&self) -> usize {
        self.connections.len()
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.connections.contains_key(&id)
    }

    /// Outbound queues of every live connection at this instant.
    pub fn recipients(&self) -> Vec<(ConnectionId, Outbound)> {
        self.connections
            .iter()
            .map(|c| (c.id, c.outbound.clone()))
            .collect()
    }

    /// Snapshot of all live connections, ordered by id.
    pub fn list(&self) -> Vec<ConnectionInfo> {
        let mut out: Vec<ConnectionInfo> = self
            .connections
            .iter()
            .map(|c| ConnectionInfo {
                id: c.id,
                addr: c.addr.clone(),
                connected_at: c.connected_at,
            })
            .collect();
        out.sort_by_key(|c| c.id);
        out
    }
}
