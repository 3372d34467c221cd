//! Session lifecycle — routes transport events to the registry, the
//! reassembler and the dispatcher.
//!
//! Membership changes (connect, disconnect, eviction) and the count
//! broadcast that follows each one happen under a single lock, so every
//! client observes counts in the order the changes were applied and the
//! last count it sees is the live one.

use std::sync::{Mutex, MutexGuard};

use hubbub_core::config::RelayConfig;
use hubbub_core::{ChatMessage, ChunkUpload, ClientEvent, ConnectionId, FileUpload};

use crate::dispatcher::{BroadcastDispatcher, DeliveryReport};
use crate::reassembler::{ChunkReassembler, ReassemblyOutcome};
use crate::registry::{ConnectionRegistry, Outbound, RegistryError};

pub struct SessionController {
    registry: ConnectionRegistry,
    reassembler: ChunkReassembler,
    dispatcher: BroadcastDispatcher,
    echo_to_sender: bool,
    /// 0 = unlimited.
    max_connections: usize,
    membership: Mutex<()>,
}

impl SessionController {
    pub fn new(
        registry: ConnectionRegistry,
        reassembler: ChunkReassembler,
        dispatcher: BroadcastDispatcher,
        echo_to_sender: bool,
        max_connections: usize,
    ) -> Self {
        Self {
            registry,
            reassembler,
            dispatcher,
            echo_to_sender,
            max_connections,
            membership: Mutex::new(()),
        }
    }

    /// Build the full component stack from relay settings.
    pub fn from_config(config: &RelayConfig) -> Self {
        let registry = ConnectionRegistry::new();
        let reassembler =
            ChunkReassembler::new(registry.clone(), config.max_file_bytes, config.max_chunks);
        let dispatcher = BroadcastDispatcher::new(registry.clone());
        Self::new(
            registry,
            reassembler,
            dispatcher,
            config.echo_to_sender,
            config.max_connections,
        )
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn reassembler(&self) -> &ChunkReassembler {
        &self.reassembler
    }

    pub fn echo_to_sender(&self) -> bool {
        self.echo_to_sender
    }

    /// Whether a new connection would be refused right now.
    pub fn at_capacity(&self) -> bool {
        self.max_connections > 0 && self.registry.size() >= self.max_connections
    }

    /// Register a connection and tell everyone the new count. The capacity
    /// check and the insert happen under the membership lock, so concurrent
    /// connects never overshoot `max_connections`.
    pub fn connect(
        &self,
        id: ConnectionId,
        addr: &str,
        outbound: Outbound,
    ) -> Result<(), RegistryError> {
        let overflowed = {
            let _guard = self.lock_membership();
            if self.at_capacity() {
                return Err(RegistryError::AtCapacity {
                    limit: self.max_connections,
                });
            }
            self.registry.on_connect(id, addr, outbound)?;
            tracing::info!(conn = %id, addr, count = self.registry.size(), "client connected");
            self.dispatcher.broadcast_count(self.registry.size()).overflowed
        };
        self.evict(overflowed);
        Ok(())
    }

    /// Forget a connection, drop its upload, and tell everyone the new
    /// count. Unknown ids are ignored.
    pub fn disconnect(&self, id: ConnectionId) {
        let overflowed = {
            let _guard = self.lock_membership();
            self.remove_locked(id, "client disconnected")
        };
        self.evict(overflowed);
    }

    /// Route one parsed client event.
    pub fn handle_event(&self, id: ConnectionId, event: ClientEvent) {
        match event {
            ClientEvent::Message(text) => self.on_text(id, text),
            ClientEvent::File(file) => self.on_file(id, file),
            ClientEvent::FileChunk(chunk) => {
                self.on_chunk(id, chunk);
            }
        }
    }

    pub fn on_text(&self, id: ConnectionId, text: String) {
        let msg = ChatMessage::text(self.registry.sender_label(id), text);
        self.deliver(id, &msg);
    }

    /// Whole-file upload in a single frame.
    pub fn on_file(&self, id: ConnectionId, file: FileUpload) {
        tracing::info!(conn = %id, filename = %file.filename, bytes = file.data.len(), "file received");
        let msg = ChatMessage::file(
            self.registry.sender_label(id),
            file.filename,
            file.file_type,
            file.data,
        );
        self.deliver(id, &msg);
    }

    /// Feed a chunk to the reassembler; broadcast the file once complete.
    pub fn on_chunk(&self, id: ConnectionId, chunk: ChunkUpload) -> ReassemblyOutcome {
        let outcome = self.reassembler.on_chunk(id, chunk);
        match &outcome {
            ReassemblyOutcome::Incomplete => {}
            ReassemblyOutcome::Complete(msg) => self.deliver(id, msg),
            ReassemblyOutcome::ProtocolError(e) => {
                tracing::warn!(conn = %id, error = %e, "chunk rejected, upload discarded");
            }
        }
        outcome
    }

    /// Drop uploads idle for longer than `max_idle`.
    pub fn sweep_stale_uploads(&self, max_idle: std::time::Duration) -> usize {
        self.reassembler.sweep_stale(max_idle)
    }

    fn deliver(&self, from: ConnectionId, msg: &ChatMessage) {
        let exclude = (!self.echo_to_sender).then_some(from);
        let report: DeliveryReport = self.dispatcher.broadcast(msg, exclude);
        self.evict(report.overflowed);
    }

    /// Disconnect peers whose outbound queue overflowed. Each eviction
    /// broadcasts a new count, which may overflow further peers.
    fn evict(&self, mut pending: Vec<ConnectionId>) {
        while let Some(id) = pending.pop() {
            let _guard = self.lock_membership();
            pending.extend(self.remove_locked(id, "evicting slow client"));
        }
    }

    /// Caller holds the membership lock. Returns peers that overflowed on the
    /// count broadcast.
    fn remove_locked(&self, id: ConnectionId, reason: &'static str) -> Vec<ConnectionId> {
        let Some(conn) = self.registry.on_disconnect(id) else {
            return Vec::new();
        };
        self.reassembler.on_connection_closed(id);
        tracing::info!(
            conn = %id,
            addr = %conn.addr,
            count = self.registry.size(),
            "{reason}"
        );
        // Dropping `conn` releases the registry's outbound sender, which
        // ends the connection's writer once its queue drains.
        drop(conn);
        self.dispatcher.broadcast_count(self.registry.size()).overflowed
    }

    fn lock_membership(&self) -> MutexGuard<'_, ()> {
        self.membership
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
