//! Chunked upload reassembly.
//!
//! Each connection may have at most one upload in flight. Chunks are placed
//! by index, so they may arrive in any order; the finished file is the
//! concatenation of all slots in index order. Slots are stored only as they
//! arrive, so memory follows the bytes received rather than `totalChunks`.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use hubbub_core::{ChatMessage, ChunkUpload, ConnectionId};

use crate::registry::ConnectionRegistry;

/// Why a chunk was refused. The connection's upload is discarded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("totalChunks must be positive, got {total}")]
    InvalidTotal { total: i64 },
    #[error("totalChunks {total} exceeds the limit of {limit}")]
    TooManyChunks { total: i64, limit: usize },
    #[error("chunk index {index} outside 0..{total}")]
    IndexOutOfRange { index: i64, total: usize },
    #[error("totalChunks changed mid-upload: started with {expected}, got {got}")]
    TotalMismatch { expected: usize, got: usize },
    #[error("chunk for {got:?} while {expected:?} is still uploading")]
    FilenameMismatch { expected: String, got: String },
    #[error("upload exceeds {limit} bytes")]
    FileTooLarge { limit: usize },
}

/// Result of feeding one chunk to the reassembler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReassemblyOutcome {
    Incomplete,
    /// Every slot is filled; the assembled file, ready for broadcast.
    Complete(ChatMessage),
    ProtocolError(ProtocolError),
}

/// Progress of an in-flight upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadProgress {
    pub filename: String,
    pub received: usize,
    pub total: usize,
}

struct ChunkSet {
    filename: String,
    file_type: String,
    total: usize,
    /// Filled slots keyed by chunk index.
    slots: BTreeMap<usize, String>,
    bytes: usize,
    last_chunk_at: Instant,
}

impl ChunkSet {
    fn new(filename: &str, file_type: &str, total: usize) -> Self {
        Self {
            filename: filename.to_string(),
            file_type: file_type.to_string(),
            total,
            slots: BTreeMap::new(),
            bytes: 0,
            last_chunk_at: Instant::now(),
        }
    }

    /// Distinct slots filled so far.
    fn received(&self) -> usize {
        self.slots.len()
    }

    /// Whether chunk 0 of (`filename`, `total`) starts a new upload rather
    /// than filling the first slot of this one.
    fn superseded_by(&self, filename: &str, total: usize) -> bool {
        self.slots.contains_key(&0) || self.filename != filename || self.total != total
    }

    /// Store `data` at `index`. A repeated index overwrites but is only
    /// counted once.
    fn put(&mut self, index: usize, data: String) {
        self.bytes += data.len();
        if let Some(old) = self.slots.insert(index, data) {
            self.bytes -= old.len();
        }
        self.last_chunk_at = Instant::now();
    }

    fn is_complete(&self) -> bool {
        self.received() == self.total
    }

    fn assemble(self) -> String {
        let mut out = String::with_capacity(self.bytes);
        for slot in self.slots.into_values() {
            out.push_str(&slot);
        }
        out
    }
}

/// Tracks uploads being reassembled, one per connection.
#[derive(Clone)]
pub struct ChunkReassembler {
    active: Arc<DashMap<ConnectionId, ChunkSet>>,
    registry: ConnectionRegistry,
    max_file_bytes: usize,
    max_chunks: usize,
}

impl ChunkReassembler {
    pub fn new(registry: ConnectionRegistry, max_file_bytes: usize, max_chunks: usize) -> Self {
        Self {
            active: Arc::new(DashMap::new()),
            registry,
            max_file_bytes,
            max_chunks,
        }
    }

    /// Feed one chunk from `conn`.
    ///
    /// Chunk 0 of a different upload (or a second chunk 0) replaces whatever
    /// the connection had in flight; the earlier upload is dropped without
    /// being broadcast. Chunks that arrive before chunk 0 open the set
    /// themselves. Any protocol error discards the connection's upload.
    pub fn on_chunk(&self, conn: ConnectionId, chunk: ChunkUpload) -> ReassemblyOutcome {
        if chunk.total_chunks <= 0 {
            return self.reject(
                conn,
                ProtocolError::InvalidTotal {
                    total: chunk.total_chunks,
                },
            );
        }
        let total = match usize::try_from(chunk.total_chunks) {
            Ok(t) if t <= self.max_chunks => t,
            _ => {
                return self.reject(
                    conn,
                    ProtocolError::TooManyChunks {
                        total: chunk.total_chunks,
                        limit: self.max_chunks,
                    },
                )
            }
        };
        let index = match usize::try_from(chunk.chunk) {
            Ok(i) if i < total => i,
            _ => {
                return self.reject(
                    conn,
                    ProtocolError::IndexOutOfRange {
                        index: chunk.chunk,
                        total,
                    },
                )
            }
        };

        let mut set = match self.active.entry(conn) {
            Entry::Occupied(mut o) => {
                let current = o.get();
                if index == 0 && current.superseded_by(&chunk.filename, total) {
                    tracing::debug!(
                        conn = %conn,
                        abandoned = %current.filename,
                        filename = %chunk.filename,
                        "new upload supersedes incomplete one"
                    );
                    o.insert(ChunkSet::new(&chunk.filename, &chunk.file_type, total));
                } else if current.total != total {
                    let expected = current.total;
                    drop(o.remove());
                    return self.reject(conn, ProtocolError::TotalMismatch { expected, got: total });
                } else if current.filename != chunk.filename {
                    let expected = current.filename.clone();
                    drop(o.remove());
                    return self.reject(
                        conn,
                        ProtocolError::FilenameMismatch {
                            expected,
                            got: chunk.filename,
                        },
                    );
                }
                o.into_ref()
            }
            Entry::Vacant(v) => v.insert(ChunkSet::new(&chunk.filename, &chunk.file_type, total)),
        };

        set.put(index, chunk.data);

        if set.bytes > self.max_file_bytes {
            drop(set);
            return self.reject(
                conn,
                ProtocolError::FileTooLarge {
                    limit: self.max_file_bytes,
                },
            );
        }

        if !set.is_complete() {
            tracing::trace!(conn = %conn, index, received = set.received(), total, "chunk stored");
            return ReassemblyOutcome::Incomplete;
        }
        drop(set);

        // A disconnect may have cleared the set between the two lookups.
        let Some((_, set)) = self.active.remove(&conn) else {
            return ReassemblyOutcome::Incomplete;
        };

        let filename = set.filename.clone();
        let file_type = set.file_type.clone();
        let data = set.assemble();
        tracing::info!(
            conn = %conn,
            filename = %filename,
            bytes = data.len(),
            chunks = total,
            "file reassembled"
        );
        ReassemblyOutcome::Complete(ChatMessage::file(
            self.registry.sender_label(conn),
            filename,
            file_type,
            data,
        ))
    }

    /// Drop any upload owned by `conn`. Nothing is broadcast.
    pub fn on_connection_closed(&self, conn: ConnectionId) {
        if let Some((_, set)) = self.active.remove(&conn) {
            tracing::debug!(
                conn = %conn,
                filename = %set.filename,
                received = set.received(),
                total = set.total,
                "discarding partial upload"
            );
        }
    }

    /// Remove uploads that have not seen a chunk for `max_idle`.
    /// Returns how many were dropped.
    pub fn sweep_stale(&self, max_idle: Duration) -> usize {
        let before = self.active.len();
        self.active.retain(|conn, set| {
            let stale = set.last_chunk_at.elapsed() > max_idle;
            if stale {
                tracing::warn!(conn = %conn, filename = %set.filename, "removing stale upload (timed out)");
            }
            !stale
        });
        before.saturating_sub(self.active.len())
    }

    /// Number of uploads currently in flight.
    pub fn in_progress(&self) -> usize {
        self.active.len()
    }

    pub fn progress(&self, conn: ConnectionId) -> Option<UploadProgress> {
        self.active.get(&conn).map(|set| UploadProgress {
            filename: set.filename.clone(),
            received: set.received(),
            total: set.total,
        })
    }

    fn reject(&self, conn: ConnectionId, err: ProtocolError) -> ReassemblyOutcome {
        self.active.remove(&conn);
        ReassemblyOutcome::ProtocolError(err)
    }
}
