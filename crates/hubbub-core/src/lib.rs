//! hubbub-core — shared types, wire format, and configuration.
//! All other hubbub crates depend on this one.

pub mod config;
pub mod message;
pub mod wire;

pub use message::{ChatMessage, ConnectionId, MessageContent, MessageKind, UNKNOWN_USER};
pub use wire::{ChunkUpload, ClientEvent, FileUpload, MessagePayload, ServerEvent};
