//! Chat messages as the relay sees them.
//!
//! A `ChatMessage` is built once the server has everything it needs to fan
//! it out: who sent it, what it carries, and when it arrived. It is never
//! stored.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Sender label used when a connection is no longer in the registry.
pub const UNKNOWN_USER: &str = "Unknown";

/// Opaque identity of one live connection. Allocated by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Message kind discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Text,
    File,
}

/// What a message carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageContent {
    Text(String),
    /// `file_type` is whatever the client declared (a MIME type or a UI hint
    /// such as `image`); the relay never inspects it.
    File {
        filename: String,
        file_type: String,
        data: String,
    },
}

/// A message ready for broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    /// Remote address of the sender, or [`UNKNOWN_USER`].
    pub sender: String,
    /// Wall-clock arrival time, `HH:MM:SS`.
    pub time: String,
    pub content: MessageContent,
}

impl ChatMessage {
    /// Stamp `content` with the current local time.
    pub fn new(sender: impl Into<String>, content: MessageContent) -> Self {
        Self {
            sender: sender.into(),
            time: timestamp_now(),
            content,
        }
    }

    pub fn text(sender: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(sender, MessageContent::Text(text.into()))
    }

    pub fn file(
        sender: impl Into<String>,
        filename: impl Into<String>,
        file_type: impl Into<String>,
        data: impl Into<String>,
    ) -> Self {
        Self::new(
            sender,
            MessageContent::File {
                filename: filename.into(),
                file_type: file_type.into(),
                data: data.into(),
            },
        )
    }

    pub fn kind(&self) -> MessageKind {
        match self.content {
            MessageContent::Text(_) => MessageKind::Text,
            MessageContent::File { .. } => MessageKind::File,
        }
    }
}

/// Current local time formatted `HH:MM:SS`.
pub fn timestamp_now() -> String {
    chrono::Local::now().format("%H:%M:%S").to_string()
}
