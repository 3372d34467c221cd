//! hubbub wire format — the JSON frames exchanged over the realtime channel.
//!
//! Every frame is a text frame holding one named event:
//!
//! ```text
//! {"event": "<name>", "data": <payload>}
//! ```
//!
//! Field names (`totalChunks`, `type`) are what browser clients already
//! send, so they are part of the protocol and must not be renamed.

use serde::{Deserialize, Serialize};

use crate::message::{ChatMessage, MessageContent};

// ── Client → server ──────────────────────────────────────────────────────────

/// Events a client may send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Plain text to broadcast.
    Message(String),
    /// A whole file in one frame.
    File(FileUpload),
    /// One fragment of a file uploaded incrementally.
    FileChunk(ChunkUpload),
}

impl ClientEvent {
    pub fn parse(frame: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(frame)
    }

    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileUpload {
    pub filename: String,
    pub data: String,
    #[serde(rename = "type")]
    pub file_type: String,
}

/// `chunk` and `total_chunks` are kept signed and unchecked here: range
/// validation belongs to the reassembler, which reports it as a protocol error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkUpload {
    pub filename: String,
    #[serde(rename = "type")]
    pub file_type: String,
    pub data: String,
    pub chunk: i64,
    #[serde(rename = "totalChunks")]
    pub total_chunks: i64,
}

// ── Server → client ──────────────────────────────────────────────────────────

/// Events the server pushes to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Live connection count.
    UpdateUsers(usize),
    /// A broadcast chat message, text or file.
    Message(MessagePayload),
}

impl ServerEvent {
    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn parse(frame: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(frame)
    }
}

/// Flat JSON shape of a broadcast message.
///
/// Text:  `{user, message, type: "text", time}`
/// File:  `{user, filename, data, type: <declared type>, time}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePayload {
    pub user: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    pub time: String,
}

impl From<&ChatMessage> for MessagePayload {
    fn from(msg: &ChatMessage) -> Self {
        match &msg.content {
            MessageContent::Text(text) => Self {
                user: msg.sender.clone(),
                message: Some(text.clone()),
                filename: None,
                data: None,
                kind: "text".to_string(),
                time: msg.time.clone(),
            },
            MessageContent::File {
                filename,
                file_type,
                data,
            } => Self {
                user: msg.sender.clone(),
                message: None,
                filename: Some(filename.clone()),
                data: Some(data.clone()),
                kind: file_type.clone(),
                time: msg.time.clone(),
            },
        }
    }
}

impl From<&ChatMessage> for ServerEvent {
    fn from(msg: &ChatMessage) -> Self {
        ServerEvent::Message(msg.into())
    }
}
