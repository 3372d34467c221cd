//! Configuration system for hubbub.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $HUBBUB_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/hubbub/config.toml
//!   3. ~/.config/hubbub/config.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// 16 MiB, the largest logical unit accepted from a client.
pub const DEFAULT_MAX_BYTES: usize = 16 * 1024 * 1024;

/// Enough for a full-size file in 4 KiB chunks.
pub const DEFAULT_MAX_CHUNKS: usize = 4096;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HubbubConfig {
    pub network: NetworkConfig,
    pub relay: RelayConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address the HTTP/WebSocket listener binds to.
    pub bind_addr: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Deliver broadcasts back to the connection that sent them.
    pub echo_to_sender: bool,
    /// Outbound frames buffered per connection before it is evicted as slow.
    pub outbound_queue: usize,
    /// Largest single frame accepted from a client.
    pub max_message_bytes: usize,
    /// Largest file a chunked upload may reassemble to.
    pub max_file_bytes: usize,
    /// Largest `totalChunks` a client may announce for one upload.
    pub max_chunks: usize,
    /// Drop uploads that see no chunk for this long. 0 = never.
    pub upload_idle_timeout_secs: u64,
    /// Refuse new connections beyond this count. 0 = unlimited.
    pub max_connections: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            echo_to_sender: true,
            outbound_queue: 256,
            max_message_bytes: DEFAULT_MAX_BYTES,
            max_file_bytes: DEFAULT_MAX_BYTES,
            max_chunks: DEFAULT_MAX_CHUNKS,
            upload_idle_timeout_secs: 300,
            max_connections: 0,
        }
    }
}

impl RelayConfig {
    /// Idle timeout for in-flight uploads, `None` when disabled.
    pub fn upload_idle_timeout(&self) -> Option<Duration> {
        (self.upload_idle_timeout_secs > 0)
            .then(|| Duration::from_secs(self.upload_idle_timeout_secs))
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("hubbub")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

fn parse_bool(v: &str) -> bool {
    v == "true" || v == "1"
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl HubbubConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            Self::from_file(&path)?
        } else {
            HubbubConfig::default()
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Parse a config file without applying env overrides.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFailed(path.to_path_buf(), e))?;
        toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.to_path_buf(), e))
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("HUBBUB_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = toml::to_string_pretty(&HubbubConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text).map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Apply HUBBUB_* overrides. `lookup` resolves a variable name to its value.
    ///
    /// Values that fail to parse are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("HUBBUB_NETWORK__BIND_ADDR") {
            self.network.bind_addr = v;
        }
        if let Some(p) = lookup("HUBBUB_NETWORK__PORT").and_then(|v| v.parse().ok()) {
            self.network.port = p;
        }
        if let Some(v) = lookup("HUBBUB_RELAY__ECHO_TO_SENDER") {
            self.relay.echo_to_sender = parse_bool(&v);
        }
        if let Some(n) = lookup("HUBBUB_RELAY__OUTBOUND_QUEUE").and_then(|v| v.parse().ok()) {
            self.relay.outbound_queue = n;
        }
        if let Some(n) = lookup("HUBBUB_RELAY__MAX_MESSAGE_BYTES").and_then(|v| v.parse().ok()) {
            self.relay.max_message_bytes = n;
        }
        if let Some(n) = lookup("HUBBUB_RELAY__MAX_FILE_BYTES").and_then(|v| v.parse().ok()) {
            self.relay.max_file_bytes = n;
        }
        if let Some(n) = lookup("HUBBUB_RELAY__MAX_CHUNKS").and_then(|v| v.parse().ok()) {
            self.relay.max_chunks = n;
        }
        if let Some(n) =
            lookup("HUBBUB_RELAY__UPLOAD_IDLE_TIMEOUT_SECS").and_then(|v| v.parse().ok())
        {
            self.relay.upload_idle_timeout_secs = n;
        }
        if let Some(n) = lookup("HUBBUB_RELAY__MAX_CONNECTIONS").and_then(|v| v.parse().ok()) {
            self.relay.max_connections = n;
        }
    }

    /// `bind_addr:port`, ready for a TCP listener.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.network.bind_addr, self.network.port)
    }
}
