//! # Configuration Management Module
//!
//! Chatroom reads an optional TOML file at startup. Every field has a default, so a
//! missing file (or a missing section) still yields a runnable server.
//!
//! ## Configuration Structure
//!
//! - [`ServerConfig`] - Listener address, port, session limit and welcome text
//! - [`ChatConfig`] - Queue capacities, line limits and the outbox overflow policy
//! - [`LoggingConfig`] - Log level and optional log file
//!
//! ## Usage
//!
//! ```rust,no_run
//! use chatroom::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     println!("Listening on {}", config.listen_addr());
//!
//!     Config::create_default("config.toml").await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration File Format
//!
//! ```toml
//! [server]
//! bind_address = "0.0.0.0"
//! port = 8080
//! max_sessions = 256
//!
//! [chat]
//! outbox_capacity = 100
//! broadcast_capacity = 100
//! overflow_policy = "disconnect"
//!
//! [logging]
//! level = "info"
//! ```
//!
//! CLI flags (`--bind`, `--port`) take precedence over the file.

use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::fs;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    /// TCP port; 0 asks the OS for an ephemeral port.
    pub port: u16,
    /// Connections beyond this many live sessions are told the room is full and closed.
    pub max_sessions: usize,
    /// Sent privately to each new session before its join announcement. Empty disables it.
    pub welcome_message: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8080,
            max_sessions: 256,
            welcome_message: String::new(),
        }
    }
}

/// What the broadcast router does when a session's outbox is full.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverflowPolicy {
    /// Fire the slow session's quit signal and move on.
    #[default]
    Disconnect,
    /// Wait up to `block_timeout_ms` for room, then disconnect the session.
    Block,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub outbox_capacity: usize,
    pub broadcast_capacity: usize,
    pub max_line_bytes: usize,
    pub max_name_length: usize,
    pub overflow_policy: OverflowPolicy,
    pub block_timeout_ms: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            outbox_capacity: 100,
            broadcast_capacity: 100,
            max_line_bytes: 1024,
            max_name_length: 32,
            overflow_policy: OverflowPolicy::Disconnect,
            block_timeout_ms: 2000,
        }
    }
}

impl ChatConfig {
    pub fn block_timeout(&self) -> Duration {
        Duration::from_millis(self.block_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

impl LoggingConfig {
    /// Parse `level` into a filter, falling back to `Info` for unknown names.
    pub fn level_filter(&self) -> log::LevelFilter {
        self.level.parse().unwrap_or(log::LevelFilter::Info)
    }
}

impl Config {
    /// Load configuration from a file
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;

        config.validate()?;
        Ok(config)
    }

    /// Load the file if it exists, otherwise return defaults. A file that exists but
    /// fails to parse is still an error.
    pub async fn load_or_default(path: &str) -> Result<Self> {
        if fs::try_exists(path).await.unwrap_or(false) {
            Self::load(path).await
        } else {
            Ok(Config::default())
        }
    }

    /// Create a default configuration file
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.max_sessions == 0 {
            bail!("server.max_sessions must be at least 1");
        }
        if self.chat.outbox_capacity == 0 {
            bail!("chat.outbox_capacity must be at least 1");
        }
        if self.chat.broadcast_capacity == 0 {
            bail!("chat.broadcast_capacity must be at least 1");
        }
        if self.chat.max_line_bytes == 0 {
            bail!("chat.max_line_bytes must be at least 1");
        }
        if self.chat.max_name_length == 0 {
            bail!("chat.max_name_length must be at least 1");
        }
        Ok(())
    }

    /// `bind_address:port` as handed to the listener.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.bind_address, self.server.port)
    }
}
