//! # Chatroom - Multi-User Line Chat over TCP
//!
//! Chatroom is a small text chat server: connect with `nc` or `telnet`, type lines,
//! and everyone in the room sees them.
//!
//! ## Features
//!
//! - **Live Broadcast**: Every chat line, join and departure is fanned out to all sessions
//!   in one global order.
//! - **Commands**: `who` lists online users privately, `rename` changes your display name,
//!   `bye` leaves.
//! - **Bounded Queues**: Per-session outboxes and the broadcast queue are bounded, with an
//!   explicit policy for slow clients.
//! - **Clean Teardown**: A single quit path deregisters the session, announces the
//!   departure and closes the socket, whether the client said `bye` or just vanished.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use chatroom::chat::ChatServer;
//! use chatroom::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load_or_default("config.toml").await?;
//!     ChatServer::bind(config).await?.run().await
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`chat`] - Sessions, registry, reader/writer/router tasks and the listener
//! - [`config`] - TOML configuration
//! - [`validation`] - Display name rules for `rename`
//! - [`logutil`] - Escaping client text for single-line logs
//! - [`metrics`] - Process-wide counters
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │ Listener Loop   │ ← accepts, registers, spawns per-session tasks
//! └─────────────────┘
//!          │
//! ┌─────────────────┐
//! │ Inbound Readers │ ← one per session: commands + chat lines
//! └─────────────────┘
//!          │
//! ┌─────────────────┐
//! │ Broadcast Router│ ← single task, FIFO, snapshot fan-out
//! └─────────────────┘
//!          │
//! ┌─────────────────┐
//! │ Outbound Writers│ ← one per session: outbox → socket
//! └─────────────────┘
//! ```

pub mod chat;
pub mod config;
pub mod logutil;
pub mod metrics;
pub mod validation;
