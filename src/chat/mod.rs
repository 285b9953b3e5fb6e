//! # Chat Core Module
//!
//! Session lifecycle and broadcast fan-out for the chatroom.
//!
//! ## Components
//!
//! - [`session`] - Per-connection state and the single-fire quit signal
//! - [`registry`] - Shared table of active sessions behind one mutex
//! - [`protocol`] - Line classification and server message text
//! - [`reader`] - Inbound reader task (commands, chat lines, rename sub-exchange)
//! - [`router`] - Broadcast router task and its producer handle
//! - [`writer`] - Outbound writer task
//! - [`server`] - Listener loop and quit watcher
//!
//! ## Session Lifecycle
//!
//! 1. Listener accepts a connection; `id = display name = peer address`
//! 2. Session is registered, its reader, writer and quit watcher are spawned
//! 3. A join notice is broadcast
//! 4. Chat lines flow reader → router → every outbox → each writer
//! 5. `bye`, EOF, a read/write failure or an outbox overflow fires the quit signal
//! 6. The quit watcher broadcasts the departure, deregisters and closes the socket
//!
//! ## Commands
//!
//! | Line     | Effect                                        |
//! |----------|-----------------------------------------------|
//! | `who`    | Private listing of online display names       |
//! | `rename` | Prompt, read one line, set the display name   |
//! | `bye`    | Leave the chatroom                            |
//! | other    | Broadcast as `[name]: text` (sender included) |
//!
//! Each command also accepts a leading backslash (`\who`).

pub mod protocol;
pub mod reader;
pub mod registry;
pub mod router;
pub mod server;
pub mod session;
pub mod writer;

pub use registry::{Registry, RegistryError};
pub use router::{start_router, BroadcastHandle, RouterConfig, RouterStats};
pub use server::ChatServer;
pub use session::{QuitSignal, Session, SessionId, SessionState};
