use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use super::protocol;
use super::reader::{run_reader, ReaderContext};
use super::registry::Registry;
use super::router::{start_router, BroadcastHandle, RouterConfig};
use super::session::Session;
use super::writer::run_writer;
use crate::config::Config;
use crate::metrics;

/// # Chat Server - Listener Loop
///
/// Owns the TCP listener, the session registry and the broadcast router. Each accepted
/// connection becomes a [`Session`] with three tasks:
///
/// ```text
///  socket ──► inbound reader ──► broadcast router ──► every outbox ──► outbound writer ──► socket
///                  │                                                        ▲
///                  └── quit signal ──► quit watcher (deregister, close) ────┘
/// ```
///
/// ## Usage
///
/// ```rust,no_run
/// use chatroom::chat::ChatServer;
/// use chatroom::config::Config;
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let server = ChatServer::bind(Config::default()).await?;
///     server.run().await
/// }
/// ```
pub struct ChatServer {
    config: Config,
    listener: TcpListener,
    registry: Arc<Registry>,
    broadcast: BroadcastHandle,
}

impl ChatServer {
    /// Validate the config, bind the listener and start the broadcast router.
    pub async fn bind(config: Config) -> Result<Self> {
        config.validate()?;
        let addr = config.listen_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;

        let registry = Arc::new(Registry::new());
        // The router runs until the listener and every session have dropped their handles.
        let (broadcast, _router) =
            start_router(registry.clone(), RouterConfig::from(&config.chat));

        Ok(Self {
            config,
            listener,
            registry,
            broadcast,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// Accept connections until Ctrl-C or a fatal accept error.
    pub async fn run(self) -> Result<()> {
        self.serve(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Ctrl-C handler unavailable: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Accept connections until `shutdown` resolves (`Ok`) or accepting fails (`Err`).
    pub async fn serve<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        info!("Chatroom listening on {}", self.local_addr()?);
        tokio::pin!(shutdown);

        let outcome = loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested; no longer accepting connections");
                    break Ok(());
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => self.admit(stream, peer).await,
                    Err(e) if is_per_connection(&e) => {
                        warn!("Dropped a connection during accept: {}", e);
                    }
                    Err(e) => {
                        error!("Accept failed, stopping listener: {}", e);
                        break Err(anyhow::Error::new(e).context("accept failed"));
                    }
                },
            }
        };

        let m = metrics::snapshot();
        info!(
            "Chatroom stopped: opened={} closed={} rejected={} routed={} deliveries={} overflows={}",
            m.sessions_opened,
            m.sessions_closed,
            m.sessions_rejected,
            m.broadcasts_routed,
            m.deliveries,
            m.outbox_overflows
        );
        outcome
    }

    /// Turn an accepted connection into a registered session with its three tasks, then
    /// announce the join.
    async fn admit(&self, stream: TcpStream, peer: SocketAddr) {
        if self.registry.len() >= self.config.server.max_sessions {
            metrics::inc_sessions_rejected();
            warn!(
                "[{}] rejected: chatroom full ({} sessions)",
                peer, self.config.server.max_sessions
            );
            tokio::spawn(reject(stream));
            return;
        }

        let (session, outbox_rx) = Session::for_peer(peer, self.config.chat.outbox_capacity);
        let session = Arc::new(session);
        if let Err(e) = self.registry.register(session.clone()) {
            error!("[{}] refusing connection: {}", peer, e);
            return;
        }
        metrics::inc_sessions_opened();
        info!("[{}] connected ({} online)", peer, self.registry.len());

        let welcome = &self.config.server.welcome_message;
        if !welcome.is_empty() {
            let _ = session.outbox().try_send(format!("{}\n", welcome));
        }

        let (read_half, write_half) = stream.into_split();
        let ctx = ReaderContext::new(
            self.registry.clone(),
            self.broadcast.clone(),
            &self.config.chat,
        );
        let writer = tokio::spawn(run_writer(session.clone(), outbox_rx, write_half));
        let reader = tokio::spawn(run_reader(session.clone(), ctx, read_half));
        tokio::spawn(watch_quit(
            session.clone(),
            self.registry.clone(),
            self.broadcast.clone(),
            reader,
            writer,
        ));

        self.broadcast
            .announce(protocol::join_notice(session.id()))
            .await;
    }
}

/// Quit watcher for one session, and the only place a session leaves the registry.
///
/// Waits for the quit signal, announces the departure, deregisters, then terminates the
/// session so the reader and writer drop their socket halves, which closes the
/// connection.
pub async fn watch_quit(
    session: Arc<Session>,
    registry: Arc<Registry>,
    broadcast: BroadcastHandle,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
) {
    debug!("[{}] watching for quit", session.id());
    session.quit.fired().await;

    broadcast
        .announce(protocol::leave_notice(session.id()))
        .await;
    if !registry.unregister(session.id()) {
        warn!("[{}] was not registered at teardown", session.id());
    }
    session.quit.terminate();

    let _ = reader.await;
    let _ = writer.await;
    metrics::inc_sessions_closed();
    info!("[{}] disconnected ({} online)", session.id(), registry.len());
}

async fn reject(mut stream: TcpStream) {
    let _ = stream.write_all(protocol::SERVER_FULL.as_bytes()).await;
    let _ = stream.shutdown().await;
}

/// Accept errors that concern one half-open connection rather than the listener.
fn is_per_connection(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionAborted | io::ErrorKind::ConnectionReset
    )
}
