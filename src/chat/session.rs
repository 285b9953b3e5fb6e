use chrono::{DateTime, Utc};
use std::net::SocketAddr;
use std::sync::RwLock;
use tokio::sync::{mpsc, watch};

/// Registry key for a session: the peer's `ip:port` as text.
pub type SessionId = String;

/// Lifecycle of a session. Transitions only move forward:
/// `Active -> Quitting -> Terminated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Active,
    /// Quit signal fired; teardown has not finished yet.
    Quitting,
    /// Deregistered and the connection is being closed.
    Terminated,
}

/// Single-fire termination signal shared by a session's tasks.
///
/// Any task may call [`QuitSignal::trigger`] any number of times; only the first call
/// moves the state out of `Active`. The quit watcher waits on [`QuitSignal::fired`] and
/// finishes teardown with [`QuitSignal::terminate`], which the reader and writer observe
/// through [`QuitSignal::closed`] to drop their socket halves.
#[derive(Debug)]
pub struct QuitSignal {
    state: watch::Sender<SessionState>,
}

impl Default for QuitSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl QuitSignal {
    pub fn new() -> Self {
        let (state, _) = watch::channel(SessionState::Active);
        Self { state }
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Request teardown. Returns `true` only for the call that actually fired the signal.
    pub fn trigger(&self) -> bool {
        self.state.send_if_modified(|s| {
            if *s == SessionState::Active {
                *s = SessionState::Quitting;
                true
            } else {
                false
            }
        })
    }

    /// Mark teardown complete. Idempotent.
    pub fn terminate(&self) {
        self.state.send_if_modified(|s| {
            if *s != SessionState::Terminated {
                *s = SessionState::Terminated;
                true
            } else {
                false
            }
        });
    }

    /// Resolves once the signal has fired (state is no longer `Active`).
    pub async fn fired(&self) {
        let mut rx = self.state.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|s| *s != SessionState::Active).await;
    }

    /// Resolves once the session reached `Terminated`.
    pub async fn closed(&self) {
        let mut rx = self.state.subscribe();
        let _ = rx.wait_for(|s| *s == SessionState::Terminated).await;
    }
}

/// Server-side state for one connected client.
///
/// Sessions are shared as `Arc<Session>` between the registry and the session's own
/// tasks. Nothing here can reach back into the registry; membership changes only go
/// through [`super::Registry::register`] and [`super::Registry::unregister`].
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    display_name: RwLock<String>,
    outbox: mpsc::Sender<String>,
    pub quit: QuitSignal,
    pub connected_at: DateTime<Utc>,
}

impl Session {
    /// Build a session and the receiving end of its outbox, which belongs to the
    /// session's outbound writer.
    pub fn new(id: SessionId, outbox_capacity: usize) -> (Self, mpsc::Receiver<String>) {
        let (outbox, rx) = mpsc::channel(outbox_capacity);
        let session = Session {
            display_name: RwLock::new(id.clone()),
            id,
            outbox,
            quit: QuitSignal::new(),
            connected_at: Utc::now(),
        };
        (session, rx)
    }

    pub fn for_peer(peer: SocketAddr, outbox_capacity: usize) -> (Self, mpsc::Receiver<String>) {
        Self::new(peer.to_string(), outbox_capacity)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn display_name(&self) -> String {
        match self.display_name.read() {
            Ok(name) => name.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Replace the display name, returning the previous one.
    pub fn rename(&self, new_name: String) -> String {
        let mut guard = match self.display_name.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        std::mem::replace(&mut *guard, new_name)
    }

    pub fn outbox(&self) -> &mpsc::Sender<String> {
        &self.outbox
    }

    pub fn is_active(&self) -> bool {
        self.quit.state() == SessionState::Active
    }
}
