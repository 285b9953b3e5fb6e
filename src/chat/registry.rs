use log::debug;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::session::{Session, SessionId};

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// Ids come from the peer address, so a duplicate means two live connections
    /// share an address. Treated as an invariant violation by callers.
    #[error("session {id} is already registered")]
    AlreadyRegistered { id: SessionId },
}

/// Table of sessions currently eligible to receive broadcasts.
///
/// Inserts, removals and snapshots all take the same mutex, so fan-out and `who`
/// never iterate a table that is changing underneath them. The lock is never held
/// across an `.await`.
#[derive(Debug, Default)]
pub struct Registry {
    sessions: Mutex<HashMap<SessionId, Arc<Session>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SessionId, Arc<Session>>> {
        // A panic while holding the lock cannot leave the map half-updated, so a
        // poisoned guard is still usable.
        self.sessions.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn register(&self, session: Arc<Session>) -> Result<(), RegistryError> {
        let mut sessions = self.lock();
        if sessions.contains_key(session.id()) {
            return Err(RegistryError::AlreadyRegistered {
                id: session.id().to_string(),
            });
        }
        debug!("registry: insert {} (size={})", session.id(), sessions.len() + 1);
        sessions.insert(session.id().to_string(), session);
        Ok(())
    }

    /// Remove a session. Returns whether an entry was actually removed; removing an
    /// absent id is a no-op.
    pub fn unregister(&self, id: &str) -> bool {
        let mut sessions = self.lock();
        let removed = sessions.remove(id).is_some();
        if removed {
            debug!("registry: remove {} (size={})", id, sessions.len());
        }
        removed
    }

    /// Point-in-time copy of every registered session, oldest connection first.
    pub fn snapshot(&self) -> Vec<Arc<Session>> {
        let mut list: Vec<Arc<Session>> = self.lock().values().cloned().collect();
        list.sort_by(|a, b| {
            a.connected_at
                .cmp(&b.connected_at)
                .then_with(|| a.id().cmp(b.id()))
        });
        list
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lock().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
