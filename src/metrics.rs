//! Process-wide chat counters.
//!
//! Plain relaxed atomics; readers only ever need a rough picture (the shutdown summary
//! and tests), never a consistent cross-counter view.
use std::sync::atomic::{AtomicU64, Ordering};

static SESSIONS_OPENED: AtomicU64 = AtomicU64::new(0);
static SESSIONS_CLOSED: AtomicU64 = AtomicU64::new(0);
static SESSIONS_REJECTED: AtomicU64 = AtomicU64::new(0);
static BROADCASTS_ROUTED: AtomicU64 = AtomicU64::new(0);
static DELIVERIES: AtomicU64 = AtomicU64::new(0);
static OUTBOX_OVERFLOWS: AtomicU64 = AtomicU64::new(0);

pub fn inc_sessions_opened() {
    SESSIONS_OPENED.fetch_add(1, Ordering::Relaxed);
}

pub fn inc_sessions_closed() {
    SESSIONS_CLOSED.fetch_add(1, Ordering::Relaxed);
}

pub fn inc_sessions_rejected() {
    SESSIONS_REJECTED.fetch_add(1, Ordering::Relaxed);
}

pub fn inc_broadcasts_routed() {
    BROADCASTS_ROUTED.fetch_add(1, Ordering::Relaxed);
}

pub fn add_deliveries(n: u64) {
    DELIVERIES.fetch_add(n, Ordering::Relaxed);
}

pub fn inc_outbox_overflows() {
    OUTBOX_OVERFLOWS.fetch_add(1, Ordering::Relaxed);
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    pub sessions_opened: u64,
    pub sessions_closed: u64,
    pub sessions_rejected: u64,
    pub broadcasts_routed: u64,
    pub deliveries: u64,
    pub outbox_overflows: u64,
}

impl Snapshot {
    /// Sessions opened but not yet torn down.
    pub fn sessions_live(&self) -> u64 {
        self.sessions_opened.saturating_sub(self.sessions_closed)
    }
}

pub fn snapshot() -> Snapshot {
    Snapshot {
        sessions_opened: SESSIONS_OPENED.load(Ordering::Relaxed),
        sessions_closed: SESSIONS_CLOSED.load(Ordering::Relaxed),
        sessions_rejected: SESSIONS_REJECTED.load(Ordering::Relaxed),
        broadcasts_routed: BROADCASTS_ROUTED.load(Ordering::Relaxed),
        deliveries: DELIVERIES.load(Ordering::Relaxed),
        outbox_overflows: OUTBOX_OVERFLOWS.load(Ordering::Relaxed),
    }
}
