//! Broadcast router: one task, one bounded FIFO, fan-out to every registered outbox.
//!
//! Producers (inbound readers, the listener's join announcements, quit watchers) hold a
//! cloneable [`BroadcastHandle`]. The router takes a fresh registry snapshot for every
//! message, so a session only sees messages routed after it registered.
//!
//! Full outboxes are handled by [`OverflowPolicy`]:
//! * `Disconnect` - fire the session's quit signal immediately.
//! * `Block` - wait up to the configured timeout for room, then disconnect.
//!
//! Either way the router never waits on one slow client for longer than the block
//! timeout.

use log::{debug, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

use super::registry::Registry;
use super::session::Session;
use crate::config::{ChatConfig, OverflowPolicy};
use crate::logutil::client_text;
use crate::metrics;

#[derive(Debug, Clone, Copy)]
pub struct RouterConfig {
    pub capacity: usize,
    pub policy: OverflowPolicy,
    pub block_timeout: Duration,
}

impl From<&ChatConfig> for RouterConfig {
    fn from(chat: &ChatConfig) -> Self {
        Self {
            capacity: chat.broadcast_capacity,
            policy: chat.overflow_policy,
            block_timeout: chat.block_timeout(),
        }
    }
}

/// Totals for one router lifetime, returned when the router task ends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouterStats {
    pub routed: u64,
    pub delivered: u64,
    pub skipped_closed: u64,
    pub skipped_quitting: u64,
    pub overflows: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delivery {
    Delivered,
    /// Outbox receiver is gone; the session is already tearing down.
    Closed,
    /// Quit already fired; the session gets nothing further.
    Quitting,
    Overflow,
}

/// Cheap, cloneable producer side of the broadcast queue.
#[derive(Clone, Debug)]
pub struct BroadcastHandle {
    tx: mpsc::Sender<String>,
}

impl BroadcastHandle {
    /// Queue a message for every session. Waits while the queue is full. Returns `false`
    /// if the router has stopped.
    pub async fn announce(&self, message: String) -> bool {
        self.tx.send(message).await.is_ok()
    }
}

/// Spawn the router. It runs until every [`BroadcastHandle`] has been dropped and the
/// queue is drained.
pub fn start_router(
    registry: Arc<Registry>,
    cfg: RouterConfig,
) -> (BroadcastHandle, JoinHandle<RouterStats>) {
    let (tx, mut rx) = mpsc::channel::<String>(cfg.capacity);
    let handle = BroadcastHandle { tx };

    let task = tokio::spawn(async move {
        let mut stats = RouterStats::default();
        debug!("broadcast router started (capacity={})", cfg.capacity);
        while let Some(message) = rx.recv().await {
            let recipients = registry.snapshot();
            debug!(
                "routing to {} session(s): {}",
                recipients.len(),
                client_text(&message)
            );
            for session in &recipients {
                match deliver(session, &message, &cfg).await {
                    Delivery::Delivered => stats.delivered += 1,
                    Delivery::Closed => stats.skipped_closed += 1,
                    Delivery::Quitting => stats.skipped_quitting += 1,
                    Delivery::Overflow => stats.overflows += 1,
                }
            }
            stats.routed += 1;
            metrics::inc_broadcasts_routed();
        }
        debug!(
            "broadcast router stopped: routed={} delivered={} closed={} quitting={} overflows={}",
            stats.routed,
            stats.delivered,
            stats.skipped_closed,
            stats.skipped_quitting,
            stats.overflows
        );
        stats
    });

    (handle, task)
}

async fn deliver(session: &Session, message: &str, cfg: &RouterConfig) -> Delivery {
    // Covers the session's own departure notice, which is queued before it deregisters.
    if !session.is_active() {
        return Delivery::Quitting;
    }
    let pending = match session.outbox().try_send(message.to_string()) {
        Ok(()) => {
            metrics::add_deliveries(1);
            return Delivery::Delivered;
        }
        Err(TrySendError::Closed(_)) => return Delivery::Closed,
        Err(TrySendError::Full(pending)) => pending,
    };

    if cfg.policy == OverflowPolicy::Block {
        match tokio::time::timeout(cfg.block_timeout, session.outbox().send(pending)).await {
            Ok(Ok(())) => {
                metrics::add_deliveries(1);
                return Delivery::Delivered;
            }
            Ok(Err(_)) => return Delivery::Closed,
            Err(_) => {}
        }
    }

    metrics::inc_outbox_overflows();
    if session.quit.trigger() {
        warn!(
            "outbox full for {} ({:?} policy); disconnecting slow session",
            session.id(),
            cfg.policy
        );
    }
    Delivery::Overflow
}
