//! Outstanding-connection tracking for graceful drain.
//!
//! # Responsibilities
//! - Generate unique connection IDs for tracing
//! - Count connections whose worker has not finished yet
//! - Let shutdown code wait until that count reaches zero
//!
//! # Design Decisions
//! - The count lives in a watch channel so waiters wake on change instead of
//!   polling
//! - Decrement happens in `Drop`, so a panicking handler still releases its slot
//! - The serve loop only exposes the tracker; waiting is the caller's choice

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::observability::metrics;

/// Global atomic counter for connection IDs.
/// Relaxed ordering is enough since only uniqueness matters.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Counts connections still being served.
#[derive(Debug, Clone)]
pub struct ConnectionTracker {
    active: Arc<watch::Sender<u64>>,
}

impl ConnectionTracker {
    /// Create a tracker with no outstanding connections.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self {
            active: Arc::new(tx),
        }
    }

    /// Record a new connection. Returns a guard that decrements on drop.
    pub fn track(&self) -> ConnectionGuard {
        let mut current = 0;
        self.active.send_modify(|count| {
            *count += 1;
            current = *count;
        });
        metrics::set_active_connections(current);

        let id = ConnectionId::new();
        tracing::trace!(connection_id = %id, active = current, "Connection tracked");
        ConnectionGuard {
            active: Arc::clone(&self.active),
            id,
        }
    }

    /// Current number of outstanding connections.
    pub fn active_count(&self) -> u64 {
        *self.active.borrow()
    }

    /// Wait until every tracked connection has finished.
    pub async fn wait_for_drain(&self) {
        let mut rx = self.active.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|count| *count == 0).await;
    }

    /// Like [`wait_for_drain`](Self::wait_for_drain), giving up after
    /// `timeout`. Returns true if the drain completed in time.
    pub async fn wait_for_drain_timeout(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.wait_for_drain())
            .await
            .is_ok()
    }
}

impl Default for ConnectionTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Guard that tracks a connection's lifetime.
#[derive(Debug)]
pub struct ConnectionGuard {
    active: Arc<watch::Sender<u64>>,
    id: ConnectionId,
}

impl ConnectionGuard {
    /// Get this connection's ID.
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let mut current = 0;
        self.active.send_modify(|count| {
            *count = count.saturating_sub(1);
            current = *count;
        });
        metrics::set_active_connections(current);
        tracing::trace!(connection_id = %self.id, active = current, "Connection done");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_id_unique() {
        let id1 = ConnectionId::new();
        let id2 = ConnectionId::new();
        assert_ne!(id1, id2);
        assert!(id2.as_u64() > id1.as_u64());
    }

    #[test]
    fn connection_tracker_counts() {
        let tracker = ConnectionTracker::new();
        assert_eq!(tracker.active_count(), 0);

        let guard1 = tracker.track();
        assert_eq!(tracker.active_count(), 1);

        let guard2 = tracker.track();
        assert_eq!(tracker.active_count(), 2);
        assert_ne!(guard1.id(), guard2.id());

        drop(guard1);
        assert_eq!(tracker.active_count(), 1);

        drop(guard2);
        assert_eq!(tracker.active_count(), 0);
    }

    #[tokio::test]
    async fn drain_wakes_when_last_guard_drops() {
        let tracker = ConnectionTracker::new();
        let guard = tracker.track();

        let waiter = {
            let tracker = tracker.clone();
            tokio::spawn(async move { tracker.wait_for_drain().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("drain should complete")
            .unwrap();
    }

    #[tokio::test]
    async fn drain_timeout_reports_stragglers() {
        let tracker = ConnectionTracker::new();
        assert!(tracker.wait_for_drain_timeout(Duration::from_millis(10)).await);

        let _guard = tracker.track();
        assert!(!tracker.wait_for_drain_timeout(Duration::from_millis(20)).await);
    }
}
