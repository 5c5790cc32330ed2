//! Pairing identity and lifecycle tracking.
//!
//! # Responsibilities
//! - Generate unique pairing IDs for tracing
//! - Cap concurrent bridged pairings via a semaphore
//! - Count live pairings so shutdown can wait for them to drain
//! - Publish the live pairing gauge

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::observability::metrics;

/// Global atomic counter for pairing IDs.
/// Relaxed ordering is enough: only uniqueness matters.
static PAIRING_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for one client/backend pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PairingId(u64);

impl PairingId {
    /// Generate a new unique pairing ID.
    pub fn new() -> Self {
        Self(PAIRING_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for PairingId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PairingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "pair-{}", self.0)
    }
}

/// Tracks live pairings and enforces the pairing limit.
#[derive(Debug, Clone)]
pub struct PairingTracker {
    /// Current count of live pairings.
    active_count: Arc<AtomicU64>,
    /// One permit per allowed pairing.
    limit: Arc<Semaphore>,
    max_pairings: usize,
}

impl PairingTracker {
    /// Create a tracker allowing `max_pairings` concurrent pairings.
    pub fn new(max_pairings: usize) -> Self {
        Self {
            active_count: Arc::new(AtomicU64::new(0)),
            limit: Arc::new(Semaphore::new(max_pairings)),
            max_pairings,
        }
    }

    /// Reserve a slot for a new pairing. Returns `None` when at capacity.
    ///
    /// The slot is released when the returned guard is dropped.
    pub fn try_track(&self) -> Option<PairingGuard> {
        let permit = self.limit.clone().try_acquire_owned().ok()?;
        let active = self.active_count.fetch_add(1, Ordering::SeqCst) + 1;
        metrics::set_active_pairings(active);

        Some(PairingGuard {
            active_count: Arc::clone(&self.active_count),
            id: PairingId::new(),
            _permit: permit,
        })
    }

    /// Get current live pairing count.
    pub fn active_count(&self) -> u64 {
        self.active_count.load(Ordering::SeqCst)
    }

    /// Configured maximum pairings.
    pub fn max_pairings(&self) -> usize {
        self.max_pairings
    }

    /// Wait until every pairing has been released or `timeout` elapses.
    ///
    /// Returns true if the tracker drained in time.
    pub async fn wait_for_drain(&self, timeout: Duration) -> bool {
        let drained = async {
            while self.active_count.load(Ordering::SeqCst) > 0 {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        };
        tokio::time::timeout(timeout, drained).await.is_ok()
    }
}

/// Slot held for the lifetime of one pairing.
/// Decrements the live count when dropped.
#[derive(Debug)]
pub struct PairingGuard {
    active_count: Arc<AtomicU64>,
    id: PairingId,
    _permit: OwnedSemaphorePermit,
}

impl PairingGuard {
    /// Get this pairing's ID.
    pub fn id(&self) -> PairingId {
        self.id
    }
}

impl Drop for PairingGuard {
    fn drop(&mut self) {
        let active = self.active_count.fetch_sub(1, Ordering::SeqCst) - 1;
        metrics::set_active_pairings(active);
        tracing::trace!(pairing_id = %self.id, "Pairing released");
    }
}
