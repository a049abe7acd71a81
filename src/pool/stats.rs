use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Lifetime counters maintained by the pool. Advisory only; no pool
/// invariant depends on them.
#[derive(Debug, Default)]
pub(crate) struct StatsRecorder {
    sessions_opened: AtomicU64,
    sessions_closed: AtomicU64,
    acquires: AtomicU64,
    acquire_timeouts: AtomicU64,
    validation_failures: AtomicU64,
    leaks_reclaimed: AtomicU64,
    grow_events: AtomicU64,
    shrink_events: AtomicU64,
}

impl StatsRecorder {
    pub fn record_session_opened(&self) {
        self.sessions_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_session_closed(&self) {
        self.sessions_closed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_acquire(&self) {
        self.acquires.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_acquire_timeout(&self) {
        self.acquire_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_validation_failure(&self) {
        self.validation_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_leak_reclaimed(&self) {
        self.leaks_reclaimed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_grow(&self) {
        self.grow_events.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_shrink(&self) {
        self.shrink_events.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> PoolStats {
        PoolStats {
            sessions_opened: self.sessions_opened.load(Ordering::Relaxed),
            sessions_closed: self.sessions_closed.load(Ordering::Relaxed),
            acquires: self.acquires.load(Ordering::Relaxed),
            acquire_timeouts: self.acquire_timeouts.load(Ordering::Relaxed),
            validation_failures: self.validation_failures.load(Ordering::Relaxed),
            leaks_reclaimed: self.leaks_reclaimed.load(Ordering::Relaxed),
            grow_events: self.grow_events.load(Ordering::Relaxed),
            shrink_events: self.shrink_events.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of the pool's lifetime counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolStats {
    pub sessions_opened: u64,
    pub sessions_closed: u64,
    pub acquires: u64,
    pub acquire_timeouts: u64,
    pub validation_failures: u64,
    pub leaks_reclaimed: u64,
    pub grow_events: u64,
    pub shrink_events: u64,
}
