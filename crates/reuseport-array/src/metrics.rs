//! Per-array operation counters.
//!
//! Counters are lock-free `AtomicU64` with `Relaxed` ordering; readers may
//! observe slightly stale values but never torn ones. The lookup path is not
//! counted.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Atomic counters for one array.
#[derive(Debug, Default)]
pub struct ArrayMetrics {
    /// Successful updates.
    pub updates_total: AtomicU64,
    /// Updates rejected by validation, existence flags or the busy check.
    pub update_failures_total: AtomicU64,
    /// Successful updates that displaced a previous occupant.
    pub replacements_total: AtomicU64,
    /// Successful deletes.
    pub deletes_total: AtomicU64,
    /// Slots cleared from the socket teardown path.
    pub detaches_total: AtomicU64,
    /// Slots cleared by free.
    pub freed_slots_total: AtomicU64,
}

impl ArrayMetrics {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            updates_total: AtomicU64::new(0),
            update_failures_total: AtomicU64::new(0),
            replacements_total: AtomicU64::new(0),
            deletes_total: AtomicU64::new(0),
            detaches_total: AtomicU64::new(0),
            freed_slots_total: AtomicU64::new(0),
        }
    }

    pub fn record_update(&self, replaced: bool) {
        self.updates_total.fetch_add(1, Ordering::Relaxed);
        if replaced {
            self.replacements_total.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_update_failure(&self) {
        self.update_failures_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delete(&self) {
        self.deletes_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_detach(&self) {
        self.detaches_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_freed_slots(&self, count: u64) {
        self.freed_slots_total.fetch_add(count, Ordering::Relaxed);
    }

    /// Read a point-in-time snapshot.
    #[must_use]
    pub fn snapshot(&self) -> ArrayMetricsSnapshot {
        ArrayMetricsSnapshot {
            updates_total: self.updates_total.load(Ordering::Relaxed),
            update_failures_total: self.update_failures_total.load(Ordering::Relaxed),
            replacements_total: self.replacements_total.load(Ordering::Relaxed),
            deletes_total: self.deletes_total.load(Ordering::Relaxed),
            detaches_total: self.detaches_total.load(Ordering::Relaxed),
            freed_slots_total: self.freed_slots_total.load(Ordering::Relaxed),
        }
    }
}

/// Serializable snapshot of [`ArrayMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ArrayMetricsSnapshot {
    pub updates_total: u64,
    pub update_failures_total: u64,
    pub replacements_total: u64,
    pub deletes_total: u64,
    pub detaches_total: u64,
    pub freed_slots_total: u64,
}

impl std::fmt::Display for ArrayMetricsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "reuseport_array(updates={} failed={} replaced={} deletes={} detaches={} freed={})",
            self.updates_total,
            self.update_failures_total,
            self.replacements_total,
            self.deletes_total,
            self.detaches_total,
            self.freed_slots_total,
        )
    }
}
