//! Grace-period domain for array teardown.
//!
//! Lookups on the dispatch path enter a read section before touching a slot
//! and leave it when the caller drops the returned reference. Teardown calls
//! [`Quiescence::synchronize`], which returns only after every read section
//! that was open when it started has closed.
//!
//! ## Protocol
//!
//! Two reader counters are selected by the low bit of a generation word.
//! A reader increments the counter of the generation it observes; a writer
//! flips the generation and waits for the old counter to drain, then does it
//! once more so that a reader which sampled the generation just before the
//! first flip is also waited out. Readers pay one atomic increment and one
//! decrement; writers serialize on an internal mutex.
//!
//! ## Tracing & Metrics
//!
//! - **Target**: `reuseport.grace`
//!   - `DEBUG`: grace period completion with `grace_period_us`
//!   - `WARN`: a wait exceeding [`QuiescenceConfig::warn_after`]
//! - **Metrics**: `grace_periods_total`, `grace_period_duration_ns_total`,
//!   `grace_period_duration_ns_max`

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Default spin iterations before yielding during a grace-period wait.
pub const DEFAULT_SPIN_BEFORE_YIELD: u32 = 1024;

/// Default wait after which a slow grace period is reported.
pub const DEFAULT_WARN_AFTER: Duration = Duration::from_secs(1);

// ---------------------------------------------------------------------------
// Global metrics
// ---------------------------------------------------------------------------

static GRACE_PERIODS_TOTAL: AtomicU64 = AtomicU64::new(0);
static GRACE_PERIOD_DURATION_NS_TOTAL: AtomicU64 = AtomicU64::new(0);
static GRACE_PERIOD_DURATION_NS_MAX: AtomicU64 = AtomicU64::new(0);

/// Snapshot of grace-period metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GraceMetrics {
    pub grace_periods_total: u64,
    pub grace_period_duration_ns_total: u64,
    pub grace_period_duration_ns_max: u64,
}

/// Read current grace-period metrics.
#[must_use]
pub fn grace_metrics() -> GraceMetrics {
    GraceMetrics {
        grace_periods_total: GRACE_PERIODS_TOTAL.load(Ordering::Relaxed),
        grace_period_duration_ns_total: GRACE_PERIOD_DURATION_NS_TOTAL.load(Ordering::Relaxed),
        grace_period_duration_ns_max: GRACE_PERIOD_DURATION_NS_MAX.load(Ordering::Relaxed),
    }
}

/// Reset metrics (for tests).
pub fn reset_grace_metrics() {
    GRACE_PERIODS_TOTAL.store(0, Ordering::Relaxed);
    GRACE_PERIOD_DURATION_NS_TOTAL.store(0, Ordering::Relaxed);
    GRACE_PERIOD_DURATION_NS_MAX.store(0, Ordering::Relaxed);
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tuning for grace-period waits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuiescenceConfig {
    /// Waits longer than this emit one warning.
    pub warn_after: Duration,
    /// Busy-spin iterations before falling back to `yield_now`.
    pub spin_before_yield: u32,
}

impl Default for QuiescenceConfig {
    fn default() -> Self {
        Self {
            warn_after: DEFAULT_WARN_AFTER,
            spin_before_yield: DEFAULT_SPIN_BEFORE_YIELD,
        }
    }
}

// ---------------------------------------------------------------------------
// Quiescence
// ---------------------------------------------------------------------------

/// Reader-tracking domain with a blocking grace-period barrier.
pub struct Quiescence {
    generation: AtomicU64,
    readers: [AtomicU64; 2],
    writer_lock: Mutex<()>,
    config: QuiescenceConfig,
}

impl Quiescence {
    #[must_use]
    pub fn new(config: QuiescenceConfig) -> Self {
        Self {
            generation: AtomicU64::new(0),
            readers: [AtomicU64::new(0), AtomicU64::new(0)],
            writer_lock: Mutex::new(()),
            config,
        }
    }

    #[must_use]
    pub const fn config(&self) -> QuiescenceConfig {
        self.config
    }

    /// Enter a read section. Never blocks.
    #[inline]
    pub fn read_lock(&self) -> ReadSection<'_> {
        let idx = Self::counter_index(self.generation.load(Ordering::SeqCst));
        self.readers[idx].fetch_add(1, Ordering::SeqCst);
        ReadSection { domain: self, idx }
    }

    /// Number of open read sections (diagnostics).
    #[must_use]
    pub fn active_readers(&self) -> u64 {
        self.readers
            .iter()
            .map(|r| r.load(Ordering::Relaxed))
            .sum()
    }

    /// Current generation (diagnostics).
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Relaxed)
    }

    /// Wait until every read section open at the time of the call has
    /// closed. Sections opened afterwards are not waited for.
    #[allow(clippy::cast_possible_truncation)]
    pub fn synchronize(&self) {
        let _guard = self.writer_lock.lock();
        let start = Instant::now();
        let mut warned = false;

        for _ in 0..2 {
            let old = Self::counter_index(self.generation.fetch_add(1, Ordering::SeqCst));
            self.wait_drained(old, start, &mut warned);
        }

        let elapsed = start.elapsed();
        let ns = elapsed.as_nanos() as u64;
        GRACE_PERIODS_TOTAL.fetch_add(1, Ordering::Relaxed);
        GRACE_PERIOD_DURATION_NS_TOTAL.fetch_add(ns, Ordering::Relaxed);
        GRACE_PERIOD_DURATION_NS_MAX.fetch_max(ns, Ordering::Relaxed);

        tracing::debug!(
            target: "reuseport.grace",
            grace_period_us = elapsed.as_micros() as u64,
            generation = self.generation.load(Ordering::Relaxed),
            "grace period complete"
        );
    }

    fn wait_drained(&self, idx: usize, start: Instant, warned: &mut bool) {
        let mut spins = 0_u32;
        while self.readers[idx].load(Ordering::SeqCst) != 0 {
            spins = spins.saturating_add(1);
            if spins < self.config.spin_before_yield {
                std::hint::spin_loop();
            } else {
                std::thread::yield_now();
            }
            if !*warned && start.elapsed() >= self.config.warn_after {
                *warned = true;
                tracing::warn!(
                    target: "reuseport.grace",
                    waited_ms = start.elapsed().as_millis(),
                    readers = self.readers[idx].load(Ordering::Relaxed),
                    "grace period blocked by long-running readers"
                );
            }
        }
    }

    #[inline]
    #[allow(clippy::cast_possible_truncation)]
    const fn counter_index(generation: u64) -> usize {
        (generation & 1) as usize
    }
}

impl Default for Quiescence {
    fn default() -> Self {
        Self::new(QuiescenceConfig::default())
    }
}

#[allow(clippy::missing_fields_in_debug)]
impl std::fmt::Debug for Quiescence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Quiescence")
            .field("generation", &self.generation())
            .field("active_readers", &self.active_readers())
            .finish_non_exhaustive()
    }
}

/// An open read section. Dropping it ends the section.
#[must_use = "dropping a ReadSection ends the read immediately"]
pub struct ReadSection<'a> {
    domain: &'a Quiescence,
    idx: usize,
}

impl Drop for ReadSection<'_> {
    #[inline]
    fn drop(&mut self) {
        self.domain.readers[self.idx].fetch_sub(1, Ordering::SeqCst);
    }
}

impl std::fmt::Debug for ReadSection<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadSection").field("idx", &self.idx).finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
