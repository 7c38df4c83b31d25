//! Progress counter and cooperative cancellation token for long stack scans.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Shared between a long-running scan and whoever is watching it.
///
/// Workers call [`increment`](Self::increment) after each unit of work and
/// check [`is_cancelled`](Self::is_cancelled) before starting the next one.
#[derive(Debug, Default)]
pub struct OperationProgress {
    processed: AtomicU64,
    total: AtomicU64,
    cancelled: AtomicBool,
}

impl OperationProgress {
    pub fn new(total: u64) -> Self {
        Self {
            processed: AtomicU64::new(0),
            total: AtomicU64::new(total),
            cancelled: AtomicBool::new(false),
        }
    }

    /// Restarts counting for a new phase. The cancellation flag is kept.
    pub fn reset(&self, total: u64) {
        self.total.store(total, Ordering::Release);
        self.processed.store(0, Ordering::Release);
    }

    #[inline]
    pub fn increment(&self) {
        self.processed.fetch_add(1, Ordering::AcqRel);
    }

    #[inline]
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Acquire)
    }

    #[inline]
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Acquire)
    }

    /// Requests cancellation; running workers stop at their next check.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Fraction of work done in `0.0..=1.0`.
    pub fn fraction(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        (self.processed() as f64 / total as f64).min(1.0)
    }
}
