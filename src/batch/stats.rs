//! Batch progress counters
//!
//! Atomic counters updated incrementally by workers for operator
//! visibility; not required for correctness.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Internal counters shared across workers
#[derive(Debug, Default)]
pub(crate) struct BatchStatsInternal {
    pub(crate) documents_completed: AtomicU64,
    pub(crate) documents_failed: AtomicU64,
    pub(crate) references_visited: AtomicU64,
    pub(crate) references_failed: AtomicU64,
    pub(crate) artifacts_generated: AtomicU64,
}

impl BatchStatsInternal {
    #[inline]
    pub fn inc_documents_completed(&self) -> u64 {
        self.documents_completed.fetch_add(1, Ordering::Relaxed) + 1
    }

    #[inline]
    pub fn inc_documents_failed(&self) {
        self.documents_failed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_references_visited(&self) {
        self.references_visited.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_references_failed(&self) {
        self.references_failed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_artifacts_generated(&self) {
        self.artifacts_generated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn artifacts(&self) -> u64 {
        self.artifacts_generated.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self, cancelled: bool, elapsed: Duration) -> BatchReport {
        BatchReport {
            documents_completed: self.documents_completed.load(Ordering::Relaxed),
            documents_failed: self.documents_failed.load(Ordering::Relaxed),
            references_visited: self.references_visited.load(Ordering::Relaxed),
            references_failed: self.references_failed.load(Ordering::Relaxed),
            artifacts_generated: self.artifacts_generated.load(Ordering::Relaxed),
            cancelled,
            elapsed,
        }
    }
}

/// Final snapshot of one batch run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Documents fully processed
    pub documents_completed: u64,
    /// Documents skipped because the catalog had no record or navigation
    pub documents_failed: u64,
    /// (tree, reference) pairs visited
    pub references_visited: u64,
    /// References whose generation failed and was skipped
    pub references_failed: u64,
    /// Artifacts actually written (base passages plus renderings)
    pub artifacts_generated: u64,
    /// Whether the run stopped on the cancellation signal
    pub cancelled: bool,
    /// Wall-clock duration of the run
    pub elapsed: Duration,
}
