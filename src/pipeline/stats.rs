use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for pipeline activity
#[derive(Debug, Default)]
pub struct PipelineStats {
    pub requests_started: AtomicU64,
    /// Requests dropped because another was outstanding or a save was showing
    pub requests_ignored: AtomicU64,
    pub classifications_completed: AtomicU64,
    pub classifications_failed: AtomicU64,
    pub stale_results_discarded: AtomicU64,
    pub entries_saved: AtomicU64,
    pub saves_failed: AtomicU64,
}

impl PipelineStats {
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current statistics as a snapshot
    pub fn snapshot(&self) -> PipelineStatsSnapshot {
        PipelineStatsSnapshot {
            requests_started: self.requests_started.load(Ordering::Relaxed),
            requests_ignored: self.requests_ignored.load(Ordering::Relaxed),
            classifications_completed: self.classifications_completed.load(Ordering::Relaxed),
            classifications_failed: self.classifications_failed.load(Ordering::Relaxed),
            stale_results_discarded: self.stale_results_discarded.load(Ordering::Relaxed),
            entries_saved: self.entries_saved.load(Ordering::Relaxed),
            saves_failed: self.saves_failed.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of pipeline statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineStatsSnapshot {
    pub requests_started: u64,
    pub requests_ignored: u64,
    pub classifications_completed: u64,
    pub classifications_failed: u64,
    pub stale_results_discarded: u64,
    pub entries_saved: u64,
    pub saves_failed: u64,
}
