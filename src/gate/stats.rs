use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for frame gate activity
#[derive(Debug, Default)]
pub struct GateStats {
    pub frames_seen: AtomicU64,
    pub frames_throttled: AtomicU64,
    pub frames_analyzed: AtomicU64,
    /// Presence checks that failed and were read as "no face"
    pub presence_failures: AtomicU64,
    pub stale_decisions: AtomicU64,
}

impl GateStats {
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> GateStatsSnapshot {
        GateStatsSnapshot {
            frames_seen: self.frames_seen.load(Ordering::Relaxed),
            frames_throttled: self.frames_throttled.load(Ordering::Relaxed),
            frames_analyzed: self.frames_analyzed.load(Ordering::Relaxed),
            presence_failures: self.presence_failures.load(Ordering::Relaxed),
            stale_decisions: self.stale_decisions.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GateStatsSnapshot {
    pub frames_seen: u64,
    pub frames_throttled: u64,
    pub frames_analyzed: u64,
    pub presence_failures: u64,
    pub stale_decisions: u64,
}
