use std::ops::Range;

use crate::model::*;

// ── Snapshot Bracketer ────────────────────────────────────────────

/// Index range of the snapshots that determine availability throughout `window`.
///
/// `sorted` must be ordered by timestamp. The range starts at the last snapshot at
/// or before `window.start` (index 0 when none is) and ends before the first
/// snapshot at or after `window.end`.
pub fn bracket_range(sorted: &[Snapshot], window: &Span) -> Range<usize> {
    // Everything below `at_or_before` has timestamp <= window.start.
    let at_or_before = sorted.partition_point(|s| s.timestamp <= window.start);
    let first = at_or_before.saturating_sub(1);
    let first_after = sorted.partition_point(|s| s.timestamp < window.end);
    first..first_after.max(first)
}

/// Sort a copy of `snapshots` and return the bracketed ones.
pub fn bracket(snapshots: &[Snapshot], window: &Span) -> Vec<Snapshot> {
    Timeline::new(snapshots.to_vec()).bracket(window).to_vec()
}

/// Schedule snapshots sorted once per run and bracketed once per window.
#[derive(Debug, Clone, Default)]
pub struct Timeline {
    snapshots: Vec<Snapshot>,
}

impl Timeline {
    /// Stable sort: snapshots sharing a timestamp keep their read order.
    pub fn new(mut snapshots: Vec<Snapshot>) -> Self {
        snapshots.sort_by_key(|s| s.timestamp);
        Self { snapshots }
    }

    pub fn bracket(&self, window: &Span) -> &[Snapshot] {
        &self.snapshots[bracket_range(&self.snapshots, window)]
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn as_slice(&self) -> &[Snapshot] {
        &self.snapshots
    }
}
