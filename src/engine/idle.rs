use crate::limits::DEFAULT_MATCH_TOLERANCE_MS;
use crate::model::*;

use super::tokens::{parse_tokens, resource_set};

// ── Idle Reconciler ───────────────────────────────────────────────

/// Associates result rows across tables by their window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowMatcher {
    /// Allowed difference on each bound. Zero means exact equality.
    pub tolerance_ms: Ms,
}

impl Default for WindowMatcher {
    fn default() -> Self {
        Self {
            tolerance_ms: DEFAULT_MATCH_TOLERANCE_MS,
        }
    }
}

impl WindowMatcher {
    pub fn new(tolerance_ms: Ms) -> Self {
        Self { tolerance_ms }
    }

    /// First record in table order whose window matches. Position plays no
    /// other part in matching.
    pub fn find<'a>(&self, records: &'a [AnalysisRecord], window: &Span) -> Option<&'a AnalysisRecord> {
        records.iter().find(|r| {
            r.window
                .as_ref()
                .is_some_and(|w| w.matches(window, self.tolerance_ms))
        })
    }
}

/// Identifiers of `total` absent from `occupied`, in `total`'s token order.
/// Occupied identifiers that are not in `total` are ignored.
pub fn idle_difference(total: &RawValue, occupied: &RawValue, case: Case) -> Vec<String> {
    let busy = resource_set(occupied, case);
    let mut idle = ResourceSet::new();
    for token in parse_tokens(total) {
        let id = case.normalize(&token);
        if !busy.contains(&id) {
            idle.insert(id);
        }
    }
    idle.into_vec()
}

/// Per-category idle lists for one idle record from its matched baseline.
pub fn reconcile_idle(
    total: &AnalysisRecord,
    occupied: &AnalysisRecord,
    categories: &[CategorySpec],
) -> Vec<CategoryResult> {
    categories
        .iter()
        .map(|spec| {
            let members = idle_difference(
                total.lists.get(&spec.name).unwrap_or(&RawValue::Null),
                occupied.lists.get(&spec.name).unwrap_or(&RawValue::Null),
                spec.case,
            );
            CategoryResult::new(spec.name.clone(), members)
        })
        .collect()
}

/// Match both baselines and reconcile. `None` when either side has no record
/// for `window`: absence means there is nothing to compare, not "all idle".
pub fn reconcile_window(
    window: &Span,
    totals: &[AnalysisRecord],
    occupied: &[AnalysisRecord],
    categories: &[CategorySpec],
    matcher: WindowMatcher,
) -> Option<Vec<CategoryResult>> {
    let total = matcher.find(totals, window)?;
    let busy = matcher.find(occupied, window)?;
    Some(reconcile_idle(total, busy, categories))
}
