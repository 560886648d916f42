use crate::model::*;

use super::tokens::resource_set;

// ── Availability Intersector ──────────────────────────────────────

/// Resources present in every bracketed snapshot.
///
/// An empty bracket, or any snapshot listing nobody, yields the empty set.
/// Result order follows the first snapshot's token order.
pub fn intersect_availability(bracketed: &[Snapshot], case: Case) -> ResourceSet {
    let mut snapshots = bracketed.iter();
    let Some(first) = snapshots.next() else {
        return ResourceSet::new();
    };
    let mut available = resource_set(&first.resources, case);
    for snapshot in snapshots {
        if available.is_empty() {
            break;
        }
        let present = resource_set(&snapshot.resources, case);
        available.retain(|id| present.contains(id));
    }
    available
}
