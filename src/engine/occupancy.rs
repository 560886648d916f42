use crate::limits::UNNAMED_EVENT;
use crate::model::*;

use super::tokens::resource_set;

// ── Occupancy Unioner ─────────────────────────────────────────────

/// Resources held by events overlapping a window.
#[derive(Debug, Clone, PartialEq)]
pub struct Occupancy {
    /// Names of the overlapping events, in event order.
    pub events: Vec<String>,
    /// One set per requested category, in category order.
    pub sets: Vec<(String, ResourceSet)>,
}

impl Occupancy {
    pub fn event_list(&self) -> String {
        self.events.join(EVENT_LIST_SEPARATOR)
    }

    pub fn results(self) -> Vec<CategoryResult> {
        self.sets
            .into_iter()
            .map(|(category, set)| CategoryResult::new(category, set.into_vec()))
            .collect()
    }
}

/// Events whose span strictly overlaps `window`. Touching a bound is not overlap.
pub fn overlapping<'a>(events: &'a [EventRecord], window: &'a Span) -> impl Iterator<Item = &'a EventRecord> {
    events.iter().filter(move |e| e.span.overlaps(window))
}

/// Union each category's resources across all overlapping events.
///
/// Any overlapping event makes a resource busy for the whole window. With no
/// overlapping events every set is empty.
pub fn union_occupancy(events: &[EventRecord], window: &Span, categories: &[CategorySpec]) -> Occupancy {
    let mut names = Vec::new();
    let mut sets: Vec<(String, ResourceSet)> = categories
        .iter()
        .map(|c| (c.name.clone(), ResourceSet::new()))
        .collect();

    for event in overlapping(events, window) {
        names.push(
            event
                .name
                .clone()
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| UNNAMED_EVENT.to_string()),
        );
        for (spec, (_, set)) in categories.iter().zip(sets.iter_mut()) {
            if let Some(raw) = event.resources.get(&spec.name) {
                set.extend(resource_set(raw, spec.case).into_vec());
            }
        }
    }

    Occupancy { events: names, sets }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn event(name: &str, start: Ms, end: Ms, resources: &[(&str, &str)]) -> EventRecord {
        EventRecord {
            id: format!("rec-{name}"),
            name: Some(name.to_string()),
            span: Span::new(start, end),
            resources: resources
                .iter()
                .map(|(cat, list)| (cat.to_string(), RawValue::from(*list)))
                .collect::<HashMap<_, _>>(),
        }
    }

    fn people() -> Vec<CategorySpec> {
        vec![CategorySpec::new("people", Case::Exact)]
    }

    #[test]
    fn union_across_overlapping_events() {
        let events = vec![
            event("e1", 50, 150, &[("people", "x,y")]),
            event("e2", 180, 250, &[("people", "y,z")]),
        ];
        let occ = union_occupancy(&events, &Span::new(100, 200), &people());
        assert_eq!(occ.events, vec!["e1", "e2"]);
        assert_eq!(occ.sets[0].1.clone().into_vec(), vec!["x", "y", "z"]);
    }

    #[test]
    fn touching_events_do_not_overlap() {
        let events = vec![
            event("before", 0, 100, &[("people", "a")]),
            event("after", 200, 300, &[("people", "b")]),
            event("inside", 120, 130, &[("people", "c")]),
        ];
        let occ = union_occupancy(&events, &Span::new(100, 200), &people());
        assert_eq!(occ.events, vec!["inside"]);
        assert_eq!(occ.sets[0].1.clone().into_vec(), vec!["c"]);
    }

    #[test]
    fn no_overlap_yields_empty_sets_for_every_category() {
        let categories = vec![
            CategorySpec::new("people", Case::Exact),
            CategorySpec::new("screens", Case::Lower),
        ];
        let occ = union_occupancy(&[], &Span::new(100, 200), &categories);
        assert!(occ.events.is_empty());
        assert_eq!(occ.event_list(), "");
        let results = occ.results();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.count() == 0 && r.list().is_empty()));
    }

    #[test]
    fn categories_are_kept_apart_and_normalized() {
        let events = vec![
            event("e1", 0, 10, &[("people", "Ann"), ("screens", "MON-1")]),
            event("e2", 5, 15, &[("screens", "mon-1, Mon-2")]),
        ];
        let categories = vec![
            CategorySpec::new("people", Case::Exact),
            CategorySpec::new("screens", Case::Lower),
        ];
        let occ = union_occupancy(&events, &Span::new(2, 8), &categories);
        let results = occ.results();
        assert_eq!(results[0], CategoryResult::new("people", vec!["Ann".into()]));
        assert_eq!(
            results[1],
            CategoryResult::new("screens", vec!["mon-1".into(), "mon-2".into()])
        );
    }

    #[test]
    fn blank_event_names_are_labelled() {
        let mut e = event("", 0, 10, &[]);
        e.name = None;
        let occ = union_occupancy(&[e, event(" ", 0, 10, &[])], &Span::new(1, 2), &people());
        assert_eq!(occ.event_list(), format!("{UNNAMED_EVENT}; {UNNAMED_EVENT}"));
    }
}
