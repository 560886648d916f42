use std::collections::HashMap;

use tracing::warn;

use crate::config::{CatalogBinding, EventTable, ScheduleBinding, UsageCategory, WindowTable};
use crate::engine::{Catalog, Timeline, parse_timestamp, parse_window, text_value};
use crate::model::*;
use crate::store::{RowStore, StoreError};

static NULL: RawValue = RawValue::Null;

/// A cell of `row`; absent fields read as null.
pub(super) fn cell<'a>(row: &'a Row, field: &str) -> &'a RawValue {
    row.get(field).unwrap_or(&NULL)
}

/// Every row of a source table. Any failure fails the whole read: the
/// reconciliation needs complete sets.
async fn read_all<S: RowStore + ?Sized>(store: &S, table: &str) -> Result<Vec<(RowId, Row)>, StoreError> {
    let ids = store.list_row_ids(table).await?;
    let mut rows = Vec::with_capacity(ids.len());
    for id in ids {
        let row = store.read_row(table, &id).await?;
        rows.push((id, row));
    }
    Ok(rows)
}

pub(super) async fn load_catalog<S: RowStore + ?Sized>(
    store: &S,
    binding: &CatalogBinding,
    case: Case,
) -> Result<Catalog, StoreError> {
    let rows = read_all(store, &binding.table).await?;
    let entries = rows.into_iter().filter_map(|(_, row)| {
        Some(CatalogEntry {
            identifier: text_value(cell(&row, &binding.id_field))?,
            category: text_value(cell(&row, &binding.category_field))?,
        })
    });
    Ok(Catalog::build(entries, case))
}

/// Snapshots with an unparseable timestamp are dropped with a warning.
pub(super) async fn load_timeline<S: RowStore + ?Sized>(
    store: &S,
    binding: &ScheduleBinding,
) -> Result<Timeline, StoreError> {
    let rows = read_all(store, &binding.table).await?;
    let mut snapshots = Vec::with_capacity(rows.len());
    for (id, mut row) in rows {
        let Some(timestamp) = parse_timestamp(cell(&row, &binding.time_field)) else {
            warn!("{}: snapshot {id} has no usable timestamp, ignored", binding.table);
            continue;
        };
        let resources = row.remove(&binding.resources_field).unwrap_or_default();
        snapshots.push(Snapshot {
            id,
            timestamp,
            resources,
        });
    }
    Ok(Timeline::new(snapshots))
}

/// Events with missing or inverted bounds are dropped with a warning.
pub(super) async fn load_events<S: RowStore + ?Sized>(
    store: &S,
    binding: &EventTable,
    categories: &[UsageCategory],
) -> Result<Vec<EventRecord>, StoreError> {
    let rows = read_all(store, &binding.table).await?;
    let mut events = Vec::with_capacity(rows.len());
    for (id, row) in rows {
        let span = match parse_window(cell(&row, &binding.start_field), cell(&row, &binding.end_field)) {
            Ok(span) => span,
            Err(e) => {
                warn!("{}: event {id} ignored: {e}", binding.table);
                continue;
            }
        };
        let resources: HashMap<String, RawValue> = categories
            .iter()
            .map(|c| (c.category.clone(), cell(&row, &c.event_field).clone()))
            .collect();
        events.push(EventRecord {
            name: text_value(cell(&row, &binding.name_field)),
            id,
            span,
            resources,
        });
    }
    Ok(events)
}

/// Result rows of a previous run, keyed by window. `lists` pairs each
/// category with the field holding its list.
pub(super) async fn load_records<S: RowStore + ?Sized>(
    store: &S,
    binding: &WindowTable,
    lists: &[(&str, &str)],
) -> Result<Vec<AnalysisRecord>, StoreError> {
    let rows = read_all(store, &binding.table).await?;
    Ok(rows
        .into_iter()
        .map(|(row_id, row)| AnalysisRecord {
            window: parse_window(cell(&row, &binding.start_field), cell(&row, &binding.end_field)).ok(),
            lists: lists
                .iter()
                .map(|(category, field)| (category.to_string(), cell(&row, field).clone()))
                .collect(),
            row_id,
        })
        .collect())
}
