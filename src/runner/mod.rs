//! Drives the engine against a row store: resolve the run's configuration,
//! read every source table once, then walk the analysis table row by row and
//! write each record's results back.

mod load;

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{AvailabilityRun, ConfigError, IdleRun, RunConfig, UsageRun};
use crate::engine::{WindowMatcher, intersect_availability, parse_window, reconcile_window, union_occupancy};
use crate::model::*;
use crate::observability;
use crate::store::{RowStore, StoreError};

use load::cell;

#[derive(Debug)]
pub enum RunError {
    Config(ConfigError),
    /// A source table could not be read in full. Nothing was written.
    Source { table: String, source: StoreError },
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunError::Config(e) => write!(f, "configuration error: {e}"),
            RunError::Source { table, source } => write!(f, "cannot read table {table}: {source}"),
        }
    }
}

impl std::error::Error for RunError {}

impl From<ConfigError> for RunError {
    fn from(e: ConfigError) -> Self {
        RunError::Config(e)
    }
}

fn source(table: &str) -> impl FnOnce(StoreError) -> RunError + '_ {
    move |source| RunError::Source {
        table: table.to_string(),
        source,
    }
}

/// Outcome of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub run: String,
    pub kind: &'static str,
    /// Records whose results were written (possibly with some failed fields).
    pub processed: usize,
    /// Records skipped for unreadable rows or unusable windows.
    pub skipped: usize,
    /// Idle records without a matching total or occupied record.
    pub unmatched: usize,
    pub write_failures: usize,
}

impl RunReport {
    fn skip(&mut self, reason: &'static str) {
        self.skipped += 1;
        metrics::counter!(observability::RECORDS_SKIPPED_TOTAL, "kind" => self.kind, "reason" => reason).increment(1);
    }

    fn done(&mut self) {
        self.processed += 1;
        metrics::counter!(observability::RECORDS_PROCESSED_TOTAL, "kind" => self.kind).increment(1);
    }
}

pub struct Runner<S: RowStore> {
    store: Arc<S>,
}

impl<S: RowStore> Clone for Runner<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: RowStore> Runner<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Execute one run. Configuration problems and unreadable source tables
    /// fail the run before anything is written; per-record problems are
    /// counted in the report.
    pub async fn run(&self, config: &RunConfig) -> Result<RunReport, RunError> {
        let kind = observability::run_label(config);
        let started = Instant::now();
        info!("run {} ({kind}) starting", config.name());

        let result = self.execute(config.clone()).await;

        let status = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!(observability::RUNS_TOTAL, "kind" => kind, "status" => status).increment(1);
        metrics::histogram!(observability::RUN_DURATION_SECONDS, "kind" => kind)
            .record(started.elapsed().as_secs_f64());

        match &result {
            Ok(report) => info!(
                "run {} finished: {} processed, {} skipped, {} unmatched, {} failed writes",
                report.run, report.processed, report.skipped, report.unmatched, report.write_failures
            ),
            Err(e) => tracing::error!("run {} aborted: {e}", config.name()),
        }
        result
    }

    async fn execute(&self, mut config: RunConfig) -> Result<RunReport, RunError> {
        config.resolve(self.store.as_ref()).await?;
        match &config {
            RunConfig::Availability(run) => self.run_availability(run).await,
            RunConfig::Usage(run) => self.run_usage(run).await,
            RunConfig::Idle(run) => self.run_idle(run).await,
        }
    }

    /// Window of one analysis record. Unreadable rows and unusable windows are
    /// skipped and counted.
    async fn record_window(&self, table: &str, id: &str, start: &str, end: &str, report: &mut RunReport) -> Option<Span> {
        let row = match self.store.read_row(table, id).await {
            Ok(row) => row,
            Err(e) => {
                warn!("{table}: record {id} skipped, read failed: {e}");
                report.skip("read");
                return None;
            }
        };
        match parse_window(cell(&row, start), cell(&row, end)) {
            Ok(window) => Some(window),
            Err(e) => {
                warn!("{table}: record {id} skipped: {e}");
                report.skip("window");
                None
            }
        }
    }

    // ── Availability ─────────────────────────────────────

    /// Continuously available resources per window, classified through the
    /// catalog when one is configured.
    async fn run_availability(&self, run: &AvailabilityRun) -> Result<RunReport, RunError> {
        let mut report = RunReport {
            run: run.name.clone(),
            kind: "availability",
            ..RunReport::default()
        };
        let store = self.store.as_ref();
        let catalog = match &run.catalog {
            Some(binding) => Some(
                load::load_catalog(store, binding, run.case)
                    .await
                    .map_err(source(&binding.table))?,
            ),
            None => None,
        };
        let timeline = load::load_timeline(store, &run.schedule)
            .await
            .map_err(source(&run.schedule.table))?;
        let analysis = &run.analysis;
        let ids = store
            .list_row_ids(&analysis.table)
            .await
            .map_err(source(&analysis.table))?;
        info!(
            "run {}: {} snapshots, {} catalog entries, {} records",
            run.name,
            timeline.len(),
            catalog.as_ref().map_or(0, |c| c.len()),
            ids.len()
        );

        let categories: Vec<String> = run.outputs.iter().map(|o| o.category.clone()).collect();
        for id in ids {
            let Some(window) = self
                .record_window(&analysis.table, &id, &analysis.start_field, &analysis.end_field, &mut report)
                .await
            else {
                continue;
            };
            let bracketed = timeline.bracket(&window);
            let available = intersect_availability(bracketed, run.case);
            debug!("{id}: {} snapshots bracketed, {} available", bracketed.len(), available.len());
            let results = match &catalog {
                Some(catalog) => catalog.classify(&available, &categories),
                None => run
                    .outputs
                    .first()
                    .map(|o| vec![CategoryResult::new(o.category.clone(), available.into_vec())])
                    .unwrap_or_default(),
            };
            for (output, result) in run.outputs.iter().zip(&results) {
                self.write_result(&analysis.table, &id, &output.list_field, &output.count_field, result, &mut report)
                    .await;
            }
            report.done();
        }
        Ok(report)
    }

    // ── Usage ────────────────────────────────────────────

    /// Resources held by events overlapping each window, per category, plus
    /// the names of those events.
    async fn run_usage(&self, run: &UsageRun) -> Result<RunReport, RunError> {
        let mut report = RunReport {
            run: run.name.clone(),
            kind: "usage",
            ..RunReport::default()
        };
        let store = self.store.as_ref();
        let events = load::load_events(store, &run.events, &run.categories)
            .await
            .map_err(source(&run.events.table))?;
        let analysis = &run.analysis;
        let ids = store
            .list_row_ids(&analysis.table)
            .await
            .map_err(source(&analysis.table))?;
        info!("run {}: {} events, {} records", run.name, events.len(), ids.len());

        let specs = run.category_specs();
        for id in ids {
            let Some(window) = self
                .record_window(&analysis.table, &id, &analysis.start_field, &analysis.end_field, &mut report)
                .await
            else {
                continue;
            };
            let occupancy = union_occupancy(&events, &window, &specs);
            debug!("{id}: {} overlapping events", occupancy.events.len());
            let event_list = RawValue::text(occupancy.event_list());
            if let Err(e) = store
                .write_field(&analysis.table, &analysis.event_list_field, &id, event_list)
                .await
            {
                self.write_failed(&analysis.table, &id, &analysis.event_list_field, &e, &mut report);
            }
            for (category, result) in run.categories.iter().zip(occupancy.results()) {
                self.write_result(&analysis.table, &id, &category.list_field, &category.count_field, &result, &mut report)
                    .await;
            }
            report.done();
        }
        Ok(report)
    }

    // ── Idle ─────────────────────────────────────────────

    /// Total minus occupied, for every idle record whose window matches a
    /// record in both baseline tables.
    async fn run_idle(&self, run: &IdleRun) -> Result<RunReport, RunError> {
        let mut report = RunReport {
            run: run.name.clone(),
            kind: "idle",
            ..RunReport::default()
        };
        let store = self.store.as_ref();
        let total_lists: Vec<(&str, &str)> = run
            .categories
            .iter()
            .map(|c| (c.category.as_str(), c.total_field.as_str()))
            .collect();
        let occupied_lists: Vec<(&str, &str)> = run
            .categories
            .iter()
            .map(|c| (c.category.as_str(), c.occupied_field.as_str()))
            .collect();
        let totals = load::load_records(store, &run.total, &total_lists)
            .await
            .map_err(source(&run.total.table))?;
        let occupied = load::load_records(store, &run.occupied, &occupied_lists)
            .await
            .map_err(source(&run.occupied.table))?;
        let idle = &run.idle;
        let ids = store.list_row_ids(&idle.table).await.map_err(source(&idle.table))?;
        info!(
            "run {}: {} total, {} occupied, {} records",
            run.name,
            totals.len(),
            occupied.len(),
            ids.len()
        );

        let specs = run.category_specs();
        let matcher = WindowMatcher::new(run.match_tolerance_ms);
        for id in ids {
            let Some(window) = self
                .record_window(&idle.table, &id, &idle.start_field, &idle.end_field, &mut report)
                .await
            else {
                continue;
            };
            let Some(results) = reconcile_window(&window, &totals, &occupied, &specs, matcher) else {
                debug!("{id}: no total or occupied record for [{}, {})", window.start, window.end);
                report.unmatched += 1;
                metrics::counter!(observability::RECORDS_SKIPPED_TOTAL, "kind" => report.kind, "reason" => "unmatched")
                    .increment(1);
                continue;
            };
            for (category, result) in run.categories.iter().zip(&results) {
                self.write_result(&idle.table, &id, &category.list_field, &category.count_field, result, &mut report)
                    .await;
            }
            report.done();
        }
        Ok(report)
    }

    // ── Writes ───────────────────────────────────────────

    /// Write a category's list and count concurrently. A failure on one field
    /// does not stop the other.
    async fn write_result(
        &self,
        table: &str,
        row: &str,
        list_field: &str,
        count_field: &str,
        result: &CategoryResult,
        report: &mut RunReport,
    ) {
        let (list, count) = futures::join!(
            self.store.write_field(table, list_field, row, RawValue::text(result.list())),
            self.store.write_field(table, count_field, row, RawValue::count(result.count())),
        );
        for (field, outcome) in [(list_field, list), (count_field, count)] {
            if let Err(e) = outcome {
                self.write_failed(table, row, field, &e, report);
            }
        }
    }

    fn write_failed(&self, table: &str, row: &str, field: &str, error: &StoreError, report: &mut RunReport) {
        warn!("{table}: write of {field} on {row} failed: {error}");
        report.write_failures += 1;
        metrics::counter!(observability::FIELD_WRITE_FAILURES_TOTAL, "kind" => report.kind).increment(1);
    }
}
