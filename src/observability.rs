use std::net::SocketAddr;

use crate::config::RunConfig;

// ── Run metrics ─────────────────────────────────────────────────

/// Counter: analysis runs executed. Labels: kind, status.
pub const RUNS_TOTAL: &str = "freeset_runs_total";

/// Histogram: run duration in seconds. Labels: kind.
pub const RUN_DURATION_SECONDS: &str = "freeset_run_duration_seconds";

// ── Record metrics ──────────────────────────────────────────────

/// Counter: analysis records whose results were written. Labels: kind.
pub const RECORDS_PROCESSED_TOTAL: &str = "freeset_records_processed_total";

/// Counter: analysis records skipped. Labels: kind, reason.
pub const RECORDS_SKIPPED_TOTAL: &str = "freeset_records_skipped_total";

/// Counter: result field writes that failed. Labels: kind.
pub const FIELD_WRITE_FAILURES_TOTAL: &str = "freeset_field_write_failures_total";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), metrics_exporter_prometheus::BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Short label for a run's kind.
pub fn run_label(run: &RunConfig) -> &'static str {
    run.kind()
}
