use std::sync::Arc;

use tracing::info;

use freeset::config::Config;
use freeset::runner::Runner;
use freeset::store::InMemoryStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let metrics_port: Option<u16> = std::env::var("FREESET_METRICS_PORT")
        .ok()
        .and_then(|s| s.parse().ok());
    freeset::observability::init(metrics_port)?;

    let base = std::env::var("FREESET_BASE").unwrap_or_else(|_| "./base.json".into());
    let config_path = std::env::var("FREESET_CONFIG").unwrap_or_else(|_| "./freeset.json".into());
    let output = std::env::var("FREESET_OUTPUT").unwrap_or_else(|_| base.clone());
    let only: Option<Vec<String>> = std::env::var("FREESET_RUNS").ok().map(|s| {
        s.split(',')
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect()
    });

    let config = Config::load(&config_path)?;
    let store = Arc::new(InMemoryStore::load(&base)?);
    info!("freeset starting");
    info!("  base: {base}");
    info!("  runs: {config_path} ({} configured)", config.runs.len());
    info!("  metrics: {}", metrics_port.map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics")));

    let runner = Runner::new(store.clone());
    let mut failed = 0;
    for run in config.selected(only.as_deref()) {
        match runner.run(run).await {
            Ok(report) => info!("{}", serde_json::to_string(&report)?),
            Err(_) => failed += 1,
        }
    }

    store.save(&output)?;
    info!("results written to {output}");
    if failed > 0 {
        tracing::warn!("{failed} run(s) aborted");
        std::process::exit(1);
    }
    Ok(())
}
