use std::sync::Arc;

use anyhow::Result;
use ember_insight::{Config, Orchestrator, http::start_http_server, init_tracing};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        e
    })?;

    init_tracing(config.app.debug);

    let orchestrator = Orchestrator::from_config(&config)?;
    info!(
        model = orchestrator.backend().model(),
        task_timeout_ms = config.analysis.task_timeout_ms,
        analysis_timeout_ms = config.analysis.analysis_timeout_ms,
        "Orchestrator ready"
    );

    start_http_server(Arc::new(config), Arc::new(orchestrator)).await
}
