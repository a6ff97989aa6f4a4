use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use beacon_server::scheduler;
use beacon_server::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Structured JSON logging. Level controlled via RUST_LOG.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("beacon_server=info".parse()?)
                .add_directive("beacon_duckdb=info".parse()?),
        )
        .json()
        .init();

    let cfg = beacon_core::config::Config::from_env().map_err(|e| anyhow::anyhow!(e))?;

    // Ensure the data directory exists before opening DuckDB.
    std::fs::create_dir_all(&cfg.data_dir)?;
    let db_path = format!("{}/beacon.db", cfg.data_dir);
    let db = beacon_duckdb::DuckDbBackend::open(&db_path, &cfg.duckdb_memory_limit)?;

    let state = Arc::new(AppState::new(db, cfg.clone()));

    // Background jobs: daily aggregation, retention reaper, realtime refresh.
    {
        let state = Arc::clone(&state);
        tokio::spawn(scheduler::aggregation::run_aggregation_loop(state));
    }
    {
        let state = Arc::clone(&state);
        tokio::spawn(scheduler::retention::run_retention_loop(state));
    }
    {
        let state = Arc::clone(&state);
        tokio::spawn(scheduler::realtime::run_realtime_refresh_loop(state));
    }

    let addr = format!("0.0.0.0:{}", cfg.port);
    let app = beacon_server::app::build_app(Arc::clone(&state));

    info!(port = cfg.port, "beacon listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::signal::ctrl_c().await.ok();
        })
        .await?;

    Ok(())
}
