use std::sync::Arc;

use beacon_core::{analytics::AnalyticsBackend, config::Config};
use beacon_duckdb::DuckDbBackend;

use crate::cache::TtlCache;

/// Reporting responses are small JSON documents; capacity is entry count.
const QUERY_CACHE_CAPACITY: u64 = 10_000;
/// One idempotency entry per (domain, session) retry window.
const INGEST_CACHE_CAPACITY: u64 = 100_000;

/// Shared application state injected into every Axum handler via
/// [`axum::extract::State`].
///
/// All fields are safe to clone cheaply — heavy resources are wrapped in
/// `Arc`.
pub struct AppState {
    /// The concrete DuckDB backend; kept alongside the trait object for
    /// test fixtures (`conn_for_test`, `seed_website`).
    pub db: Arc<DuckDbBackend>,

    /// The storage seam the handlers and schedulers talk to.
    pub analytics: Arc<dyn AnalyticsBackend>,

    /// Parsed configuration, loaded once at startup from environment
    /// variables.
    pub config: Arc<Config>,

    /// Read-through cache for overview/timeseries/top-pages responses and
    /// refresh-job realtime snapshots. Invalidated per website by the
    /// aggregation engine.
    pub query_cache: TtlCache,

    /// Write-path idempotency cache: collapses client retries of the same
    /// (domain, session) pageview/event within a short window. Best-effort —
    /// not a correctness guarantee.
    pub ingest_cache: TtlCache,
}

impl AppState {
    pub fn new(db: DuckDbBackend, config: Config) -> Self {
        let db = Arc::new(db);
        Self {
            analytics: db.clone(),
            db,
            config: Arc::new(config),
            query_cache: TtlCache::new(QUERY_CACHE_CAPACITY),
            ingest_cache: TtlCache::new(INGEST_CACHE_CAPACITY),
        }
    }
}
