//! Retention reaper.
//!
//! Deletes sessions (and their pageviews/events) past the retention horizon
//! in fixed-size batches, each its own short transaction, so the writer
//! lock is never held long enough to stall ingestion. Interrupting the loop
//! loses nothing: every batch re-selects from "older than cutoff" against
//! live data.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{error, info};

use beacon_core::analytics::AnalyticsBackend;

use crate::state::AppState;

const REAPER_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Drain everything past the horizon, one batch at a time. Returns the
/// total number of sessions deleted.
pub async fn run_retention_reaper(state: &Arc<AppState>) -> anyhow::Result<usize> {
    let cutoff = Utc::now() - chrono::Duration::days(state.config.retention_days as i64);
    let batch_size = state.config.reaper_batch_size;
    let mut total = 0usize;

    loop {
        let deleted = state
            .analytics
            .delete_expired_sessions(cutoff, batch_size)
            .await?;
        if deleted == 0 {
            break;
        }
        total += deleted;
        info!(deleted, total, "Retention reaper batch complete");
    }

    if total > 0 {
        info!(total, cutoff = %cutoff, "Session cleanup completed");
    }
    Ok(total)
}

/// Loop: reap once per day. The first tick fires at startup, which doubles
/// as catch-up after downtime.
pub async fn run_retention_loop(state: Arc<AppState>) {
    info!(
        retention_days = state.config.retention_days,
        batch_size = state.config.reaper_batch_size,
        "Retention reaper started"
    );
    let mut interval = tokio::time::interval(REAPER_INTERVAL);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        if let Err(e) = run_retention_reaper(&state).await {
            error!(error = %e, "Retention reaper iteration failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, Utc};

    use beacon_core::analytics::AnalyticsBackend;
    use beacon_core::config::Config;
    use beacon_core::model::PageviewFields;
    use beacon_duckdb::DuckDbBackend;

    use crate::state::AppState;

    use super::run_retention_reaper;

    fn test_config() -> Config {
        Config {
            port: 0,
            data_dir: String::new(),
            retention_days: 90,
            reaper_batch_size: 2,
            cache_ttl_seconds: 300,
            ingest_dedup_ttl_seconds: 300,
            realtime_refresh_seconds: 120,
            aggregation_tick_seconds: 300,
            cors_origins: vec![],
            duckdb_memory_limit: "1GB".to_string(),
        }
    }

    fn pageview() -> PageviewFields {
        PageviewFields {
            page_url: "/".to_string(),
            page_title: None,
            referrer: None,
            load_time: None,
            user_agent: None,
            ip_address: None,
        }
    }

    #[tokio::test]
    async fn reaper_drains_expired_sessions_and_spares_live_ones() {
        let db = DuckDbBackend::open_in_memory().expect("db");
        db.seed_website("site_1", "org_1", "example.com")
            .await
            .expect("seed");
        let state = Arc::new(AppState::new(db, test_config()));

        let now = Utc::now();
        for session in ["old1", "old2", "old3", "old4", "old5"] {
            state
                .analytics
                .record_pageview("site_1", session, &pageview(), now - Duration::days(120))
                .await
                .expect("old pv");
        }
        state
            .analytics
            .record_pageview("site_1", "fresh", &pageview(), now)
            .await
            .expect("fresh pv");

        // Batch size 2 drains 5 sessions in ceil(5/2) = 3 batches.
        let total = run_retention_reaper(&state).await.expect("reap");
        assert_eq!(total, 5);

        let conn = state.db.conn_for_test().await;
        let (sessions, page_views): (i64, i64) = conn
            .prepare(
                "SELECT (SELECT COUNT(*) FROM sessions), (SELECT COUNT(*) FROM page_views)",
            )
            .expect("prepare")
            .query_row([], |r| Ok((r.get(0)?, r.get(1)?)))
            .expect("row");
        assert_eq!(sessions, 1, "only the live session survives");
        assert_eq!(page_views, 1);
    }

    #[tokio::test]
    async fn reaper_is_a_noop_when_nothing_expired() {
        let db = DuckDbBackend::open_in_memory().expect("db");
        db.seed_website("site_1", "org_1", "example.com")
            .await
            .expect("seed");
        let state = Arc::new(AppState::new(db, test_config()));

        state
            .analytics
            .record_pageview("site_1", "s1", &pageview(), Utc::now() - Duration::days(89))
            .await
            .expect("pv");

        assert_eq!(run_retention_reaper(&state).await.expect("reap"), 0);
    }
}
