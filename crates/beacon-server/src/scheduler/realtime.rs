//! Realtime snapshot refresher.
//!
//! Realtime numbers decay within seconds, so instead of caching them
//! per-request the job recomputes every active website's snapshot on a
//! short fixed interval and parks it in the query cache under the
//! website's realtime key. The report handler serves whatever snapshot is
//! current and recomputes on a miss.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{error, info};

use beacon_core::analytics::{AnalyticsBackend, ReportScope};
use beacon_core::cache_key::realtime_key;

use crate::state::AppState;

/// Recompute and cache one snapshot per active website. Returns the number
/// of websites refreshed.
pub async fn refresh_realtime_snapshots(state: &Arc<AppState>) -> anyhow::Result<usize> {
    let websites = state.analytics.list_active_websites().await?;
    let now = Utc::now();

    for website in &websites {
        let scope = ReportScope::website(website.organization_id.clone(), website.id.clone());
        let snapshot = state.analytics.realtime(&scope, now).await?;
        let value = serde_json::to_value(&snapshot)?;
        state
            .query_cache
            .insert(
                realtime_key(&website.organization_id, &website.id),
                value,
                state.config.realtime_ttl(),
            )
            .await;
    }

    Ok(websites.len())
}

pub async fn run_realtime_refresh_loop(state: Arc<AppState>) {
    let tick = Duration::from_secs(state.config.realtime_refresh_seconds.max(1));
    info!(tick_seconds = tick.as_secs(), "Realtime refresh started");
    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        if let Err(e) = refresh_realtime_snapshots(&state).await {
            error!(error = %e, "Realtime refresh iteration failed");
        }
    }
}
