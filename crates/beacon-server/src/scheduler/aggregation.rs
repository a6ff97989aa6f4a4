//! Daily aggregation engine.
//!
//! Compacts one day's raw rows into `daily_website_stats` and `page_stats`.
//! The rollups arrive as a handful of grouped queries across all websites —
//! never one round-trip per website — and the upserts replace full rows, so
//! re-running a day is harmless. After a website's rows land, its query
//! cache entries are invalidated so the next report read sees the fresh
//! aggregates.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use tracing::{error, info, warn};

use beacon_core::analytics::{AnalyticsBackend, DailyStatsRow, PageRollup, PageStatsRow};

use crate::state::AppState;

/// Aggregate `target_date` for every active website. Returns the number of
/// websites processed.
///
/// A store error aborts the whole run and is reported to the caller;
/// whatever completed before the failure stays valid because every upsert
/// is idempotent — the retry overwrites it with identical data. A cache
/// invalidation failure only logs: the stale entries expire with their TTL.
pub async fn run_daily_aggregation(
    state: &Arc<AppState>,
    target_date: NaiveDate,
) -> anyhow::Result<usize> {
    let websites = state.analytics.list_active_websites().await?;

    let pageviews = state.analytics.pageview_rollups(target_date).await?;
    let sessions = state.analytics.session_rollups(target_date).await?;
    let bounces = state.analytics.bounce_rollups(target_date).await?;
    let events = state.analytics.event_rollups(target_date).await?;

    let mut pages_by_website: HashMap<String, Vec<PageRollup>> = HashMap::new();
    for rollup in state.analytics.page_rollups(target_date).await? {
        pages_by_website
            .entry(rollup.website_id.clone())
            .or_default()
            .push(rollup);
    }

    for website in &websites {
        let pageview = pageviews.get(&website.id).copied().unwrap_or_default();
        let session = sessions.get(&website.id).copied().unwrap_or_default();
        let bounced = bounces.get(&website.id).copied().unwrap_or(0);

        // Percentage of sessions with exactly one pageview; a day without
        // sessions is 0, not a division fault.
        let bounce_rate = if session.sessions > 0 {
            bounced as f64 / session.sessions as f64 * 100.0
        } else {
            0.0
        };

        state
            .analytics
            .upsert_daily_stats(&DailyStatsRow {
                website_id: website.id.clone(),
                date: target_date,
                pageviews: pageview.pageviews,
                unique_visitors: pageview.unique_visitors,
                sessions: session.sessions,
                events: events.get(&website.id).copied().unwrap_or(0),
                avg_session_duration: session.avg_duration_seconds,
                bounce_rate,
            })
            .await?;

        let page_rows: Vec<PageStatsRow> = pages_by_website
            .remove(&website.id)
            .unwrap_or_default()
            .into_iter()
            .map(|p| PageStatsRow {
                website_id: p.website_id,
                date: target_date,
                page_url: p.page_url,
                views: p.views,
                unique_visitors: p.unique_visitors,
                // No client-side duration instrumentation exists yet; these
                // stay 0 rather than getting invented semantics.
                avg_time_on_page: 0.0,
                exit_rate: 0.0,
            })
            .collect();
        state.analytics.upsert_page_stats(&page_rows).await?;

        // All upserts for this website are in; readers may now repopulate.
        if let Err(e) = state
            .query_cache
            .invalidate_website(&website.organization_id, &website.id)
        {
            warn!(
                website_id = %website.id,
                error = %e,
                "query cache invalidation failed; entries expire with their TTL"
            );
        }
    }

    Ok(websites.len())
}

/// Loop: aggregate the prior completed day, once per day. The tick interval
/// only controls how quickly the day boundary is noticed; a restart
/// re-aggregates yesterday, which the idempotent upserts absorb.
pub async fn run_aggregation_loop(state: Arc<AppState>) {
    let tick = Duration::from_secs(state.config.aggregation_tick_seconds.max(1));
    info!(tick_seconds = tick.as_secs(), "Aggregation scheduler started");
    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    let mut last_aggregated: Option<NaiveDate> = None;
    loop {
        interval.tick().await;
        let target = Utc::now().date_naive() - chrono::Duration::days(1);
        if last_aggregated == Some(target) {
            continue;
        }
        match run_daily_aggregation(&state, target).await {
            Ok(count) => {
                last_aggregated = Some(target);
                info!(date = %target, websites = count, "Daily aggregation complete");
            }
            Err(e) => error!(date = %target, error = %e, "Daily aggregation failed"),
        }
    }
}
