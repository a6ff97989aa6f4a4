use anyhow::Result;
use chrono::{DateTime, Utc};

use beacon_core::analytics::{OverviewStats, ReportScope};

use crate::queries::realtime::live_counts;
use crate::queries::{param_refs, scope_predicate};
use crate::DuckDbBackend;

struct HistoricalSums {
    pageviews: i64,
    unique_visitors: i64,
    sessions: i64,
    avg_session_duration: f64,
    bounce_rate: f64,
}

/// Aggregated overview for an organization (optionally one website).
///
/// Historical numbers come from the precomputed daily rollups over
/// `[today-(days-1), today]`; today's partial data is not aggregated yet, so
/// the live window (pageviews/sessions since midnight, 30-minute active
/// visitors) is added on top. Event totals are counted from raw rows since
/// the live window would otherwise double-count them.
pub(crate) async fn overview_inner(
    db: &DuckDbBackend,
    scope: &ReportScope,
    days: u32,
    now: DateTime<Utc>,
) -> Result<OverviewStats> {
    let conn = db.conn.lock().await;
    let end_date = now.date_naive();
    let start_date = end_date - chrono::Duration::days(days as i64 - 1);
    let start_str = start_date.format("%Y-%m-%d").to_string();
    let end_str = end_date.format("%Y-%m-%d").to_string();

    // Historical sums from the daily rollups. SUM over BIGINT widens to
    // HUGEINT in DuckDB, so cast back down for the row mapper.
    let mut params: Vec<Box<dyn duckdb::types::ToSql>> = Vec::new();
    let mut idx = 1;
    let scope_sql = scope_predicate(scope, "website_id", &mut params, &mut idx);
    let sql = format!(
        "SELECT CAST(COALESCE(SUM(pageviews), 0) AS BIGINT), \
                CAST(COALESCE(SUM(unique_visitors), 0) AS BIGINT), \
                CAST(COALESCE(SUM(sessions), 0) AS BIGINT), \
                COALESCE(AVG(avg_session_duration), 0), \
                COALESCE(AVG(bounce_rate), 0) \
         FROM daily_website_stats \
         WHERE {scope_sql} AND date >= ?{idx} AND date <= ?{}",
        idx + 1
    );
    params.push(Box::new(start_str));
    params.push(Box::new(end_str));

    let sums = conn
        .prepare(&sql)?
        .query_row(param_refs(&params).as_slice(), |row| {
            Ok(HistoricalSums {
                pageviews: row.get(0)?,
                unique_visitors: row.get(1)?,
                sessions: row.get(2)?,
                avg_session_duration: row.get(3)?,
                bounce_rate: row.get(4)?,
            })
        })?;

    // Event totals over the same window, from raw rows.
    let mut params: Vec<Box<dyn duckdb::types::ToSql>> = Vec::new();
    let mut idx = 1;
    let scope_sql = scope_predicate(scope, "website_id", &mut params, &mut idx);
    let sql = format!(
        "SELECT COUNT(*) FROM events \
         WHERE {scope_sql} AND timestamp >= ?{idx} AND timestamp < ?{}",
        idx + 1
    );
    params.push(Box::new(start_date.format("%Y-%m-%d").to_string()));
    params.push(Box::new(
        (end_date + chrono::Duration::days(1))
            .format("%Y-%m-%d")
            .to_string(),
    ));
    let total_events: i64 = conn
        .prepare(&sql)?
        .query_row(param_refs(&params).as_slice(), |row| row.get(0))?;

    let live = live_counts(&conn, scope, now)?;

    Ok(OverviewStats {
        total_pageviews: sums.pageviews + live.pageviews_today,
        total_visitors: sums.unique_visitors + live.active_visitors,
        total_sessions: sums.sessions + live.sessions_today,
        total_events,
        avg_session_duration: sums.avg_session_duration,
        bounce_rate: sums.bounce_rate,
        period: format!("{start_date} to {end_date}"),
    })
}
