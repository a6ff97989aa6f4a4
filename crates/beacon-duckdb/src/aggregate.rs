//! Set-based daily rollup queries and idempotent stats upserts.
//!
//! Every rollup runs as a single grouped query across all websites — the
//! aggregation engine never issues O(websites) round-trips. Upserts replace
//! the full metric set for their conflict key, so re-running a day
//! overwrites rather than accumulates.

use std::collections::HashMap;

use anyhow::Result;
use chrono::NaiveDate;

use beacon_core::analytics::{
    DailyStatsRow, PageRollup, PageStatsRow, PageviewRollup, SessionRollup,
};

use crate::backend::day_bounds;
use crate::DuckDbBackend;

/// Pageview totals and distinct-session counts per website for one day.
pub(crate) async fn pageview_rollups_inner(
    db: &DuckDbBackend,
    date: NaiveDate,
) -> Result<HashMap<String, PageviewRollup>> {
    let conn = db.conn.lock().await;
    let (start, end) = day_bounds(date);

    let mut stmt = conn.prepare(
        "SELECT website_id, COUNT(*), COUNT(DISTINCT session_id) \
         FROM page_views \
         WHERE timestamp >= ?1 AND timestamp < ?2 \
         GROUP BY website_id",
    )?;
    let rows = stmt.query_map(duckdb::params![start, end], |row| {
        Ok((
            row.get::<_, String>(0)?,
            PageviewRollup {
                pageviews: row.get(1)?,
                unique_visitors: row.get(2)?,
            },
        ))
    })?;

    let mut rollups = HashMap::new();
    for row in rows {
        let (website_id, rollup) = row?;
        rollups.insert(website_id, rollup);
    }
    Ok(rollups)
}

/// Session totals and average completed-session duration per website.
///
/// The CASE inside AVG keeps open sessions (no `ended_at`) out of the
/// duration average while COUNT(*) still includes them in the session total
/// — the asymmetry is intentional and must not be "fixed", since changing it
/// would invisibly shift aggregate output for existing consumers.
pub(crate) async fn session_rollups_inner(
    db: &DuckDbBackend,
    date: NaiveDate,
) -> Result<HashMap<String, SessionRollup>> {
    let conn = db.conn.lock().await;
    let (start, end) = day_bounds(date);

    let mut stmt = conn.prepare(
        "SELECT website_id, COUNT(*), \
                COALESCE(AVG(CASE WHEN ended_at IS NOT NULL \
                                  THEN EPOCH(ended_at - started_at) END), 0) \
         FROM sessions \
         WHERE started_at >= ?1 AND started_at < ?2 \
         GROUP BY website_id",
    )?;
    let rows = stmt.query_map(duckdb::params![start, end], |row| {
        Ok((
            row.get::<_, String>(0)?,
            SessionRollup {
                sessions: row.get(1)?,
                avg_duration_seconds: row.get(2)?,
            },
        ))
    })?;

    let mut rollups = HashMap::new();
    for row in rows {
        let (website_id, rollup) = row?;
        rollups.insert(website_id, rollup);
    }
    Ok(rollups)
}

/// Bounced sessions (exactly one pageview) per website, for sessions started
/// on `date`. A session's full pageview history counts, not just that day's
/// rows. Bounce queries must use a CTE — correlated subqueries do not work
/// in DuckDB.
pub(crate) async fn bounce_rollups_inner(
    db: &DuckDbBackend,
    date: NaiveDate,
) -> Result<HashMap<String, i64>> {
    let conn = db.conn.lock().await;
    let (start, end) = day_bounds(date);

    let mut stmt = conn.prepare(
        r#"WITH session_pageviews AS (
               SELECT s.website_id, s.id, COUNT(p.id) AS pageview_count
               FROM sessions s
               LEFT JOIN page_views p ON p.session_id = s.id
               WHERE s.started_at >= ?1 AND s.started_at < ?2
               GROUP BY s.website_id, s.id
           )
           SELECT website_id,
                  CAST(COALESCE(SUM(CASE WHEN pageview_count = 1 THEN 1 ELSE 0 END), 0) AS BIGINT)
           FROM session_pageviews
           GROUP BY website_id"#,
    )?;
    let rows = stmt.query_map(duckdb::params![start, end], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
    })?;

    let mut rollups = HashMap::new();
    for row in rows {
        let (website_id, bounced) = row?;
        rollups.insert(website_id, bounced);
    }
    Ok(rollups)
}

/// Custom-event totals per website.
pub(crate) async fn event_rollups_inner(
    db: &DuckDbBackend,
    date: NaiveDate,
) -> Result<HashMap<String, i64>> {
    let conn = db.conn.lock().await;
    let (start, end) = day_bounds(date);

    let mut stmt = conn.prepare(
        "SELECT website_id, COUNT(*) FROM events \
         WHERE timestamp >= ?1 AND timestamp < ?2 \
         GROUP BY website_id",
    )?;
    let rows = stmt.query_map(duckdb::params![start, end], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
    })?;

    let mut rollups = HashMap::new();
    for row in rows {
        let (website_id, count) = row?;
        rollups.insert(website_id, count);
    }
    Ok(rollups)
}

/// Per-(website, page_url) view and distinct-session counts.
pub(crate) async fn page_rollups_inner(
    db: &DuckDbBackend,
    date: NaiveDate,
) -> Result<Vec<PageRollup>> {
    let conn = db.conn.lock().await;
    let (start, end) = day_bounds(date);

    let mut stmt = conn.prepare(
        "SELECT website_id, page_url, COUNT(*), COUNT(DISTINCT session_id) \
         FROM page_views \
         WHERE timestamp >= ?1 AND timestamp < ?2 \
         GROUP BY website_id, page_url",
    )?;
    let rows = stmt.query_map(duckdb::params![start, end], |row| {
        Ok(PageRollup {
            website_id: row.get(0)?,
            page_url: row.get(1)?,
            views: row.get(2)?,
            unique_visitors: row.get(3)?,
        })
    })?;

    let mut rollups = Vec::new();
    for row in rows {
        rollups.push(row?);
    }
    Ok(rollups)
}

/// Upsert one daily stats row, replacing every metric field atomically.
pub(crate) async fn upsert_daily_stats_inner(
    db: &DuckDbBackend,
    row: &DailyStatsRow,
) -> Result<()> {
    let conn = db.conn.lock().await;
    conn.execute(
        r#"INSERT INTO daily_website_stats
               (website_id, date, pageviews, unique_visitors, sessions, events,
                avg_session_duration, bounce_rate)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
           ON CONFLICT (website_id, date) DO UPDATE SET
               pageviews            = EXCLUDED.pageviews,
               unique_visitors      = EXCLUDED.unique_visitors,
               sessions             = EXCLUDED.sessions,
               events               = EXCLUDED.events,
               avg_session_duration = EXCLUDED.avg_session_duration,
               bounce_rate          = EXCLUDED.bounce_rate"#,
        duckdb::params![
            row.website_id,
            row.date.format("%Y-%m-%d").to_string(),
            row.pageviews,
            row.unique_visitors,
            row.sessions,
            row.events,
            row.avg_session_duration,
            row.bounce_rate,
        ],
    )?;
    Ok(())
}

/// Upsert a website's page stats rows in one transaction.
pub(crate) async fn upsert_page_stats_inner(
    db: &DuckDbBackend,
    rows: &[PageStatsRow],
) -> Result<()> {
    if rows.is_empty() {
        return Ok(());
    }

    let mut conn = db.conn.lock().await;
    let tx = conn.transaction()?;
    for row in rows {
        tx.execute(
            r#"INSERT INTO page_stats
                   (website_id, page_url, date, views, unique_visitors,
                    avg_time_on_page, exit_rate)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
               ON CONFLICT (website_id, page_url, date) DO UPDATE SET
                   views            = EXCLUDED.views,
                   unique_visitors  = EXCLUDED.unique_visitors,
                   avg_time_on_page = EXCLUDED.avg_time_on_page,
                   exit_rate        = EXCLUDED.exit_rate"#,
            duckdb::params![
                row.website_id,
                row.page_url,
                row.date.format("%Y-%m-%d").to_string(),
                row.views,
                row.unique_visitors,
                row.avg_time_on_page,
                row.exit_rate,
            ],
        )?;
    }
    tx.commit()?;
    Ok(())
}
