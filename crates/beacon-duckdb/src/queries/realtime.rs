use anyhow::Result;
use chrono::{DateTime, Utc};

use beacon_core::analytics::{PopularPage, RealtimeSnapshot, ReportScope};

use crate::backend::fmt_ts;
use crate::queries::{param_refs, scope_predicate};
use crate::DuckDbBackend;

pub(crate) struct LiveCounts {
    pub active_visitors: i64,
    pub pageviews_today: i64,
    pub sessions_today: i64,
}

fn scoped_count(
    conn: &duckdb::Connection,
    scope: &ReportScope,
    table: &str,
    time_column: &str,
    since: &str,
) -> Result<i64> {
    let mut params: Vec<Box<dyn duckdb::types::ToSql>> = Vec::new();
    let mut idx = 1;
    let scope_sql = scope_predicate(scope, "website_id", &mut params, &mut idx);
    let sql = format!("SELECT COUNT(*) FROM {table} WHERE {scope_sql} AND {time_column} >= ?{idx}");
    params.push(Box::new(since.to_string()));

    let count: i64 = conn
        .prepare(&sql)?
        .query_row(param_refs(&params).as_slice(), |row| row.get(0))?;
    Ok(count)
}

/// The live-window counters: sessions started in the trailing 30 minutes,
/// and pageviews/sessions since midnight UTC. Shared by the realtime report
/// and the overview's today-adjustment. Three small counting queries, all
/// served by the (website_id, timestamp) indexes.
pub(crate) fn live_counts(
    conn: &duckdb::Connection,
    scope: &ReportScope,
    now: DateTime<Utc>,
) -> Result<LiveCounts> {
    let cutoff = fmt_ts(now - chrono::Duration::minutes(30));
    let midnight = now.date_naive().format("%Y-%m-%d").to_string();

    Ok(LiveCounts {
        active_visitors: scoped_count(conn, scope, "sessions", "started_at", &cutoff)?,
        pageviews_today: scoped_count(conn, scope, "page_views", "timestamp", &midnight)?,
        sessions_today: scoped_count(conn, scope, "sessions", "started_at", &midnight)?,
    })
}

/// Live snapshot: 30-minute active visitors, since-midnight totals and the
/// last hour's popular pages. Computed fresh on every call — the refresh job
/// decides how often that happens.
pub(crate) async fn realtime_inner(
    db: &DuckDbBackend,
    scope: &ReportScope,
    now: DateTime<Utc>,
) -> Result<RealtimeSnapshot> {
    let conn = db.conn.lock().await;
    let live = live_counts(&conn, scope, now)?;

    let hour_ago = fmt_ts(now - chrono::Duration::hours(1));
    let mut params: Vec<Box<dyn duckdb::types::ToSql>> = Vec::new();
    let mut idx = 1;
    let scope_sql = scope_predicate(scope, "website_id", &mut params, &mut idx);
    let sql = format!(
        "SELECT page_url, page_title, COUNT(*) AS views \
         FROM page_views \
         WHERE {scope_sql} AND timestamp >= ?{idx} \
         GROUP BY page_url, page_title \
         ORDER BY views DESC, page_url \
         LIMIT 5"
    );
    params.push(Box::new(hour_ago));

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(param_refs(&params).as_slice(), |row| {
        Ok(PopularPage {
            page_url: row.get(0)?,
            page_title: row.get(1)?,
            views: row.get(2)?,
        })
    })?;

    let mut popular_pages = Vec::new();
    for row in rows {
        popular_pages.push(row?);
    }

    Ok(RealtimeSnapshot {
        active_visitors: live.active_visitors,
        pageviews_today: live.pageviews_today,
        sessions_today: live.sessions_today,
        popular_pages,
        updated_at: now.to_rfc3339(),
    })
}
