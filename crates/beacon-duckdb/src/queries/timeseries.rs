use std::collections::HashMap;

use anyhow::Result;
use chrono::NaiveDate;

use beacon_core::analytics::{ReportScope, TimeseriesPoint};

use crate::queries::{param_refs, scope_predicate};
use crate::DuckDbBackend;

/// Daily pageviews/visitors/sessions from the precomputed rollups,
/// zero-filled so every date in the window appears exactly once.
pub(crate) async fn timeseries_inner(
    db: &DuckDbBackend,
    scope: &ReportScope,
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> Result<Vec<TimeseriesPoint>> {
    let conn = db.conn.lock().await;

    let mut params: Vec<Box<dyn duckdb::types::ToSql>> = Vec::new();
    let mut idx = 1;
    let scope_sql = scope_predicate(scope, "website_id", &mut params, &mut idx);
    let sql = format!(
        "SELECT CAST(date AS VARCHAR), \
                CAST(SUM(pageviews) AS BIGINT), \
                CAST(SUM(unique_visitors) AS BIGINT), \
                CAST(SUM(sessions) AS BIGINT) \
         FROM daily_website_stats \
         WHERE {scope_sql} AND date >= ?{idx} AND date <= ?{} \
         GROUP BY date \
         ORDER BY date",
        idx + 1
    );
    params.push(Box::new(start_date.format("%Y-%m-%d").to_string()));
    params.push(Box::new(end_date.format("%Y-%m-%d").to_string()));

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(param_refs(&params).as_slice(), |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, i64>(1)?,
            row.get::<_, i64>(2)?,
            row.get::<_, i64>(3)?,
        ))
    })?;

    let mut by_date: HashMap<String, (i64, i64, i64)> = HashMap::new();
    for row in rows {
        let (date, pageviews, visitors, sessions) = row?;
        by_date.insert(date, (pageviews, visitors, sessions));
    }

    // Zero-fill: a dashboard chart needs a point per day, not gaps.
    let mut series = Vec::new();
    let mut current = start_date;
    while current <= end_date {
        let key = current.format("%Y-%m-%d").to_string();
        let (pageviews, visitors, sessions) = by_date.get(&key).copied().unwrap_or_default();
        series.push(TimeseriesPoint {
            date: key,
            pageviews,
            visitors,
            sessions,
        });
        current += chrono::Duration::days(1);
    }

    Ok(series)
}
