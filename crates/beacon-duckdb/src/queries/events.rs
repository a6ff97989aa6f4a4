use anyhow::Result;
use chrono::NaiveDate;

use beacon_core::analytics::{EventSummaryRow, ReportScope};

use crate::queries::{param_refs, scope_predicate};
use crate::DuckDbBackend;

/// Per-event-name totals and distinct-session user counts over raw rows.
/// Events have no precomputed rollup table beyond the daily total, so this
/// reads the events table directly.
pub(crate) async fn event_summary_inner(
    db: &DuckDbBackend,
    scope: &ReportScope,
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> Result<Vec<EventSummaryRow>> {
    let conn = db.conn.lock().await;

    let mut params: Vec<Box<dyn duckdb::types::ToSql>> = Vec::new();
    let mut idx = 1;
    let scope_sql = scope_predicate(scope, "website_id", &mut params, &mut idx);
    let sql = format!(
        "SELECT event_name, COUNT(*) AS count, COUNT(DISTINCT session_id) \
         FROM events \
         WHERE {scope_sql} AND timestamp >= ?{idx} AND timestamp < ?{} \
         GROUP BY event_name \
         ORDER BY count DESC, event_name",
        idx + 1
    );
    params.push(Box::new(start_date.format("%Y-%m-%d").to_string()));
    params.push(Box::new(
        (end_date + chrono::Duration::days(1))
            .format("%Y-%m-%d")
            .to_string(),
    ));

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(param_refs(&params).as_slice(), |row| {
        Ok(EventSummaryRow {
            event_name: row.get(0)?,
            count: row.get(1)?,
            unique_users: row.get(2)?,
        })
    })?;

    let mut summary = Vec::new();
    for row in rows {
        summary.push(row?);
    }
    Ok(summary)
}
