use anyhow::Result;
use chrono::NaiveDate;

use beacon_core::analytics::{ReportScope, TopPage};

use crate::queries::{param_refs, scope_predicate};
use crate::DuckDbBackend;

/// Top pages by summed views from the per-URL rollups.
pub(crate) async fn top_pages_inner(
    db: &DuckDbBackend,
    scope: &ReportScope,
    start_date: NaiveDate,
    end_date: NaiveDate,
    limit: u32,
) -> Result<Vec<TopPage>> {
    let conn = db.conn.lock().await;

    let mut params: Vec<Box<dyn duckdb::types::ToSql>> = Vec::new();
    let mut idx = 1;
    let scope_sql = scope_predicate(scope, "website_id", &mut params, &mut idx);
    let sql = format!(
        "SELECT page_url, \
                CAST(SUM(views) AS BIGINT) AS views, \
                CAST(SUM(unique_visitors) AS BIGINT), \
                COALESCE(AVG(avg_time_on_page), 0) \
         FROM page_stats \
         WHERE {scope_sql} AND date >= ?{idx} AND date <= ?{} \
         GROUP BY page_url \
         ORDER BY views DESC, page_url \
         LIMIT ?{}",
        idx + 1,
        idx + 2
    );
    params.push(Box::new(start_date.format("%Y-%m-%d").to_string()));
    params.push(Box::new(end_date.format("%Y-%m-%d").to_string()));
    params.push(Box::new(limit as i64));

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(param_refs(&params).as_slice(), |row| {
        Ok(TopPage {
            page_url: row.get(0)?,
            views: row.get(1)?,
            unique_visitors: row.get(2)?,
            avg_time_on_page: row.get(3)?,
        })
    })?;

    let mut pages = Vec::new();
    for row in rows {
        pages.push(row?);
    }
    Ok(pages)
}
