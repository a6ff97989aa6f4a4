use anyhow::Result;

use beacon_core::analytics::WebsiteSummary;
use beacon_core::model::Website;

use crate::DuckDbBackend;

const WEBSITE_COLUMNS: &str =
    "id, organization_id, name, domain, is_active, CAST(created_at AS VARCHAR)";

fn map_website(row: &duckdb::Row<'_>) -> duckdb::Result<Website> {
    Ok(Website {
        id: row.get(0)?,
        organization_id: row.get(1)?,
        name: row.get(2)?,
        domain: row.get(3)?,
        is_active: row.get(4)?,
        created_at: row.get(5)?,
    })
}

/// Tenant resolution: client-supplied domain → active website.
///
/// An inactive website is deliberately indistinguishable from a missing one;
/// the caller turns `None` into a rejected ingestion, never a crash, because
/// arbitrary internet clients routinely send stale or malformed domains.
pub(crate) async fn resolve_website_inner(
    db: &DuckDbBackend,
    domain: &str,
) -> Result<Option<Website>> {
    let conn = db.conn.lock().await;
    let website = conn
        .prepare(&format!(
            "SELECT {WEBSITE_COLUMNS} FROM websites WHERE domain = ?1 AND is_active"
        ))?
        .query_row(duckdb::params![domain], map_website)
        .ok();
    Ok(website)
}

pub(crate) async fn list_websites_inner(
    db: &DuckDbBackend,
    organization_id: &str,
) -> Result<Vec<WebsiteSummary>> {
    let conn = db.conn.lock().await;
    let mut stmt = conn.prepare(
        "SELECT id, name, domain, CAST(created_at AS VARCHAR) FROM websites \
         WHERE organization_id = ?1 AND is_active \
         ORDER BY created_at",
    )?;
    let rows = stmt.query_map(duckdb::params![organization_id], |row| {
        Ok(WebsiteSummary {
            id: row.get(0)?,
            name: row.get(1)?,
            domain: row.get(2)?,
            created_at: row.get(3)?,
        })
    })?;

    let mut websites = Vec::new();
    for row in rows {
        websites.push(row?);
    }
    Ok(websites)
}

/// All active websites, across every organization — the aggregation engine
/// and the realtime refresh job fetch this set once per run.
pub(crate) async fn list_active_websites_inner(db: &DuckDbBackend) -> Result<Vec<Website>> {
    let conn = db.conn.lock().await;
    let mut stmt = conn.prepare(&format!(
        "SELECT {WEBSITE_COLUMNS} FROM websites WHERE is_active ORDER BY id"
    ))?;
    let rows = stmt.query_map([], map_website)?;

    let mut websites = Vec::new();
    for row in rows {
        websites.push(row?);
    }
    Ok(websites)
}
