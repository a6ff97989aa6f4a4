use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::backend::fmt_ts;
use crate::DuckDbBackend;

/// Delete one batch of sessions older than `cutoff`, cascading to their
/// page views and events, oldest first.
///
/// Each call is one short transaction over at most `batch_size` sessions, so
/// the writer lock is never held long and ingestion traffic slots in between
/// batches. The batch is re-selected from live data on every call, which
/// makes the reaper safe to interrupt and resume — there is no snapshot to
/// go stale.
///
/// Returns the number of sessions deleted; 0 means nothing is left past the
/// horizon.
pub(crate) async fn delete_expired_sessions_inner(
    db: &DuckDbBackend,
    cutoff: DateTime<Utc>,
    batch_size: usize,
) -> Result<usize> {
    let mut conn = db.conn.lock().await;
    let tx = conn.transaction()?;
    let cutoff_str = fmt_ts(cutoff);

    // The ORDER BY pins the same batch for all three deletes within this
    // transaction; the session rows are untouched until the final statement.
    let batch_sql = "SELECT id FROM sessions WHERE started_at < ?1 \
                     ORDER BY started_at, id LIMIT ?2";

    tx.execute(
        &format!("DELETE FROM page_views WHERE session_id IN ({batch_sql})"),
        duckdb::params![cutoff_str, batch_size as i64],
    )?;
    tx.execute(
        &format!("DELETE FROM events WHERE session_id IN ({batch_sql})"),
        duckdb::params![cutoff_str, batch_size as i64],
    )?;
    let deleted = tx.execute(
        &format!("DELETE FROM sessions WHERE id IN ({batch_sql})"),
        duckdb::params![cutoff_str, batch_size as i64],
    )?;

    tx.commit()?;
    Ok(deleted)
}
