use anyhow::Result;
use chrono::{DateTime, Utc};

use beacon_core::client::ClientMeta;

use crate::backend::fmt_ts;
use crate::DuckDbBackend;

/// Create or rewrite the session keyed by `(website_id, session_id)`.
///
/// The UNIQUE index on that pair turns a repeated start into a row rewrite:
/// `started_at` resets, `ended_at` clears, and the client metadata is
/// replaced. Exactly one row exists afterwards no matter how often the
/// client retries.
pub(crate) async fn start_session_inner(
    db: &DuckDbBackend,
    website_id: &str,
    session_id: &str,
    meta: &ClientMeta,
    now: DateTime<Utc>,
) -> Result<()> {
    let conn = db.conn.lock().await;
    let now_str = fmt_ts(now);
    conn.execute(
        r#"INSERT INTO sessions
               (id, website_id, session_id, started_at, ended_at,
                user_agent, ip_address, country, browser, device_type)
           VALUES (?1, ?2, ?3, ?4, NULL, ?5, ?6, ?7, ?8, ?9)
           ON CONFLICT (website_id, session_id) DO UPDATE SET
               started_at  = EXCLUDED.started_at,
               ended_at    = NULL,
               user_agent  = EXCLUDED.user_agent,
               ip_address  = EXCLUDED.ip_address,
               country     = EXCLUDED.country,
               browser     = EXCLUDED.browser,
               device_type = EXCLUDED.device_type"#,
        duckdb::params![
            uuid::Uuid::new_v4().to_string(),
            website_id,
            session_id,
            now_str,
            meta.user_agent,
            meta.ip_address,
            meta.country,
            meta.browser,
            meta.device_type,
        ],
    )?;
    Ok(())
}

/// Set the session's end time. Returns `false` when the session does not
/// exist — ending a session that never started signals a client bug, so
/// this path is not creation-tolerant.
pub(crate) async fn end_session_inner(
    db: &DuckDbBackend,
    website_id: &str,
    session_id: &str,
    now: DateTime<Utc>,
) -> Result<bool> {
    let conn = db.conn.lock().await;
    let updated = conn.execute(
        "UPDATE sessions SET ended_at = ?1 WHERE website_id = ?2 AND session_id = ?3",
        duckdb::params![fmt_ts(now), website_id, session_id],
    )?;
    Ok(updated > 0)
}

/// Look up the session's surrogate id, creating a bare session row when the
/// pair is unknown — a pageview or event arriving before its session-start
/// is tolerated, not rejected. Runs inside the caller's transaction so the
/// session and its first pageview/event commit together.
pub(crate) fn get_or_create_session_tx(
    tx: &duckdb::Transaction<'_>,
    website_id: &str,
    session_id: &str,
    now_str: &str,
) -> Result<String> {
    let existing: Option<String> = tx
        .prepare("SELECT id FROM sessions WHERE website_id = ?1 AND session_id = ?2")?
        .query_row(duckdb::params![website_id, session_id], |row| row.get(0))
        .ok();

    if let Some(id) = existing {
        return Ok(id);
    }

    let id = uuid::Uuid::new_v4().to_string();
    tx.execute(
        "INSERT INTO sessions (id, website_id, session_id, started_at) VALUES (?1, ?2, ?3, ?4) \
         ON CONFLICT (website_id, session_id) DO NOTHING",
        duckdb::params![id, website_id, session_id, now_str],
    )?;

    // Re-read in case the conflict branch fired; the single-writer lock makes
    // this a formality, but it keeps the function correct under any schedule.
    let id: String = tx
        .prepare("SELECT id FROM sessions WHERE website_id = ?1 AND session_id = ?2")?
        .query_row(duckdb::params![website_id, session_id], |row| row.get(0))?;
    Ok(id)
}
