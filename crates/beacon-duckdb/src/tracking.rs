use anyhow::Result;
use chrono::{DateTime, Utc};

use beacon_core::model::{EventFields, PageviewFields};

use crate::backend::fmt_ts;
use crate::session::get_or_create_session_tx;
use crate::DuckDbBackend;

/// Write one pageview row, get-or-creating its session in the same
/// transaction. The timestamp is the server clock passed by the caller —
/// client timestamps are never stored.
pub(crate) async fn record_pageview_inner(
    db: &DuckDbBackend,
    website_id: &str,
    session_id: &str,
    fields: &PageviewFields,
    now: DateTime<Utc>,
) -> Result<()> {
    let mut conn = db.conn.lock().await;
    let tx = conn.transaction()?;
    let now_str = fmt_ts(now);

    let session_pk = get_or_create_session_tx(&tx, website_id, session_id, &now_str)?;
    tx.execute(
        r#"INSERT INTO page_views
               (id, website_id, session_id, page_url, page_title, referrer,
                load_time, user_agent, ip_address, timestamp)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"#,
        duckdb::params![
            uuid::Uuid::new_v4().to_string(),
            website_id,
            session_pk,
            fields.page_url,
            fields.page_title,
            fields.referrer,
            fields.load_time,
            fields.user_agent,
            fields.ip_address,
            now_str,
        ],
    )?;

    tx.commit()?;
    Ok(())
}

/// Write one custom-event row; same session semantics as
/// [`record_pageview_inner`]. `event_data` arrives pre-serialized.
pub(crate) async fn record_event_inner(
    db: &DuckDbBackend,
    website_id: &str,
    session_id: &str,
    fields: &EventFields,
    now: DateTime<Utc>,
) -> Result<()> {
    let mut conn = db.conn.lock().await;
    let tx = conn.transaction()?;
    let now_str = fmt_ts(now);

    let session_pk = get_or_create_session_tx(&tx, website_id, session_id, &now_str)?;
    tx.execute(
        r#"INSERT INTO events
               (id, website_id, session_id, event_name, event_data, page_url, timestamp)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
        duckdb::params![
            uuid::Uuid::new_v4().to_string(),
            website_id,
            session_pk,
            fields.event_name,
            fields.event_data,
            fields.page_url,
            now_str,
        ],
    )?;

    tx.commit()?;
    Ok(())
}
