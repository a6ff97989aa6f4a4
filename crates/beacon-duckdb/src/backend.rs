use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use duckdb::Connection;
use tokio::sync::Mutex;
use tracing::info;

use crate::schema::init_sql;

/// A DuckDB backend for beacon.
///
/// DuckDB is single-writer: concurrent reads are fine, but concurrent writes
/// cause contention. We wrap the connection in `Arc<Mutex<_>>` so the async
/// runtime serialises all access while the struct stays cheap to clone and
/// share across Axum handlers and the background jobs.
///
/// Memory and thread limits are enforced by [`init_sql`] at open time; the
/// memory limit comes from `BEACON_DUCKDB_MEMORY` (default `"1GB"`).
pub struct DuckDbBackend {
    pub(crate) conn: Arc<Mutex<Connection>>,
}

/// Timestamp format used for every TIMESTAMP parameter. DuckDB casts the
/// string implicitly on comparison and insert.
pub(crate) fn fmt_ts(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S%.f").to_string()
}

/// Half-open day window `[date, date+1)` as SQL-comparable strings.
pub(crate) fn day_bounds(date: NaiveDate) -> (String, String) {
    let start = date.format("%Y-%m-%d").to_string();
    let end = (date + chrono::Duration::days(1))
        .format("%Y-%m-%d")
        .to_string();
    (start, end)
}

impl DuckDbBackend {
    /// Open (or create) a DuckDB database file at `path`.
    ///
    /// Runs the schema init SQL on the connection so all tables and indexes
    /// are created if they do not already exist.
    pub fn open(path: &str, memory_limit: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(&init_sql(memory_limit))?;
        info!(path, memory_limit, "DuckDB opened");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an **in-memory** DuckDB database.
    ///
    /// Intended for tests only — data is discarded when the struct is
    /// dropped.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(&init_sql("1GB"))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Execute `SELECT 1` as a lightweight liveness check.
    ///
    /// Called by the `/health` endpoint. Returns an error if the connection
    /// is unavailable (file locked, disk full, etc.).
    pub async fn ping(&self) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute_batch("SELECT 1")?;
        Ok(())
    }

    /// Insert or update a website row.
    ///
    /// Tenant management owns website rows in production; this exists for
    /// test fixtures and out-of-band provisioning. `ON CONFLICT` makes it
    /// safe to call repeatedly with the same `id`.
    pub async fn seed_website(
        &self,
        id: &str,
        organization_id: &str,
        domain: &str,
    ) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            r#"INSERT INTO websites (id, organization_id, name, domain, is_active, created_at)
               VALUES (?1, ?2, ?3, ?4, TRUE, CURRENT_TIMESTAMP)
               ON CONFLICT (id) DO UPDATE SET
                   organization_id = EXCLUDED.organization_id,
                   domain = EXCLUDED.domain,
                   is_active = TRUE"#,
            duckdb::params![id, organization_id, domain, domain],
        )?;
        Ok(())
    }

    /// Flip a website's active flag. The tenant resolver treats inactive
    /// websites as missing.
    pub async fn set_website_active(&self, id: &str, is_active: bool) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "UPDATE websites SET is_active = ?1 WHERE id = ?2",
            duckdb::params![is_active, id],
        )?;
        Ok(())
    }

    /// Acquire the DuckDB connection lock for direct queries.
    ///
    /// Intended for integration tests that need to verify stored data.
    /// Production code should use the typed methods.
    pub async fn conn_for_test(&self) -> tokio::sync::MutexGuard<'_, Connection> {
        self.conn.lock().await
    }
}
