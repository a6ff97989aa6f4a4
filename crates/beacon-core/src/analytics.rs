//! Analytics backend abstraction.

use std::collections::HashMap;

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::client::ClientMeta;
use crate::model::{EventFields, PageviewFields, Website};

/// Scope of a reporting query: always an organization, optionally narrowed
/// to one of its websites. Threaded explicitly through every reporting call
/// — there is no implicit request-scoped tenant state.
#[derive(Debug, Clone)]
pub struct ReportScope {
    pub organization_id: String,
    pub website_id: Option<String>,
}

impl ReportScope {
    pub fn organization(organization_id: impl Into<String>) -> Self {
        Self {
            organization_id: organization_id.into(),
            website_id: None,
        }
    }

    pub fn website(organization_id: impl Into<String>, website_id: impl Into<String>) -> Self {
        Self {
            organization_id: organization_id.into(),
            website_id: Some(website_id.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Aggregation rollups
// ---------------------------------------------------------------------------

/// Per-website pageview rollup for one day, keyed by website id.
#[derive(Debug, Clone, Copy, Default)]
pub struct PageviewRollup {
    pub pageviews: i64,
    /// Distinct sessions with at least one pageview that day.
    pub unique_visitors: i64,
}

/// Per-website session rollup for one day.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionRollup {
    pub sessions: i64,
    /// Mean of `ended_at - started_at` in seconds over sessions that have an
    /// end time; sessions still open at aggregation time are excluded from
    /// the average but counted in `sessions`.
    pub avg_duration_seconds: f64,
}

/// Per-(website, page_url) rollup for one day.
#[derive(Debug, Clone)]
pub struct PageRollup {
    pub website_id: String,
    pub page_url: String,
    pub views: i64,
    pub unique_visitors: i64,
}

/// One `daily_website_stats` row. Upserts replace every metric field —
/// a re-run for the same date overwrites rather than accumulates.
#[derive(Debug, Clone)]
pub struct DailyStatsRow {
    pub website_id: String,
    pub date: NaiveDate,
    pub pageviews: i64,
    pub unique_visitors: i64,
    pub sessions: i64,
    pub events: i64,
    pub avg_session_duration: f64,
    /// Share of sessions with exactly one pageview, 0–100.
    pub bounce_rate: f64,
}

/// One `page_stats` row. `avg_time_on_page` and `exit_rate` stay 0 until
/// client-side duration instrumentation exists.
#[derive(Debug, Clone)]
pub struct PageStatsRow {
    pub website_id: String,
    pub date: NaiveDate,
    pub page_url: String,
    pub views: i64,
    pub unique_visitors: i64,
    pub avg_time_on_page: f64,
    pub exit_rate: f64,
}

// ---------------------------------------------------------------------------
// Reporting results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct OverviewStats {
    pub total_pageviews: i64,
    pub total_visitors: i64,
    pub total_sessions: i64,
    pub total_events: i64,
    pub avg_session_duration: f64,
    pub bounce_rate: f64,
    pub period: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TimeseriesPoint {
    pub date: String,
    pub pageviews: i64,
    pub visitors: i64,
    pub sessions: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopPage {
    pub page_url: String,
    pub views: i64,
    pub unique_visitors: i64,
    pub avg_time_on_page: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct EventSummaryRow {
    pub event_name: String,
    pub count: i64,
    pub unique_users: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PopularPage {
    pub page_url: String,
    pub page_title: Option<String>,
    pub views: i64,
}

/// Live-window stats, recomputed on a short interval rather than cached
/// per-request: the trailing 30 minutes (visitors), since midnight UTC
/// (pageviews/sessions) and the trailing hour (popular pages).
#[derive(Debug, Clone, Serialize)]
pub struct RealtimeSnapshot {
    pub active_visitors: i64,
    pub pageviews_today: i64,
    pub sessions_today: i64,
    pub popular_pages: Vec<PopularPage>,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct WebsiteSummary {
    pub id: String,
    pub name: String,
    pub domain: String,
    pub created_at: String,
}

// ---------------------------------------------------------------------------
// Backend trait
// ---------------------------------------------------------------------------

#[async_trait::async_trait]
pub trait AnalyticsBackend: Send + Sync + 'static {
    // --- tenant ---

    /// Resolve a client-supplied domain to an active website. Inactive
    /// websites resolve to `None` — indistinguishable from missing, by
    /// contract.
    async fn resolve_website(&self, domain: &str) -> Result<Option<Website>>;

    async fn list_websites(&self, organization_id: &str) -> Result<Vec<WebsiteSummary>>;

    // --- ingestion writes ---

    /// Create or rewrite the session keyed by `(website_id, session_id)`.
    /// A repeated start replaces the row: `started_at` reset, `ended_at`
    /// cleared, metadata overwritten.
    async fn start_session(
        &self,
        website_id: &str,
        session_id: &str,
        meta: &ClientMeta,
        now: DateTime<Utc>,
    ) -> Result<()>;

    /// Set the session's end time. Returns `false` when no such session
    /// exists — an end without a start is a client bug worth surfacing, so
    /// this call is not creation-tolerant.
    async fn end_session(
        &self,
        website_id: &str,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool>;

    /// Write a pageview, get-or-creating the session in the same
    /// transaction so a pageview arriving before its session-start is
    /// tolerated rather than rejected.
    async fn record_pageview(
        &self,
        website_id: &str,
        session_id: &str,
        fields: &PageviewFields,
        now: DateTime<Utc>,
    ) -> Result<()>;

    /// Write a custom event; same session semantics as `record_pageview`.
    async fn record_event(
        &self,
        website_id: &str,
        session_id: &str,
        fields: &EventFields,
        now: DateTime<Utc>,
    ) -> Result<()>;

    // --- aggregation ---

    async fn list_active_websites(&self) -> Result<Vec<Website>>;

    /// Pageview totals and distinct-session counts for every website on
    /// `date`, in one grouped query.
    async fn pageview_rollups(&self, date: NaiveDate) -> Result<HashMap<String, PageviewRollup>>;

    /// Session totals and average completed-session duration per website.
    async fn session_rollups(&self, date: NaiveDate) -> Result<HashMap<String, SessionRollup>>;

    /// Count of bounced sessions (exactly one pageview) per website.
    async fn bounce_rollups(&self, date: NaiveDate) -> Result<HashMap<String, i64>>;

    /// Custom-event totals per website.
    async fn event_rollups(&self, date: NaiveDate) -> Result<HashMap<String, i64>>;

    /// Per-(website, page_url) view and distinct-session counts.
    async fn page_rollups(&self, date: NaiveDate) -> Result<Vec<PageRollup>>;

    async fn upsert_daily_stats(&self, row: &DailyStatsRow) -> Result<()>;

    async fn upsert_page_stats(&self, rows: &[PageStatsRow]) -> Result<()>;

    // --- retention ---

    /// Delete up to `batch_size` sessions started before `cutoff`, cascading
    /// to their pageviews and events, in one transaction. Returns the number
    /// of sessions deleted; 0 means the horizon is clear.
    async fn delete_expired_sessions(
        &self,
        cutoff: DateTime<Utc>,
        batch_size: usize,
    ) -> Result<usize>;

    // --- reporting ---

    async fn overview(
        &self,
        scope: &ReportScope,
        days: u32,
        now: DateTime<Utc>,
    ) -> Result<OverviewStats>;

    async fn timeseries(
        &self,
        scope: &ReportScope,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<TimeseriesPoint>>;

    async fn top_pages(
        &self,
        scope: &ReportScope,
        start_date: NaiveDate,
        end_date: NaiveDate,
        limit: u32,
    ) -> Result<Vec<TopPage>>;

    async fn event_summary(
        &self,
        scope: &ReportScope,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<EventSummaryRow>>;

    async fn realtime(&self, scope: &ReportScope, now: DateTime<Utc>) -> Result<RealtimeSnapshot>;
}
