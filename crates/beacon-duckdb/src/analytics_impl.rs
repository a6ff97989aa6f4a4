//! [`AnalyticsBackend`] implementation for [`DuckDbBackend`].
//!
//! Pure delegation — the query logic lives in the per-concern modules so it
//! can be exercised directly, and the trait stays a thin seam the server
//! can hold as `Arc<dyn AnalyticsBackend>`.

use std::collections::HashMap;

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};

use beacon_core::analytics::{
    AnalyticsBackend, DailyStatsRow, EventSummaryRow, OverviewStats, PageRollup, PageStatsRow,
    PageviewRollup, RealtimeSnapshot, ReportScope, SessionRollup, TimeseriesPoint, TopPage,
    WebsiteSummary,
};
use beacon_core::client::ClientMeta;
use beacon_core::model::{EventFields, PageviewFields, Website};

use crate::{aggregate, queries, retention, session, tracking, website, DuckDbBackend};

#[async_trait::async_trait]
impl AnalyticsBackend for DuckDbBackend {
    async fn resolve_website(&self, domain: &str) -> Result<Option<Website>> {
        website::resolve_website_inner(self, domain).await
    }

    async fn list_websites(&self, organization_id: &str) -> Result<Vec<WebsiteSummary>> {
        website::list_websites_inner(self, organization_id).await
    }

    async fn start_session(
        &self,
        website_id: &str,
        session_id: &str,
        meta: &ClientMeta,
        now: DateTime<Utc>,
    ) -> Result<()> {
        session::start_session_inner(self, website_id, session_id, meta, now).await
    }

    async fn end_session(
        &self,
        website_id: &str,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        session::end_session_inner(self, website_id, session_id, now).await
    }

    async fn record_pageview(
        &self,
        website_id: &str,
        session_id: &str,
        fields: &PageviewFields,
        now: DateTime<Utc>,
    ) -> Result<()> {
        tracking::record_pageview_inner(self, website_id, session_id, fields, now).await
    }

    async fn record_event(
        &self,
        website_id: &str,
        session_id: &str,
        fields: &EventFields,
        now: DateTime<Utc>,
    ) -> Result<()> {
        tracking::record_event_inner(self, website_id, session_id, fields, now).await
    }

    async fn list_active_websites(&self) -> Result<Vec<Website>> {
        website::list_active_websites_inner(self).await
    }

    async fn pageview_rollups(&self, date: NaiveDate) -> Result<HashMap<String, PageviewRollup>> {
        aggregate::pageview_rollups_inner(self, date).await
    }

    async fn session_rollups(&self, date: NaiveDate) -> Result<HashMap<String, SessionRollup>> {
        aggregate::session_rollups_inner(self, date).await
    }

    async fn bounce_rollups(&self, date: NaiveDate) -> Result<HashMap<String, i64>> {
        aggregate::bounce_rollups_inner(self, date).await
    }

    async fn event_rollups(&self, date: NaiveDate) -> Result<HashMap<String, i64>> {
        aggregate::event_rollups_inner(self, date).await
    }

    async fn page_rollups(&self, date: NaiveDate) -> Result<Vec<PageRollup>> {
        aggregate::page_rollups_inner(self, date).await
    }

    async fn upsert_daily_stats(&self, row: &DailyStatsRow) -> Result<()> {
        aggregate::upsert_daily_stats_inner(self, row).await
    }

    async fn upsert_page_stats(&self, rows: &[PageStatsRow]) -> Result<()> {
        aggregate::upsert_page_stats_inner(self, rows).await
    }

    async fn delete_expired_sessions(
        &self,
        cutoff: DateTime<Utc>,
        batch_size: usize,
    ) -> Result<usize> {
        retention::delete_expired_sessions_inner(self, cutoff, batch_size).await
    }

    async fn overview(
        &self,
        scope: &ReportScope,
        days: u32,
        now: DateTime<Utc>,
    ) -> Result<OverviewStats> {
        queries::overview::overview_inner(self, scope, days, now).await
    }

    async fn timeseries(
        &self,
        scope: &ReportScope,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<TimeseriesPoint>> {
        queries::timeseries::timeseries_inner(self, scope, start_date, end_date).await
    }

    async fn top_pages(
        &self,
        scope: &ReportScope,
        start_date: NaiveDate,
        end_date: NaiveDate,
        limit: u32,
    ) -> Result<Vec<TopPage>> {
        queries::top_pages::top_pages_inner(self, scope, start_date, end_date, limit).await
    }

    async fn event_summary(
        &self,
        scope: &ReportScope,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<EventSummaryRow>> {
        queries::events::event_summary_inner(self, scope, start_date, end_date).await
    }

    async fn realtime(&self, scope: &ReportScope, now: DateTime<Utc>) -> Result<RealtimeSnapshot> {
        queries::realtime::realtime_inner(self, scope, now).await
    }
}
