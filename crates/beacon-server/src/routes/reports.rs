//! Reporting HTTP surface.
//!
//! Identity and authorization live in an external gateway; the caller's
//! already-resolved organization arrives in the `X-Organization-Id` header
//! and is threaded through every query as an explicit [`ReportScope`].
//! Requests without the header are refused — there is no implicit tenant.
//!
//! Overview, timeseries and top-pages read through the query cache with a
//! minutes-scale TTL. Realtime snapshots come from the refresh job's cache
//! entries when present. A cache hiccup is never a request failure; the
//! handlers fall back to the store.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;

use beacon_core::analytics::{AnalyticsBackend, ReportScope};
use beacon_core::cache_key::{realtime_key, report_key, ReportKind};

use crate::{error::AppError, state::AppState};

const DEFAULT_WINDOW_DAYS: u32 = 7;
const DEFAULT_TOP_PAGES_LIMIT: u32 = 10;

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    pub website_id: Option<String>,
    pub days: Option<u32>,
    pub limit: Option<u32>,
}

impl ReportQuery {
    fn days(&self) -> u32 {
        self.days.unwrap_or(DEFAULT_WINDOW_DAYS).max(1)
    }

    fn scope(&self, organization_id: &str) -> ReportScope {
        ReportScope {
            organization_id: organization_id.to_string(),
            website_id: self.website_id.clone(),
        }
    }
}

fn organization_id(headers: &HeaderMap) -> Result<String, AppError> {
    headers
        .get("x-organization-id")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .ok_or(AppError::OrganizationContextRequired)
}

fn to_value<T: serde::Serialize>(data: &T) -> Result<Value, AppError> {
    serde_json::to_value(data).map_err(|e| AppError::Internal(e.into()))
}

/// `GET /api/reports/overview` — aggregate stats for the window.
#[tracing::instrument(skip(state, headers))]
pub async fn overview(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<ReportQuery>,
) -> Result<impl IntoResponse, AppError> {
    let org = organization_id(&headers)?;
    let days = query.days();
    let key = report_key(
        ReportKind::Overview,
        &org,
        query.website_id.as_deref(),
        days,
        None,
    );

    if let Some(hit) = state.query_cache.get(&key).await {
        return Ok(Json((*hit).clone()));
    }

    let stats = state
        .analytics
        .overview(&query.scope(&org), days, Utc::now())
        .await
        .map_err(AppError::Internal)?;
    let value = to_value(&stats)?;
    state
        .query_cache
        .insert(key, value.clone(), state.config.cache_ttl())
        .await;
    Ok(Json(value))
}

/// `GET /api/reports/timeseries` — daily points, zero-filled.
#[tracing::instrument(skip(state, headers))]
pub async fn timeseries(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<ReportQuery>,
) -> Result<impl IntoResponse, AppError> {
    let org = organization_id(&headers)?;
    let days = query.days();
    let key = report_key(
        ReportKind::Timeseries,
        &org,
        query.website_id.as_deref(),
        days,
        None,
    );

    if let Some(hit) = state.query_cache.get(&key).await {
        return Ok(Json((*hit).clone()));
    }

    let end_date = Utc::now().date_naive();
    let start_date = end_date - chrono::Duration::days(days as i64);
    let series = state
        .analytics
        .timeseries(&query.scope(&org), start_date, end_date)
        .await
        .map_err(AppError::Internal)?;
    let value = to_value(&series)?;
    state
        .query_cache
        .insert(key, value.clone(), state.config.cache_ttl())
        .await;
    Ok(Json(value))
}

/// `GET /api/reports/top-pages` — top URLs by views over the window.
#[tracing::instrument(skip(state, headers))]
pub async fn top_pages(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<ReportQuery>,
) -> Result<impl IntoResponse, AppError> {
    let org = organization_id(&headers)?;
    let days = query.days();
    let limit = query.limit.unwrap_or(DEFAULT_TOP_PAGES_LIMIT).clamp(1, 100);
    let key = report_key(
        ReportKind::TopPages,
        &org,
        query.website_id.as_deref(),
        days,
        Some(limit),
    );

    if let Some(hit) = state.query_cache.get(&key).await {
        return Ok(Json((*hit).clone()));
    }

    let end_date = Utc::now().date_naive();
    let start_date = end_date - chrono::Duration::days(days as i64);
    let pages = state
        .analytics
        .top_pages(&query.scope(&org), start_date, end_date, limit)
        .await
        .map_err(AppError::Internal)?;
    let value = to_value(&pages)?;
    state
        .query_cache
        .insert(key, value.clone(), state.config.cache_ttl())
        .await;
    Ok(Json(value))
}

/// `GET /api/reports/events` — per-event-name summary. Always computed
/// fresh: the grouped query reads raw rows and has no rollup table whose
/// invalidation could keep a cached copy honest.
#[tracing::instrument(skip(state, headers))]
pub async fn events(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<ReportQuery>,
) -> Result<impl IntoResponse, AppError> {
    let org = organization_id(&headers)?;
    let end_date = Utc::now().date_naive();
    let start_date = end_date - chrono::Duration::days(query.days() as i64);

    let summary = state
        .analytics
        .event_summary(&query.scope(&org), start_date, end_date)
        .await
        .map_err(AppError::Internal)?;
    Ok(Json(to_value(&summary)?))
}

/// `GET /api/reports/realtime` — live window stats. Per-website requests
/// are served from the refresh job's snapshot when one is fresh; an
/// org-wide request (no `website_id`) is computed on the spot since its
/// value decays within seconds anyway.
#[tracing::instrument(skip(state, headers))]
pub async fn realtime(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<ReportQuery>,
) -> Result<impl IntoResponse, AppError> {
    let org = organization_id(&headers)?;
    let now = Utc::now();

    if let Some(ref website_id) = query.website_id {
        let key = realtime_key(&org, website_id);
        if let Some(hit) = state.query_cache.get(&key).await {
            return Ok(Json((*hit).clone()));
        }
        let snapshot = state
            .analytics
            .realtime(&ReportScope::website(org.clone(), website_id.clone()), now)
            .await
            .map_err(AppError::Internal)?;
        let value = to_value(&snapshot)?;
        state
            .query_cache
            .insert(key, value.clone(), state.config.realtime_ttl())
            .await;
        return Ok(Json(value));
    }

    let snapshot = state
        .analytics
        .realtime(&ReportScope::organization(org), now)
        .await
        .map_err(AppError::Internal)?;
    Ok(Json(to_value(&snapshot)?))
}

/// `GET /api/reports/websites` — the organization's active websites.
#[tracing::instrument(skip(state, headers))]
pub async fn websites(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let org = organization_id(&headers)?;
    let websites = state
        .analytics
        .list_websites(&org)
        .await
        .map_err(AppError::Internal)?;
    Ok(Json(to_value(&websites)?))
}
