//! Ingestion normalization service.
//!
//! Sits between the track routes and the storage backend: resolves the
//! tenant, fills client metadata from the transport when the payload omits
//! it, wraps the pageview/event writes in the idempotency cache, and
//! isolates batch items from each other.
//!
//! Every function returns the wire body as a `serde_json::Value` —
//! `{"status": "ok", ...}` or `{"error": "..."}` — with `Err` reserved for
//! store failures. Client rejections travel as values because the
//! idempotency cache replays them verbatim and batch processing records
//! them per item and moves on.

use axum::http::HeaderMap;
use chrono::Utc;
use serde_json::{json, Value};

use beacon_core::analytics::AnalyticsBackend;
use beacon_core::client::ClientMeta;
use beacon_core::error::TrackError;
use beacon_core::model::{
    BatchError, BatchItem, BatchOutcome, BatchStatus, EventFields, EventPayload, PageviewFields,
    PageviewPayload, SessionEndPayload, SessionStartPayload, Website,
};

use crate::state::AppState;

/// Client information derived from the request transport, used as the
/// fallback when payload fields are absent.
#[derive(Debug, Clone, Default)]
pub struct RequestClient {
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub country: Option<String>,
}

impl RequestClient {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
        };
        Self {
            user_agent: header("user-agent"),
            // First entry of the forwarded chain is the originating client.
            ip_address: header("x-forwarded-for")
                .and_then(|chain| chain.split(',').next().map(|ip| ip.trim().to_string())),
            country: header("cf-ipcountry"),
        }
    }
}

fn require(field: &str, value: &str) -> Result<(), TrackError> {
    if value.trim().is_empty() {
        return Err(TrackError::Validation(format!("{field} is required")));
    }
    Ok(())
}

async fn resolve_website(state: &AppState, domain: &str) -> Result<Website, TrackError> {
    state
        .analytics
        .resolve_website(domain)
        .await?
        .ok_or(TrackError::WebsiteNotFound)
}

/// Convert a service outcome to the wire body, keeping store failures as
/// errors so they surface as 500s and stay retryable.
fn into_reply(outcome: Result<Value, TrackError>) -> Result<Value, TrackError> {
    match outcome {
        Ok(value) => Ok(value),
        Err(e) if e.is_client_error() => Ok(json!({ "error": e.to_string() })),
        Err(e) => Err(e),
    }
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

pub async fn start_session(
    state: &AppState,
    payload: SessionStartPayload,
    client: &RequestClient,
) -> Result<Value, TrackError> {
    into_reply(write_session_start(state, payload, client).await)
}

async fn write_session_start(
    state: &AppState,
    payload: SessionStartPayload,
    client: &RequestClient,
) -> Result<Value, TrackError> {
    require("domain", &payload.domain)?;
    require("session_id", &payload.session_id)?;

    let website = resolve_website(state, &payload.domain).await?;

    let mut meta = ClientMeta {
        user_agent: payload.user_agent.or_else(|| client.user_agent.clone()),
        ip_address: payload.ip_address.or_else(|| client.ip_address.clone()),
        country: payload.country.or_else(|| client.country.clone()),
        browser: payload.browser,
        device_type: payload.device_type,
    };
    meta.classify();

    state
        .analytics
        .start_session(&website.id, &payload.session_id, &meta, Utc::now())
        .await?;

    Ok(json!({ "status": "ok", "session_id": payload.session_id }))
}

pub async fn end_session(
    state: &AppState,
    payload: SessionEndPayload,
) -> Result<Value, TrackError> {
    into_reply(write_session_end(state, payload).await)
}

async fn write_session_end(
    state: &AppState,
    payload: SessionEndPayload,
) -> Result<Value, TrackError> {
    require("domain", &payload.domain)?;
    require("session_id", &payload.session_id)?;

    let website = resolve_website(state, &payload.domain).await?;
    let ended = state
        .analytics
        .end_session(&website.id, &payload.session_id, Utc::now())
        .await?;
    if !ended {
        // An end without a start signals a client bug; this call is
        // deliberately not creation-tolerant.
        return Err(TrackError::SessionNotFound);
    }
    Ok(json!({ "status": "ok" }))
}

// ---------------------------------------------------------------------------
// Pageviews and events (idempotency-cached)
// ---------------------------------------------------------------------------

/// Record a pageview behind the write-path idempotency cache: a retry of the
/// same (domain, session) within the TTL replays the first outcome instead
/// of writing a duplicate row. Best-effort — concurrent first calls may
/// both write, which the upsert-shaped storage tolerates.
pub async fn record_pageview(
    state: &AppState,
    payload: PageviewPayload,
    client: &RequestClient,
) -> Result<Value, TrackError> {
    if let Err(e) = require("domain", &payload.domain)
        .and_then(|()| require("session_id", &payload.session_id))
        .and_then(|()| require("page_url", &payload.page_url))
    {
        return into_reply(Err(e));
    }

    let key = format!("pageview:{}:{}", payload.domain, payload.session_id);
    let reply = state
        .ingest_cache
        .get_or_compute(&key, state.config.ingest_dedup_ttl(), || async {
            into_reply(write_pageview(state, &payload, client).await)
        })
        .await?;
    Ok((*reply).clone())
}

async fn write_pageview(
    state: &AppState,
    payload: &PageviewPayload,
    client: &RequestClient,
) -> Result<Value, TrackError> {
    let website = resolve_website(state, &payload.domain).await?;

    let fields = PageviewFields {
        page_url: payload.page_url.clone(),
        page_title: payload.page_title.clone(),
        referrer: payload.referrer.clone(),
        load_time: payload.load_time,
        user_agent: payload
            .user_agent
            .clone()
            .or_else(|| client.user_agent.clone()),
        ip_address: payload
            .ip_address
            .clone()
            .or_else(|| client.ip_address.clone()),
    };

    state
        .analytics
        .record_pageview(&website.id, &payload.session_id, &fields, Utc::now())
        .await?;
    Ok(json!({ "status": "ok" }))
}

/// Record a custom event; same idempotency-cache semantics as
/// [`record_pageview`], keyed separately so a pageview does not mask an
/// event for the same session.
pub async fn record_event(state: &AppState, payload: EventPayload) -> Result<Value, TrackError> {
    if let Err(e) = require("domain", &payload.domain)
        .and_then(|()| require("session_id", &payload.session_id))
        .and_then(|()| require("event_name", &payload.event_name))
    {
        return into_reply(Err(e));
    }

    let key = format!("event:{}:{}", payload.domain, payload.session_id);
    let reply = state
        .ingest_cache
        .get_or_compute(&key, state.config.ingest_dedup_ttl(), || async {
            into_reply(write_event(state, &payload).await)
        })
        .await?;
    Ok((*reply).clone())
}

async fn write_event(state: &AppState, payload: &EventPayload) -> Result<Value, TrackError> {
    let website = resolve_website(state, &payload.domain).await?;

    let fields = EventFields {
        event_name: payload.event_name.clone(),
        event_data: payload.event_data.as_ref().map(|v| v.to_string()),
        page_url: payload.page_url.clone(),
    };

    state
        .analytics
        .record_event(&website.id, &payload.session_id, &fields, Utc::now())
        .await?;
    Ok(json!({ "status": "ok" }))
}

// ---------------------------------------------------------------------------
// Batch
// ---------------------------------------------------------------------------

/// Process a heterogeneous batch, one storage transaction per item. A
/// failing item is recorded and skipped — it never rolls back or blocks its
/// siblings, including on store errors.
pub async fn batch_track(
    state: &AppState,
    items: Vec<BatchItem>,
    client: &RequestClient,
) -> BatchOutcome {
    let mut successful_count = 0;
    let mut errors = Vec::new();

    for item in items {
        match track_batch_item(state, &item, client).await {
            Ok(reply) => match reply.get("error").and_then(Value::as_str) {
                Some(error) => errors.push(BatchError {
                    error: error.to_string(),
                    item,
                }),
                None => successful_count += 1,
            },
            Err(e) => {
                tracing::error!(error = %e, "batch item store failure");
                errors.push(BatchError {
                    error: e.to_string(),
                    item,
                });
            }
        }
    }

    BatchOutcome {
        status: if errors.is_empty() {
            BatchStatus::Ok
        } else {
            BatchStatus::Partial
        },
        successful_count,
        errors,
    }
}

async fn track_batch_item(
    state: &AppState,
    item: &BatchItem,
    client: &RequestClient,
) -> Result<Value, TrackError> {
    let domain = item.domain.clone().unwrap_or_default();
    let session_id = item.session_id.clone().unwrap_or_default();

    match item.item_type.as_str() {
        "pageview" => {
            record_pageview(
                state,
                PageviewPayload {
                    domain,
                    session_id,
                    page_url: item.page_url.clone().unwrap_or_default(),
                    page_title: item.page_title.clone(),
                    referrer: item.referrer.clone(),
                    load_time: item.load_time,
                    user_agent: None,
                    ip_address: None,
                },
                client,
            )
            .await
        }
        "event" => {
            record_event(
                state,
                EventPayload {
                    domain,
                    session_id,
                    event_name: item.event_name.clone().unwrap_or_default(),
                    event_data: item.event_data.clone(),
                    page_url: item.page_url.clone(),
                },
            )
            .await
        }
        other => Ok(json!({ "error": format!("Invalid event type: {other}") })),
    }
}
