//! Ingestion HTTP surface.
//!
//! No auth: these endpoints are hit by tracking snippets on arbitrary
//! third-party pages. An unknown domain answers **400, not 404** — a 404
//! would let any internet caller probe which tenant domains exist.
//!
//! Success codes follow the write shape: 201 for rows created, 200 for the
//! session-end update, 207 for a partially failed batch. Client rejections
//! arrive from the ingest service as `{"error": "..."}` bodies and map to
//! 400; only store failures become 500s.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::de::DeserializeOwned;
use serde_json::Value;

use beacon_core::error::TrackError;
use beacon_core::model::{
    BatchItem, BatchStatus, EventPayload, PageviewPayload, SessionEndPayload, SessionStartPayload,
};

use crate::{error::AppError, ingest, state::AppState};

/// Deserialize the request body, mapping malformed input to a 400 (axum's
/// default `Json<T>` rejection would answer 422).
fn parse<T: DeserializeOwned>(body: Value) -> Result<T, AppError> {
    serde_json::from_value(body).map_err(|e| AppError::BadRequest(e.to_string()))
}

fn to_app_error(err: TrackError) -> AppError {
    match err {
        TrackError::Store(e) => AppError::Internal(e),
        other => AppError::BadRequest(other.to_string()),
    }
}

/// Map an ingest reply to HTTP: rejection bodies are 400, anything else
/// uses the operation's success code.
fn reply(success: StatusCode, outcome: Value) -> Response {
    let status = if outcome.get("error").is_some() {
        StatusCode::BAD_REQUEST
    } else {
        success
    };
    (status, Json(outcome)).into_response()
}

/// `POST /api/track/session/start`
#[tracing::instrument(skip(state, headers, body))]
pub async fn session_start(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Response, AppError> {
    let payload: SessionStartPayload = parse(body)?;
    let client = ingest::RequestClient::from_headers(&headers);
    let outcome = ingest::start_session(&state, payload, &client)
        .await
        .map_err(to_app_error)?;
    Ok(reply(StatusCode::CREATED, outcome))
}

/// `POST /api/track/session/end`
#[tracing::instrument(skip(state, body))]
pub async fn session_end(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Result<Response, AppError> {
    let payload: SessionEndPayload = parse(body)?;
    let outcome = ingest::end_session(&state, payload)
        .await
        .map_err(to_app_error)?;
    Ok(reply(StatusCode::OK, outcome))
}

/// `POST /api/track/pageview`
#[tracing::instrument(skip(state, headers, body))]
pub async fn pageview(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Response, AppError> {
    let payload: PageviewPayload = parse(body)?;
    let client = ingest::RequestClient::from_headers(&headers);
    let outcome = ingest::record_pageview(&state, payload, &client)
        .await
        .map_err(to_app_error)?;
    Ok(reply(StatusCode::CREATED, outcome))
}

/// `POST /api/track/event`
#[tracing::instrument(skip(state, body))]
pub async fn event(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Result<Response, AppError> {
    let payload: EventPayload = parse(body)?;
    let outcome = ingest::record_event(&state, payload)
        .await
        .map_err(to_app_error)?;
    Ok(reply(StatusCode::CREATED, outcome))
}

/// `POST /api/track/batch` — a JSON array of tagged items, or a single item
/// treated as a batch of one. Replies 201 when every item landed, 207 with
/// the per-item error list otherwise.
#[tracing::instrument(skip(state, headers, body))]
pub async fn batch(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Response, AppError> {
    let items: Vec<BatchItem> = match body {
        Value::Array(_) => parse(body)?,
        single => vec![parse(single)?],
    };
    if items.is_empty() {
        return Err(AppError::BadRequest("empty batch".to_string()));
    }

    let client = ingest::RequestClient::from_headers(&headers);
    let outcome = ingest::batch_track(&state, items, &client).await;

    let status = match outcome.status {
        BatchStatus::Ok => StatusCode::CREATED,
        BatchStatus::Partial => StatusCode::MULTI_STATUS,
    };
    Ok((status, Json(outcome)).into_response())
}
