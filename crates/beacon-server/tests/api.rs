use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use beacon_core::config::Config;
use beacon_duckdb::DuckDbBackend;
use beacon_server::{app::build_app, state::AppState};

fn test_config() -> Config {
    Config {
        port: 0,
        data_dir: String::new(),
        retention_days: 90,
        reaper_batch_size: 500,
        cache_ttl_seconds: 300,
        ingest_dedup_ttl_seconds: 300,
        realtime_refresh_seconds: 120,
        aggregation_tick_seconds: 300,
        cors_origins: vec![],
        duckdb_memory_limit: "1GB".to_string(),
    }
}

async fn test_state() -> Arc<AppState> {
    let db = DuckDbBackend::open_in_memory().expect("db");
    db.seed_website("site_1", "org_1", "example.com")
        .await
        .expect("seed");
    Arc::new(AppState::new(db, test_config()))
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, body)
}

fn post(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

fn get_with_org(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("x-organization-id", "org_1")
        .body(Body::empty())
        .expect("request")
}

#[tokio::test]
async fn session_start_returns_created_with_session_id() {
    let state = test_state().await;
    let app = build_app(state);

    let (status, body) = send(
        app,
        post(
            "/api/track/session/start",
            &json!({"domain": "example.com", "session_id": "s1"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["session_id"], "s1");
}

#[tokio::test]
async fn session_start_classifies_transport_user_agent() {
    let state = test_state().await;
    let app = build_app(Arc::clone(&state));

    let request = Request::builder()
        .method("POST")
        .uri("/api/track/session/start")
        .header(header::CONTENT_TYPE, "application/json")
        .header(
            header::USER_AGENT,
            "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) Safari/604.1",
        )
        .body(Body::from(
            json!({"domain": "example.com", "session_id": "s1"}).to_string(),
        ))
        .expect("request");
    let (status, _) = send(app, request).await;
    assert_eq!(status, StatusCode::CREATED);

    let conn = state.db.conn_for_test().await;
    let (device, browser): (String, String) = conn
        .prepare("SELECT device_type, browser FROM sessions WHERE session_id = 's1'")
        .expect("prepare")
        .query_row([], |r| Ok((r.get(0)?, r.get(1)?)))
        .expect("row");
    assert_eq!(device, "mobile");
    assert_eq!(browser, "safari");
}

#[tokio::test]
async fn unknown_domain_answers_400_not_404() {
    let state = test_state().await;
    let app = build_app(Arc::clone(&state));

    let (status, body) = send(
        app,
        post(
            "/api/track/pageview",
            &json!({"domain": "test.com", "session_id": "s1", "page_url": "/"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Website not found");

    let conn = state.db.conn_for_test().await;
    let rows: i64 = conn
        .prepare("SELECT COUNT(*) FROM page_views")
        .expect("prepare")
        .query_row([], |r| r.get(0))
        .expect("count");
    assert_eq!(rows, 0, "a rejected ingestion writes nothing");
}

#[tokio::test]
async fn malformed_pageview_body_answers_400() {
    let state = test_state().await;
    let app = build_app(state);

    // page_url missing entirely.
    let (status, _) = send(
        app,
        post(
            "/api/track/pageview",
            &json!({"domain": "example.com", "session_id": "s1"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn session_end_without_start_answers_400() {
    let state = test_state().await;
    let app = build_app(state);

    let (status, body) = send(
        app,
        post(
            "/api/track/session/end",
            &json!({"domain": "example.com", "session_id": "ghost"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Session not found");
}

#[tokio::test]
async fn batch_with_one_bad_item_answers_207_partial() {
    let state = test_state().await;
    let app = build_app(state);

    let items = json!([
        {"type": "pageview", "domain": "example.com", "session_id": "s1", "page_url": "/"},
        {"type": "pageview", "domain": "example.com", "session_id": "s2", "page_url": "/"},
        {"type": "event", "domain": "example.com", "session_id": "s3", "event_name": "signup"},
        {"type": "pageview", "domain": "unknown.example", "session_id": "s4", "page_url": "/"},
    ]);
    let (status, body) = send(app, post("/api/track/batch", &items)).await;

    assert_eq!(status, StatusCode::MULTI_STATUS);
    assert_eq!(body["status"], "partial");
    assert_eq!(body["successful_count"], 3);
    assert_eq!(body["errors"].as_array().map(Vec::len), Some(1));
    assert_eq!(body["errors"][0]["error"], "Website not found");
}

#[tokio::test]
async fn fully_successful_batch_answers_201() {
    let state = test_state().await;
    let app = build_app(state);

    let items = json!([
        {"type": "pageview", "domain": "example.com", "session_id": "s1", "page_url": "/"},
        {"type": "event", "domain": "example.com", "session_id": "s2", "event_name": "signup"},
    ]);
    let (status, body) = send(app, post("/api/track/batch", &items)).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["successful_count"], 2);
}

#[tokio::test]
async fn reports_require_the_organization_header() {
    let state = test_state().await;
    let app = build_app(state);

    let request = Request::builder()
        .uri("/api/reports/overview")
        .body(Body::empty())
        .expect("request");
    let (status, body) = send(app, request).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "organization_context_required");
}

#[tokio::test]
async fn overview_reads_through_the_query_cache() {
    let state = test_state().await;

    let (status, first) = send(
        build_app(Arc::clone(&state)),
        get_with_org("/api/reports/overview?website_id=site_1&days=7"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["total_pageviews"], 0);

    // Second read is served from the cache and must be identical.
    let (_, second) = send(
        build_app(Arc::clone(&state)),
        get_with_org("/api/reports/overview?website_id=site_1&days=7"),
    )
    .await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn realtime_counts_current_activity() {
    let state = test_state().await;

    let (status, _) = send(
        build_app(Arc::clone(&state)),
        post(
            "/api/track/pageview",
            &json!({"domain": "example.com", "session_id": "s1", "page_url": "/"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(
        build_app(Arc::clone(&state)),
        get_with_org("/api/reports/realtime?website_id=site_1"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["active_visitors"], 1);
    assert_eq!(body["pageviews_today"], 1);
}

#[tokio::test]
async fn websites_lists_the_organizations_active_sites() {
    let state = test_state().await;

    let (status, body) = send(
        build_app(Arc::clone(&state)),
        get_with_org("/api/reports/websites"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let sites = body.as_array().expect("array");
    assert_eq!(sites.len(), 1);
    assert_eq!(sites[0]["domain"], "example.com");
}

#[tokio::test]
async fn timeseries_zero_fills_the_window() {
    let state = test_state().await;

    let (status, body) = send(
        build_app(Arc::clone(&state)),
        get_with_org("/api/reports/timeseries?days=3"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let series = body.as_array().expect("array");
    // [today-days, today] inclusive.
    assert_eq!(series.len(), 4);
    assert!(series.iter().all(|p| p["pageviews"] == 0));
}

#[tokio::test]
async fn health_answers_ok() {
    let state = test_state().await;
    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .expect("request");
    let (status, body) = send(build_app(state), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}
