use chrono::Utc;

use beacon_core::analytics::AnalyticsBackend;
use beacon_core::client::ClientMeta;
use beacon_core::model::{EventFields, PageviewFields};
use beacon_duckdb::DuckDbBackend;

fn sample_meta(browser: &str) -> ClientMeta {
    ClientMeta {
        user_agent: Some("Mozilla/5.0 test".to_string()),
        ip_address: Some("203.0.113.7".to_string()),
        country: Some("PL".to_string()),
        browser: Some(browser.to_string()),
        device_type: Some("desktop".to_string()),
    }
}

fn pageview_fields(url: &str) -> PageviewFields {
    PageviewFields {
        page_url: url.to_string(),
        page_title: Some("Title".to_string()),
        referrer: None,
        load_time: Some(120.0),
        user_agent: None,
        ip_address: None,
    }
}

async fn count(db: &DuckDbBackend, sql: &str) -> i64 {
    let conn = db.conn_for_test().await;
    conn.prepare(sql)
        .expect("prepare")
        .query_row([], |row| row.get(0))
        .expect("count")
}

#[tokio::test]
async fn start_session_twice_upserts_single_row() {
    let db = DuckDbBackend::open_in_memory().expect("db");
    db.seed_website("site_1", "org_1", "example.com")
        .await
        .expect("seed");

    let now = Utc::now();
    db.start_session("site_1", "s1", &sample_meta("chrome"), now)
        .await
        .expect("first start");
    db.start_session("site_1", "s1", &sample_meta("firefox"), now)
        .await
        .expect("second start");

    assert_eq!(count(&db, "SELECT COUNT(*) FROM sessions").await, 1);

    let conn = db.conn_for_test().await;
    let browser: String = conn
        .prepare("SELECT browser FROM sessions WHERE website_id = 'site_1' AND session_id = 's1'")
        .expect("prepare")
        .query_row([], |row| row.get(0))
        .expect("row");
    assert_eq!(browser, "firefox", "restart rewrites session metadata");
}

#[tokio::test]
async fn restart_clears_session_end_time() {
    let db = DuckDbBackend::open_in_memory().expect("db");
    db.seed_website("site_1", "org_1", "example.com")
        .await
        .expect("seed");

    let now = Utc::now();
    db.start_session("site_1", "s1", &sample_meta("chrome"), now)
        .await
        .expect("start");
    assert!(db.end_session("site_1", "s1", now).await.expect("end"));
    db.start_session("site_1", "s1", &sample_meta("chrome"), now)
        .await
        .expect("restart");

    assert_eq!(
        count(&db, "SELECT COUNT(*) FROM sessions WHERE ended_at IS NULL").await,
        1
    );
}

#[tokio::test]
async fn end_session_is_not_creation_tolerant() {
    let db = DuckDbBackend::open_in_memory().expect("db");
    db.seed_website("site_1", "org_1", "example.com")
        .await
        .expect("seed");

    let ended = db
        .end_session("site_1", "missing", Utc::now())
        .await
        .expect("end call");
    assert!(!ended, "ending an unknown session reports not-found");
    assert_eq!(count(&db, "SELECT COUNT(*) FROM sessions").await, 0);
}

#[tokio::test]
async fn pageview_before_session_start_creates_session() {
    let db = DuckDbBackend::open_in_memory().expect("db");
    db.seed_website("site_1", "org_1", "example.com")
        .await
        .expect("seed");

    let now = Utc::now();
    db.record_pageview("site_1", "s1", &pageview_fields("/"), now)
        .await
        .expect("pageview");
    db.record_pageview("site_1", "s1", &pageview_fields("/about"), now)
        .await
        .expect("second pageview");

    assert_eq!(count(&db, "SELECT COUNT(*) FROM sessions").await, 1);
    assert_eq!(count(&db, "SELECT COUNT(*) FROM page_views").await, 2);
}

#[tokio::test]
async fn record_event_stores_opaque_payload() {
    let db = DuckDbBackend::open_in_memory().expect("db");
    db.seed_website("site_1", "org_1", "example.com")
        .await
        .expect("seed");

    let fields = EventFields {
        event_name: "signup".to_string(),
        event_data: Some(r#"{"plan":"pro","seats":3}"#.to_string()),
        page_url: Some("/pricing".to_string()),
    };
    db.record_event("site_1", "s1", &fields, Utc::now())
        .await
        .expect("event");

    let conn = db.conn_for_test().await;
    let stored: String = conn
        .prepare("SELECT event_data FROM events WHERE event_name = 'signup'")
        .expect("prepare")
        .query_row([], |row| row.get(0))
        .expect("row");
    let parsed: serde_json::Value = serde_json::from_str(&stored).expect("valid json");
    assert_eq!(parsed["plan"], "pro");
}

#[tokio::test]
async fn resolver_treats_inactive_as_missing() {
    let db = DuckDbBackend::open_in_memory().expect("db");
    db.seed_website("site_1", "org_1", "example.com")
        .await
        .expect("seed");

    let resolved = db
        .resolve_website("example.com")
        .await
        .expect("resolve")
        .expect("active website resolves");
    assert_eq!(resolved.id, "site_1");
    assert_eq!(resolved.organization_id, "org_1");

    db.set_website_active("site_1", false).await.expect("deactivate");
    assert!(db
        .resolve_website("example.com")
        .await
        .expect("resolve")
        .is_none());

    assert!(db
        .resolve_website("nope.example")
        .await
        .expect("resolve")
        .is_none());
}
