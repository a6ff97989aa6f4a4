use chrono::{Duration, Utc};

use beacon_core::analytics::AnalyticsBackend;
use beacon_core::model::{EventFields, PageviewFields};
use beacon_duckdb::DuckDbBackend;

fn pageview() -> PageviewFields {
    PageviewFields {
        page_url: "/".to_string(),
        page_title: None,
        referrer: None,
        load_time: None,
        user_agent: None,
        ip_address: None,
    }
}

fn event() -> EventFields {
    EventFields {
        event_name: "click".to_string(),
        event_data: None,
        page_url: None,
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
async fn reaper_deletes_old_sessions_in_bounded_batches() {
    let db = DuckDbBackend::open_in_memory().expect("db");
    db.seed_website("site_1", "org_1", "example.com")
        .await
        .expect("seed");

    let now = Utc::now();
    let ancient = now - Duration::days(100);

    // Three expired sessions, each with a pageview and an event.
    for session_id in ["old1", "old2", "old3"] {
        db.record_pageview("site_1", session_id, &pageview(), ancient)
            .await
            .expect("old pv");
        db.record_event("site_1", session_id, &event(), ancient)
            .await
            .expect("old event");
    }
    // Two live sessions inside the horizon.
    for session_id in ["fresh1", "fresh2"] {
        db.record_pageview("site_1", session_id, &pageview(), now)
            .await
            .expect("fresh pv");
    }

    let cutoff = now - Duration::days(90);

    // Batch size 2 → ceil(3/2) = 2 deleting passes plus the empty probe.
    assert_eq!(
        db.delete_expired_sessions(cutoff, 2).await.expect("batch 1"),
        2
    );
    assert_eq!(
        db.delete_expired_sessions(cutoff, 2).await.expect("batch 2"),
        1
    );
    assert_eq!(
        db.delete_expired_sessions(cutoff, 2).await.expect("batch 3"),
        0
    );

    assert_eq!(count(&db, "SELECT COUNT(*) FROM sessions").await, 2);
    assert_eq!(
        count(&db, "SELECT COUNT(*) FROM sessions WHERE session_id LIKE 'old%'").await,
        0
    );
    // Children cascade with their sessions.
    assert_eq!(count(&db, "SELECT COUNT(*) FROM events").await, 0);
    assert_eq!(count(&db, "SELECT COUNT(*) FROM page_views").await, 2);
}

#[tokio::test]
async fn reaper_never_touches_sessions_inside_horizon() {
    let db = DuckDbBackend::open_in_memory().expect("db");
    db.seed_website("site_1", "org_1", "example.com")
        .await
        .expect("seed");

    let now = Utc::now();
    // 89 days old: one day inside the 90-day horizon.
    db.record_pageview("site_1", "s1", &pageview(), now - Duration::days(89))
        .await
        .expect("pv");

    let cutoff = now - Duration::days(90);
    assert_eq!(
        db.delete_expired_sessions(cutoff, 100).await.expect("reap"),
        0
    );
    assert_eq!(count(&db, "SELECT COUNT(*) FROM sessions").await, 1);
}
