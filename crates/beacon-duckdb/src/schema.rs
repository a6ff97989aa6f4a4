/// DuckDB initialization SQL.
///
/// Executed once at database open time via `Connection::execute_batch`.
/// All statements use `IF NOT EXISTS` so they are safe to re-run on every
/// startup (idempotent).
///
/// `memory_limit` is passed at runtime from `Config.duckdb_memory_limit`
/// (env `BEACON_DUCKDB_MEMORY`, default `"1GB"`). Always set an explicit
/// limit — DuckDB's default (80% of system RAM) is not acceptable for a
/// server process. `SET threads = 2` bounds the background thread pool,
/// which is enough for single-writer embedded use.
///
/// NOTE: no FOREIGN KEY declarations. DuckDB enforces FK constraints
/// immediately at statement time, which conflicts with the manual
/// cascade-delete order the retention reaper uses (page_views/events first,
/// sessions last). Referential integrity is maintained by the write paths:
/// every page_view/event insert runs in the same transaction as its
/// session get-or-create.
pub fn init_sql(memory_limit: &str) -> String {
    format!(
        r#"SET memory_limit = '{memory_limit}';
SET threads = 2;

-- ===========================================
-- WEBSITES (tenant-owned; read-only to this service)
-- ===========================================
CREATE TABLE IF NOT EXISTS websites (
    id              VARCHAR PRIMARY KEY,           -- 'site_' + suffix, minted by tenant management
    organization_id VARCHAR NOT NULL,
    name            VARCHAR NOT NULL,
    domain          VARCHAR NOT NULL UNIQUE,       -- globally unique tracking domain
    is_active       BOOLEAN NOT NULL DEFAULT TRUE, -- inactive == not found to the resolver
    created_at      TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
CREATE INDEX IF NOT EXISTS idx_websites_domain ON websites(domain);
CREATE INDEX IF NOT EXISTS idx_websites_org_created ON websites(organization_id, created_at);

-- ===========================================
-- SESSIONS
-- ===========================================
-- `id` is a surrogate UUID used as the join key from page_views/events.
-- `session_id` is the client-supplied identifier; the UNIQUE index on
-- (website_id, session_id) is what makes start_session an upsert and
-- get-or-create race-free.
CREATE TABLE IF NOT EXISTS sessions (
    id          VARCHAR PRIMARY KEY,
    website_id  VARCHAR NOT NULL,
    session_id  VARCHAR NOT NULL,
    started_at  TIMESTAMP NOT NULL,
    ended_at    TIMESTAMP,                         -- NULL while the visit is open
    user_agent  VARCHAR,
    ip_address  VARCHAR,
    country     VARCHAR(2),                        -- ISO 3166-1 alpha-2
    browser     VARCHAR,
    device_type VARCHAR                            -- 'desktop' | 'mobile' | 'tablet'
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_sessions_website_session
    ON sessions(website_id, session_id);
-- Serves aggregation day windows, the realtime active-visitors query and
-- the retention reaper's cutoff scan.
CREATE INDEX IF NOT EXISTS idx_sessions_website_started
    ON sessions(website_id, started_at);

-- ===========================================
-- PAGE VIEWS
-- ===========================================
-- `timestamp` is assigned at write time, never taken from the client, so
-- clock-skewed browsers cannot poison the daily aggregates.
CREATE TABLE IF NOT EXISTS page_views (
    id          VARCHAR PRIMARY KEY,
    website_id  VARCHAR NOT NULL,
    session_id  VARCHAR NOT NULL,                  -- sessions.id
    page_url    VARCHAR NOT NULL,
    page_title  VARCHAR,
    referrer    VARCHAR,
    load_time   DOUBLE,                            -- milliseconds, client-reported
    user_agent  VARCHAR,
    ip_address  VARCHAR,
    timestamp   TIMESTAMP NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_page_views_website_time ON page_views(website_id, timestamp);
CREATE INDEX IF NOT EXISTS idx_page_views_session ON page_views(session_id);

-- ===========================================
-- EVENTS (custom events, opaque payload)
-- ===========================================
CREATE TABLE IF NOT EXISTS events (
    id          VARCHAR PRIMARY KEY,
    website_id  VARCHAR NOT NULL,
    session_id  VARCHAR NOT NULL,                  -- sessions.id
    event_name  VARCHAR NOT NULL,
    event_data  VARCHAR,                           -- JSON string, schema-free
    page_url    VARCHAR,
    timestamp   TIMESTAMP NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_events_website_name_time
    ON events(website_id, event_name, timestamp);
CREATE INDEX IF NOT EXISTS idx_events_session ON events(session_id);

-- ===========================================
-- DAILY WEBSITE STATS (aggregation output)
-- ===========================================
-- Written only by the aggregation engine; every upsert replaces the full
-- metric set for (website_id, date) so re-runs overwrite, never accumulate.
CREATE TABLE IF NOT EXISTS daily_website_stats (
    website_id           VARCHAR NOT NULL,
    date                 DATE NOT NULL,
    pageviews            BIGINT NOT NULL DEFAULT 0,
    unique_visitors      BIGINT NOT NULL DEFAULT 0,
    sessions             BIGINT NOT NULL DEFAULT 0,
    events               BIGINT NOT NULL DEFAULT 0,
    avg_session_duration DOUBLE NOT NULL DEFAULT 0,
    bounce_rate          DOUBLE NOT NULL DEFAULT 0, -- percentage, 0-100
    PRIMARY KEY (website_id, date)
);

-- ===========================================
-- PAGE STATS (per-URL aggregation output)
-- ===========================================
-- avg_time_on_page and exit_rate are persisted as 0 until client-side
-- duration instrumentation exists.
CREATE TABLE IF NOT EXISTS page_stats (
    website_id       VARCHAR NOT NULL,
    page_url         VARCHAR NOT NULL,
    date             DATE NOT NULL,
    views            BIGINT NOT NULL DEFAULT 0,
    unique_visitors  BIGINT NOT NULL DEFAULT 0,
    avg_time_on_page DOUBLE NOT NULL DEFAULT 0,
    exit_rate        DOUBLE NOT NULL DEFAULT 0,
    PRIMARY KEY (website_id, page_url, date)
);
CREATE INDEX IF NOT EXISTS idx_page_stats_website_date ON page_stats(website_id, date);
"#
    )
}
