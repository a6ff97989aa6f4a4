use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub data_dir: String,
    /// Raw sessions/pageviews/events older than this are reaped.
    pub retention_days: u32,
    /// Sessions deleted per reaper transaction.
    pub reaper_batch_size: usize,
    /// TTL for cached overview/timeseries/top-pages responses.
    pub cache_ttl_seconds: u64,
    /// TTL of the write-path idempotency window.
    pub ingest_dedup_ttl_seconds: u64,
    /// Cadence of the realtime snapshot refresh job (also its cache TTL).
    pub realtime_refresh_seconds: u64,
    /// How often the aggregation scheduler checks for an unprocessed day.
    pub aggregation_tick_seconds: u64,
    pub cors_origins: Vec<String>,
    pub duckdb_memory_limit: String,
}

fn env_or<T: std::str::FromStr>(var: &str, default: T) -> T {
    std::env::var(var)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Ok(Self {
            port: std::env::var("BEACON_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|e| format!("invalid port: {e}"))?,
            data_dir: std::env::var("BEACON_DATA_DIR").unwrap_or_else(|_| "./data".to_string()),
            retention_days: env_or("BEACON_RETENTION_DAYS", 90),
            reaper_batch_size: env_or("BEACON_REAPER_BATCH_SIZE", 500),
            cache_ttl_seconds: env_or("BEACON_CACHE_TTL_SECONDS", 300),
            ingest_dedup_ttl_seconds: env_or("BEACON_INGEST_DEDUP_TTL_SECONDS", 300),
            realtime_refresh_seconds: env_or("BEACON_REALTIME_REFRESH_SECONDS", 120),
            aggregation_tick_seconds: env_or("BEACON_AGGREGATION_TICK_SECONDS", 300),
            cors_origins: std::env::var("BEACON_CORS_ORIGINS")
                .map(|v| v.split(',').map(str::to_string).collect())
                .unwrap_or_default(),
            duckdb_memory_limit: std::env::var("BEACON_DUCKDB_MEMORY")
                .unwrap_or_else(|_| "1GB".to_string()),
        })
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }

    pub fn ingest_dedup_ttl(&self) -> Duration {
        Duration::from_secs(self.ingest_dedup_ttl_seconds)
    }

    pub fn realtime_ttl(&self) -> Duration {
        Duration::from_secs(self.realtime_refresh_seconds)
    }
}
