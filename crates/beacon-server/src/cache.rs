//! In-process key/value cache with per-entry TTLs.
//!
//! Backs both cache roles in the system: the read-through reporting cache
//! (minutes-scale TTL, invalidated by the aggregation engine) and the
//! write-path idempotency window (short TTL, collapses client retries).
//! Keys are the versioned segment strings from `beacon_core::cache_key`, so
//! invalidation matches on the org/website segments rather than raw
//! prefixes.
//!
//! Every operation is infallible or degrades silently: a cache problem must
//! never turn into a request failure — the store remains the source of
//! truth.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use moka::future::Cache;
use moka::Expiry;
use serde_json::Value;

use beacon_core::cache_key::{key_matches_organization, key_matches_website};

#[derive(Clone)]
struct CachedEntry {
    value: Arc<Value>,
    ttl: Duration,
}

/// Reads each entry's TTL off the entry itself — the two cache roles share
/// one store but want different lifetimes.
struct PerEntryTtl;

impl Expiry<String, CachedEntry> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        entry: &CachedEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }
}

pub struct TtlCache {
    inner: Cache<String, CachedEntry>,
}

impl TtlCache {
    pub fn new(max_capacity: u64) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(max_capacity)
                .expire_after(PerEntryTtl)
                .support_invalidation_closures()
                .build(),
        }
    }

    pub async fn get(&self, key: &str) -> Option<Arc<Value>> {
        self.inner.get(key).await.map(|entry| entry.value)
    }

    pub async fn insert(&self, key: impl Into<String>, value: Value, ttl: Duration) {
        self.inner
            .insert(
                key.into(),
                CachedEntry {
                    value: Arc::new(value),
                    ttl,
                },
            )
            .await;
    }

    /// Read-through: attempt the cache, on a miss run `compute` under no
    /// lock and populate. Two racing requests may both compute — acceptable
    /// here because every write behind this cache is an idempotent upsert,
    /// and simpler than a single-flight design.
    ///
    /// A failed compute propagates without populating the cache, so store
    /// hiccups stay retryable instead of being replayed for a whole TTL.
    pub async fn get_or_compute<F, Fut, E>(
        &self,
        key: &str,
        ttl: Duration,
        compute: F,
    ) -> Result<Arc<Value>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, E>>,
    {
        if let Some(hit) = self.get(key).await {
            return Ok(hit);
        }
        let value = Arc::new(compute().await?);
        self.inner
            .insert(
                key.to_string(),
                CachedEntry {
                    value: Arc::clone(&value),
                    ttl,
                },
            )
            .await;
        Ok(value)
    }

    /// Drop every entry belonging to an organization.
    pub fn invalidate_organization(&self, organization_id: &str) -> Result<()> {
        let organization_id = organization_id.to_string();
        self.inner
            .invalidate_entries_if(move |key, _| key_matches_organization(key, &organization_id))
            .map(|_| ())
            .map_err(anyhow::Error::from)
    }

    /// Drop a website's entries, including the organization's "all"-scope
    /// entries that aggregate over it. Fired by the aggregation engine after
    /// a website's upserts complete.
    pub fn invalidate_website(&self, organization_id: &str, website_id: &str) -> Result<()> {
        let organization_id = organization_id.to_string();
        let website_id = website_id.to_string();
        self.inner
            .invalidate_entries_if(move |key, _| {
                key_matches_website(key, &organization_id, &website_id)
            })
            .map(|_| ())
            .map_err(anyhow::Error::from)
    }

    /// Flush pending cache maintenance so invalidations become visible —
    /// moka applies invalidation predicates lazily. Test-only helper.
    pub async fn sync(&self) {
        self.inner.run_pending_tasks().await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use beacon_core::cache_key::{realtime_key, report_key, ReportKind};

    use super::*;

    const TTL: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn get_or_compute_runs_compute_once_within_ttl() {
        let cache = TtlCache::new(100);
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value = cache
                .get_or_compute("k", TTL, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, anyhow::Error>(json!({"status": "ok"}))
                })
                .await
                .expect("compute");
            assert_eq!(value["status"], "ok");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_compute_is_not_cached() {
        let cache = TtlCache::new(100);
        let calls = AtomicUsize::new(0);

        let failed = cache
            .get_or_compute("k", TTL, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<Value, _>(anyhow::anyhow!("store down"))
            })
            .await;
        assert!(failed.is_err());

        // The retry recomputes instead of replaying the failure.
        let value = cache
            .get_or_compute("k", TTL, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, anyhow::Error>(json!({"status": "ok"}))
            })
            .await
            .expect("compute");
        assert_eq!(value["status"], "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn website_invalidation_spares_other_tenants() {
        let cache = TtlCache::new(100);
        let site_key = report_key(ReportKind::Overview, "org1", Some("site1"), 7, None);
        let all_key = report_key(ReportKind::Overview, "org1", None, 7, None);
        let other_org = report_key(ReportKind::Overview, "org2", Some("site9"), 7, None);

        for key in [&site_key, &all_key, &other_org] {
            cache.insert(key.clone(), json!(1), TTL).await;
        }

        cache.invalidate_website("org1", "site1").expect("invalidate");
        cache.sync().await;

        assert!(cache.get(&site_key).await.is_none());
        assert!(cache.get(&all_key).await.is_none(), "org-wide entry is stale too");
        assert!(cache.get(&other_org).await.is_some());
    }

    #[tokio::test]
    async fn organization_invalidation_drops_all_entry_kinds() {
        let cache = TtlCache::new(100);
        let report = report_key(ReportKind::Timeseries, "org1", Some("site1"), 30, None);
        let realtime = realtime_key("org1", "site1");

        cache.insert(report.clone(), json!(1), TTL).await;
        cache.insert(realtime.clone(), json!(2), TTL).await;

        cache.invalidate_organization("org1").expect("invalidate");
        cache.sync().await;

        assert!(cache.get(&report).await.is_none());
        assert!(cache.get(&realtime).await.is_none());
    }
}
