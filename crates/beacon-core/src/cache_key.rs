//! Reporting cache-key composition.
//!
//! Keys are colon-separated segments:
//! `v1:<report>:<org-id>:<website-id-or-all>:<days>[:<limit>]` and
//! `v1:realtime:<org-id>:<website-id>` for refresh-job snapshots. The
//! segment positions are load-bearing — invalidation matches on the org and
//! website segments rather than on a raw prefix, so org-wide ("all") entries
//! are dropped together with the per-website ones.

pub const CACHE_KEY_VERSION: &str = "v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Overview,
    Timeseries,
    TopPages,
}

impl ReportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportKind::Overview => "overview",
            ReportKind::Timeseries => "timeseries",
            ReportKind::TopPages => "top_pages",
        }
    }
}

pub fn report_key(
    kind: ReportKind,
    organization_id: &str,
    website_id: Option<&str>,
    days: u32,
    limit: Option<u32>,
) -> String {
    let website = website_id.unwrap_or("all");
    let mut key = format!(
        "{CACHE_KEY_VERSION}:{}:{organization_id}:{website}:{days}",
        kind.as_str()
    );
    if let Some(limit) = limit {
        key.push_str(&format!(":{limit}"));
    }
    key
}

pub fn realtime_key(organization_id: &str, website_id: &str) -> String {
    format!("{CACHE_KEY_VERSION}:realtime:{organization_id}:{website_id}")
}

/// True when `key` belongs to the given organization.
pub fn key_matches_organization(key: &str, organization_id: &str) -> bool {
    key.split(':').nth(2) == Some(organization_id)
}

/// True when `key` belongs to the given website, including the
/// organization's "all"-scope entries (stale once any member website's
/// aggregates change).
pub fn key_matches_website(key: &str, organization_id: &str, website_id: &str) -> bool {
    let mut parts = key.split(':');
    let org = parts.nth(2);
    let website = parts.next();
    org == Some(organization_id) && (website == Some(website_id) || website == Some("all"))
}
