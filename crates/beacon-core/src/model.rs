use serde::{Deserialize, Serialize};

/// A tracked tenant site. Rows are created by tenant management; this
/// service only ever reads them.
#[derive(Debug, Clone, Serialize)]
pub struct Website {
    pub id: String,
    pub organization_id: String,
    pub name: String,
    pub domain: String,
    pub is_active: bool,
    pub created_at: String,
}

/// `POST /api/track/session/start` body. Client metadata fields are
/// optional; anything absent is derived from the request transport.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionStartPayload {
    pub domain: String,
    pub session_id: String,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub country: Option<String>,
    pub browser: Option<String>,
    pub device_type: Option<String>,
}

/// `POST /api/track/pageview` body.
#[derive(Debug, Clone, Deserialize)]
pub struct PageviewPayload {
    pub domain: String,
    pub session_id: String,
    pub page_url: String,
    pub page_title: Option<String>,
    pub referrer: Option<String>,
    /// Page load time in milliseconds.
    pub load_time: Option<f64>,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}

/// `POST /api/track/event` body. `event_data` is an opaque JSON blob —
/// deliberately not validated against a schema so clients can evolve their
/// payloads without a server release.
#[derive(Debug, Clone, Deserialize)]
pub struct EventPayload {
    pub domain: String,
    pub session_id: String,
    pub event_name: String,
    pub event_data: Option<serde_json::Value>,
    pub page_url: Option<String>,
}

/// `POST /api/track/session/end` body.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionEndPayload {
    pub domain: String,
    pub session_id: String,
}

/// One item of a `POST /api/track/batch` request. Everything except `type`
/// is optional at the wire level; per-type required fields are enforced
/// item-by-item so one malformed item cannot reject its siblings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchItem {
    #[serde(rename = "type", default = "BatchItem::default_type")]
    pub item_type: String,
    pub domain: Option<String>,
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referrer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_data: Option<serde_json::Value>,
}

impl BatchItem {
    fn default_type() -> String {
        "pageview".to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Ok,
    Partial,
}

/// Per-item batch failure, tagged with the offending item.
#[derive(Debug, Clone, Serialize)]
pub struct BatchError {
    pub error: String,
    pub item: BatchItem,
}

/// Result of `batch_track`: `Partial` whenever at least one item failed.
#[derive(Debug, Serialize)]
pub struct BatchOutcome {
    pub status: BatchStatus,
    pub successful_count: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<BatchError>,
}

/// Normalized pageview fields handed to the storage layer. The timestamp is
/// assigned at write time, never taken from the client.
#[derive(Debug, Clone)]
pub struct PageviewFields {
    pub page_url: String,
    pub page_title: Option<String>,
    pub referrer: Option<String>,
    pub load_time: Option<f64>,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}

/// Normalized custom-event fields. `event_data` is already serialized to a
/// JSON string for storage.
#[derive(Debug, Clone)]
pub struct EventFields {
    pub event_name: String,
    pub event_data: Option<String>,
    pub page_url: Option<String>,
}
