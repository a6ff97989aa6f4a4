use thiserror::Error;

/// Failures on the tracking write path.
///
/// Every external-input-driven failure is converted to one of these variants
/// and returned as a value; nothing on the ingestion path is allowed to
/// panic. Duplicate-creation races are absorbed by upsert semantics at the
/// storage layer and never surface here.
#[derive(Debug, Error)]
pub enum TrackError {
    #[error("Website not found")]
    WebsiteNotFound,

    #[error("Session not found")]
    SessionNotFound,

    #[error("{0}")]
    Validation(String),

    /// Store-level failure (timeouts included — the caller treats them the
    /// same way). Aborts the current operation; batch jobs surface it to the
    /// scheduler, which logs and retries on its next tick.
    #[error("store error: {0}")]
    Store(#[from] anyhow::Error),
}

impl TrackError {
    /// True when the failure was caused by the client's input rather than
    /// the store, i.e. it maps to a 400-class response.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            TrackError::WebsiteNotFound | TrackError::SessionNotFound | TrackError::Validation(_)
        )
    }
}
