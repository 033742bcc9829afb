//! Pipeline error taxonomy
//!
//! Each variant maps to exactly one HTTP status in the API layer.

use hansard_core::CoreError;
use hansard_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    /// Chat requested on a session that has not been embedded yet
    #[error("{0}")]
    NotReady(String),

    /// External service failed after the retry budget
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// External quota exhausted; carries a retry-after hint when known
    #[error("Rate limited: {message}")]
    RateLimit {
        message: String,
        retry_after_secs: Option<u64>,
    },

    /// Upstream payload failed the structural invariants
    #[error("Malformed source: {0}")]
    MalformedSource(String),

    /// A required provider credential or binding is absent
    #[error("Missing configuration: {0}")]
    Configuration(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<CoreError> for PipelineError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::InvalidDate(_) => Self::BadRequest(e.to_string()),
            CoreError::MalformedSource(_) => Self::MalformedSource(e.to_string()),
            CoreError::TranscriptNotFound(_) => Self::NotFound(e.to_string()),
        }
    }
}

impl PipelineError {
    /// Map a store read error so that a missing object surfaces as 404
    /// instead of a 500
    #[must_use]
    pub fn from_store_read(e: StoreError, what: &str) -> Self {
        if e.is_not_found() {
            Self::NotFound(format!("{what} not found"))
        } else {
            Self::Store(e)
        }
    }
}
