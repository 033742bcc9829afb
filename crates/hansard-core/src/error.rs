//! Core error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid sitting date: '{0}' (expected DD-MM-YYYY or YYYY-MM-DD)")]
    InvalidDate(String),

    #[error("Malformed hansard document: {0}")]
    MalformedSource(String),

    #[error("Transcript not found: {0}")]
    TranscriptNotFound(String),
}
