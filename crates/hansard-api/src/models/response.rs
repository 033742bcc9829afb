//! Response models for API endpoints

use serde::Serialize;
use utoipa::ToSchema;

/// Health and binding status
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    /// An LLM API key is configured (moment extraction and chat)
    pub llm_configured: bool,
    /// The native 768-dim embedding model loaded successfully
    pub native_embedder_loaded: bool,
    /// The remote embedding fallback can be used
    pub embedding_fallback_configured: bool,
    /// A video catalog API key is configured
    pub video_catalog_configured: bool,
    /// Root of the object store, KV cache, and vector index
    pub data_dir: String,
}

/// Per-item outcome of a batch operation; partial failures never fail the
/// request as a whole
#[derive(Debug, Serialize)]
pub struct BatchItem<T: Serialize> {
    pub transcript_id: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> BatchItem<T> {
    pub fn success(transcript_id: String, result: T) -> Self {
        Self {
            transcript_id,
            ok: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(transcript_id: String, error: impl ToString) -> Self {
        Self {
            transcript_id,
            ok: false,
            result: None,
            error: Some(error.to_string()),
        }
    }
}

/// `GET /api/moments/search` envelope
#[derive(Debug, Serialize)]
pub struct MomentSearchResponse {
    pub query: String,
    pub results: Vec<hansard_pipeline::moments::MomentSearchHit>,
    pub total: usize,
}
