//! Retrieval chunk - a contiguous slice of transcript used by RAG

use serde::{Deserialize, Serialize};

/// A retrieval-sized slice of a processed transcript
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptChunk {
    /// `{transcript_id}_{chunk_index}`
    pub chunk_id: String,
    pub transcript_id: String,
    /// Monotonic within the transcript
    pub chunk_index: usize,
    pub text: String,
    /// Most recent speaker up to the chunk boundary
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speaker: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subsection_title: Option<String>,
    pub word_count: usize,
    /// `ceil(chars / 4)` approximation used by the chunker
    pub token_estimate: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}
