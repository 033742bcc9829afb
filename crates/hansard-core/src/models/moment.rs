//! Moment - a segment deemed socially quotable by the scoring pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A candidate viral moment extracted from one transcript
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Moment {
    pub moment_id: String,
    /// 15-300 characters, enforced at candidate acceptance
    pub quote: String,
    pub speaker: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    /// Concatenation of the 1-2 neighbouring segments before the quote
    pub context_before: String,
    pub context_after: String,
    /// Deterministic composite score in [0, 10]
    pub virality_score: f64,
    /// The model's own score before rescoring, in [0, 10]
    pub ai_score: f64,
    pub why_viral: String,
    pub topic: String,
    pub emotional_tone: String,
    pub target_demographic: String,
    pub section_title: String,
    pub transcript_id: String,
    /// Originating segment ids within the source transcript
    pub segment_ids: Vec<String>,
    pub segment_indices: Vec<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    pub created_at: DateTime<Utc>,
}

impl Moment {
    /// Fresh moment id; v7 so ids sort by creation time
    #[must_use]
    pub fn new_id() -> String {
        Uuid::now_v7().to_string()
    }
}

/// Factor breakdown of one deterministic rescore
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub ai_score: f64,
    /// Fraction of the jargon vocabulary present, saturated to [0, 1]
    pub jargon_density: f64,
    pub contradiction: bool,
    /// Word-count sweet-spot factor in [0, 1]
    pub quotability: f64,
    pub everyday_impact: bool,
    /// Emotional-tone factor in [0, 1]
    pub emotion: f64,
    /// Weighted composite, capped at 10
    pub final_score: f64,
}
