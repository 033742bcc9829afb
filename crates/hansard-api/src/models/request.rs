//! Request bodies

use hansard_pipeline::moments::ExtractionCriteria;
use serde::Deserialize;
use utoipa::IntoParams;

/// `POST /api/moments/extract`
#[derive(Debug, Deserialize)]
pub struct ExtractBody {
    pub transcript_id: String,
    #[serde(flatten)]
    pub criteria: ExtractionCriteria,
}

/// `POST /api/moments/analyze` - one candidate for a deterministic rescore
#[derive(Debug, Deserialize)]
pub struct AnalyzeBody {
    pub quote: String,
    #[serde(default)]
    pub topic: String,
    #[serde(default = "default_tone")]
    pub emotional_tone: String,
    #[serde(default = "default_ai_score")]
    pub ai_score: f64,
    #[serde(default)]
    pub has_contradiction: bool,
    #[serde(default)]
    pub affects_everyday_life: bool,
}

fn default_tone() -> String {
    "neutral".to_string()
}

const fn default_ai_score() -> f64 {
    5.0
}

/// `POST /api/moments/batch`
#[derive(Debug, Deserialize)]
pub struct BatchExtractBody {
    pub transcript_ids: Vec<String>,
    #[serde(flatten)]
    pub criteria: ExtractionCriteria,
}

/// `GET /api/moments/search`
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MomentSearchQuery {
    /// Free-text search query
    pub q: String,
    /// Maximum hits to return (default 10, cap 50)
    #[serde(default)]
    pub limit: Option<usize>,
}

/// `POST /api/video/find-timestamp`
#[derive(Debug, Deserialize)]
pub struct FindTimestampBody {
    pub transcript_id: String,
    pub quote: String,
}

/// `POST /embed-session` and `POST /bulk-embed` items accept either a
/// transcript id or a sitting date
#[derive(Debug, Deserialize)]
pub struct EmbedSessionBody {
    #[serde(default)]
    pub transcript_id: Option<String>,
    #[serde(default)]
    pub sitting_date: Option<String>,
    #[serde(default)]
    pub force: bool,
}

/// `POST /bulk-embed`
#[derive(Debug, Deserialize)]
pub struct BulkEmbedBody {
    pub transcript_ids: Vec<String>,
    #[serde(default)]
    pub force: bool,
}
