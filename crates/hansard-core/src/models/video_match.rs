//! Video match - the best catalog recording found for one sitting

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A confident match between a transcript and a catalog video
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoMatch {
    pub transcript_id: String,
    pub video_id: String,
    /// Canonical watch URL
    pub url: String,
    pub title: String,
    pub duration_secs: u32,
    pub published_at: DateTime<Utc>,
    pub channel_id: String,
    /// Confidence in [0, 10]; matches below 5.0 are never persisted
    pub confidence_score: f64,
    /// Names of the scoring factors that actually fired
    pub match_criteria: Vec<String>,
    pub captions_available: bool,
    pub matched_at: DateTime<Utc>,
}

impl VideoMatch {
    #[must_use]
    pub fn watch_url(video_id: &str) -> String {
        format!("https://www.youtube.com/watch?v={video_id}")
    }
}
