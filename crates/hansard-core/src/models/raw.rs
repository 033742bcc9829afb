//! Raw Hansard document - the upstream JSON, typed just enough to validate
//!
//! The upstream schema is loose; extra fields are ignored, missing required
//! fields fail validation. The validator lives here so every pipeline shares
//! one notion of "well-formed".

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreError;

/// Typed view over the upstream Hansard JSON
///
/// Ingestion persists the original `serde_json::Value` verbatim; this struct
/// is the validated projection the pipelines work with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawHansard {
    pub metadata: HansardMetadata,
    #[serde(rename = "takesSectionVOList", alias = "sections", default)]
    pub sections: Vec<HansardSection>,
    #[serde(rename = "attendanceList", alias = "attendance", default)]
    pub attendance: Vec<AttendanceRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HansardMetadata {
    /// Upstream spells this "parliment"
    #[serde(rename = "parlimentNO", alias = "parliamentNo")]
    pub parliament_no: i64,
    #[serde(rename = "sessionNO", alias = "sessionNo")]
    pub session_no: i64,
    #[serde(rename = "sittingDate")]
    pub sitting_date: String,
    #[serde(rename = "dateFull", alias = "displayDate")]
    pub display_date: String,
    #[serde(rename = "startTime", default)]
    pub start_time: Option<String>,
    #[serde(rename = "speaker", default)]
    pub speaker_of_house: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HansardSection {
    #[serde(rename = "pageNumber", alias = "page", default)]
    pub page_number: i32,
    #[serde(default)]
    pub title: String,
    #[serde(rename = "sectionType", alias = "type", default)]
    pub section_type: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceRecord {
    #[serde(rename = "mpName", alias = "name")]
    pub name: String,
    #[serde(rename = "attendance", alias = "present", default)]
    pub present: bool,
}

impl RawHansard {
    /// Validate the structural invariants of an upstream document.
    ///
    /// Checks: object shape, numeric parliament/session numbers, non-empty
    /// sitting date and display date, sections and attendance are arrays.
    pub fn validate(value: &Value) -> Result<Self, CoreError> {
        let obj = value
            .as_object()
            .ok_or_else(|| CoreError::MalformedSource("document is not a JSON object".into()))?;

        if !obj.contains_key("metadata") {
            return Err(CoreError::MalformedSource("missing metadata".into()));
        }

        let parsed: Self = serde_json::from_value(value.clone())
            .map_err(|e| CoreError::MalformedSource(e.to_string()))?;

        if parsed.metadata.sitting_date.trim().is_empty() {
            return Err(CoreError::MalformedSource("empty sitting date".into()));
        }
        if parsed.metadata.display_date.trim().is_empty() {
            return Err(CoreError::MalformedSource("empty display date".into()));
        }

        Ok(parsed)
    }

    /// True when a document looks like our own processed form rather than an
    /// upstream raw hansard. Feeding a processed transcript back into ingest
    /// is a caller error, not a malformed source.
    #[must_use]
    pub fn looks_like_processed(value: &Value) -> bool {
        value
            .as_object()
            .is_some_and(|o| o.contains_key("transcript_id") && o.contains_key("segments"))
    }
}
