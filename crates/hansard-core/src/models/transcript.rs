//! Processed transcript - the normalized form every downstream pipeline reads

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::section_type::SectionType;
use super::sitting_date::SittingDate;

/// One contiguous speech by a single speaker within a section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    /// Stable id `{transcript_id}-{index}`
    pub id: String,
    /// Speaker name; empty for narration
    pub speaker: String,
    /// Plain text: HTML stripped, entities decoded, whitespace collapsed
    pub text: String,
    /// Time heading in effect when the segment started, e.g. `1.30 pm`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    pub section_title: String,
    pub section_type: SectionType,
    pub page_number: i32,
    /// Monotonic across the whole transcript, not reset per section
    pub index: usize,
    pub word_count: usize,
    pub char_count: usize,
}

/// Normalized form of one sitting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedTranscript {
    pub transcript_id: String,
    /// Canonical ISO sitting date
    pub sitting_date: String,
    pub display_date: String,
    pub parliament_no: i64,
    pub session_no: i64,
    pub segments: Vec<Segment>,
    /// Unique speakers in order of first appearance
    pub speakers: Vec<String>,
    /// Unique section titles in document order
    pub topics: Vec<String>,
    pub attendance: Vec<String>,
    pub total_words: usize,
    pub processed_at: DateTime<Utc>,
}

impl ProcessedTranscript {
    /// Segment by its transcript-wide index
    #[must_use]
    pub fn segment(&self, index: usize) -> Option<&Segment> {
        self.segments.get(index)
    }

    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }
}

/// Build the stable transcript id for a sitting.
///
/// `{iso_date}-p{parliament_no}-s{session_no}` when both numbers are known,
/// `{iso_date}-sitting-1` otherwise. Deterministic for the same inputs.
#[must_use]
pub fn build_transcript_id(
    date: &SittingDate,
    parliament_no: Option<i64>,
    session_no: Option<i64>,
) -> String {
    match (parliament_no, session_no) {
        (Some(p), Some(s)) => format!("{}-p{p}-s{s}", date.iso()),
        _ => format!("{}-sitting-1", date.iso()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transcript_id_with_known_numbers() {
        let d = SittingDate::parse("02-07-2024").unwrap();
        assert_eq!(
            build_transcript_id(&d, Some(14), Some(3)),
            "2024-07-02-p14-s3"
        );
    }

    #[test]
    fn transcript_id_fallback_without_numbers() {
        let d = SittingDate::parse("2024-07-02").unwrap();
        assert_eq!(build_transcript_id(&d, None, Some(3)), "2024-07-02-sitting-1");
        assert_eq!(build_transcript_id(&d, None, None), "2024-07-02-sitting-1");
    }

    #[test]
    fn transcript_id_is_deterministic() {
        let d = SittingDate::parse("02-07-2024").unwrap();
        assert_eq!(
            build_transcript_id(&d, Some(14), Some(3)),
            build_transcript_id(&d, Some(14), Some(3))
        );
    }
}
