//! Domain models

mod chunk;
mod moment;
mod raw;
mod section_type;
mod sitting_date;
mod transcript;
mod video_match;

pub use chunk::TranscriptChunk;
pub use moment::{Moment, ScoreBreakdown};
pub use raw::{AttendanceRecord, HansardMetadata, HansardSection, RawHansard};
pub use section_type::SectionType;
pub use sitting_date::SittingDate;
pub use transcript::{build_transcript_id, ProcessedTranscript, Segment};
pub use video_match::VideoMatch;
