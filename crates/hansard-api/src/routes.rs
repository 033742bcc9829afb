//! Route handlers

mod chat;
mod health;
mod ingest;
mod moments;
mod transcripts;
mod video;

pub use chat::{bulk_embed, chat, chat_stream, embed_session, session_status};
pub use health::health;
pub use health::__path_health;
pub use ingest::ingest_hansard;
pub use moments::{analyze_moment, batch_extract, extract_moments, search_moments};
pub use moments::__path_search_moments;
pub use transcripts::get_transcript;
pub use transcripts::__path_get_transcript;
pub use video::{find_timestamp, get_video_match, match_video};
