//! Retrieval-augmented chat over embedded transcripts
//!
//! A session (one transcript) moves through three states: unknown, ready
//! (processed transcript persisted), and embedded (chunks upserted and the
//! `embedded:` marker set). Chat is admissible only in the embedded state.

pub mod chat;
pub mod chunker;
pub mod embeddings;
