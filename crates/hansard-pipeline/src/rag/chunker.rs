//! Transcript chunking with overlap
//!
//! Segment-wise traversal into ~500-token chunks with ~50 tokens of overlap
//! between consecutive chunks. Token counts are approximated as
//! `ceil(chars / 4)`. Segments are never split mid-word; a segment larger
//! than the budget becomes its own oversized chunk.

use hansard_core::{ProcessedTranscript, TranscriptChunk};

#[derive(Debug, Clone, Copy)]
pub struct ChunkParams {
    pub max_tokens: usize,
    pub overlap_tokens: usize,
    /// A trailing chunk with fewer new tokens than this is merged into its
    /// predecessor instead of being emitted on its own
    pub min_tokens: usize,
}

impl Default for ChunkParams {
    fn default() -> Self {
        Self {
            max_tokens: 500,
            overlap_tokens: 50,
            min_tokens: 100,
        }
    }
}

/// `ceil(chars / 4)` token approximation
#[must_use]
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

struct ChunkBuilder<'a> {
    transcript_id: &'a str,
    chunks: Vec<TranscriptChunk>,
}

impl ChunkBuilder<'_> {
    fn flush(
        &mut self,
        text: &str,
        speaker: Option<&str>,
        section_title: Option<&str>,
    ) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        let chunk_index = self.chunks.len();
        self.chunks.push(TranscriptChunk {
            chunk_id: format!("{}_{chunk_index}", self.transcript_id),
            transcript_id: self.transcript_id.to_string(),
            chunk_index,
            text: text.to_string(),
            speaker: speaker.map(ToString::to_string),
            section_title: section_title.map(ToString::to_string),
            subsection_title: None,
            word_count: text.split_whitespace().count(),
            token_estimate: estimate_tokens(text),
            embedding: None,
        });
    }
}

/// Chunk a processed transcript for embedding
#[must_use]
pub fn chunk_transcript(
    transcript: &ProcessedTranscript,
    params: ChunkParams,
) -> Vec<TranscriptChunk> {
    let mut builder = ChunkBuilder {
        transcript_id: &transcript.transcript_id,
        chunks: Vec::new(),
    };

    let mut buffer = String::new();
    // chars of overlap seed at the start of the buffer; everything after it
    // is material not yet emitted in any chunk
    let mut seed_chars = 0usize;
    let mut speaker: Option<String> = None;
    let mut section: Option<String> = None;

    for segment in &transcript.segments {
        // chunk text is segment text alone; attribution lives in the
        // chunk's speaker field
        let piece = segment.text.as_str();
        if piece.trim().is_empty() {
            continue;
        }

        let has_new_material = buffer.chars().count() > seed_chars;
        if has_new_material
            && estimate_tokens(&buffer) + estimate_tokens(piece) > params.max_tokens
        {
            builder.flush(&buffer, speaker.as_deref(), section.as_deref());
            buffer = overlap_tail(&buffer, params.overlap_tokens);
            seed_chars = buffer.chars().count();
        }

        if !buffer.is_empty() {
            buffer.push(' ');
        }
        buffer.push_str(piece);

        if !segment.speaker.is_empty() {
            speaker = Some(segment.speaker.clone());
        }
        section = Some(segment.section_title.clone());
    }

    // flush whatever holds unemitted material
    if buffer.chars().count() > seed_chars {
        let new_tokens = estimate_tokens(&buffer) - estimate_tokens(&buffer[..floor_char_boundary(&buffer, seed_chars)]);
        if new_tokens < params.min_tokens && !builder.chunks.is_empty() {
            // tiny tail: graft the new material onto the last chunk
            let tail: String = buffer.chars().skip(seed_chars).collect();
            if let Some(last) = builder.chunks.last_mut() {
                let tail = tail.trim();
                if !tail.is_empty() {
                    if !last.text.is_empty() {
                        last.text.push(' ');
                    }
                    last.text.push_str(tail);
                    last.word_count = last.text.split_whitespace().count();
                    last.token_estimate = estimate_tokens(&last.text);
                }
            }
        } else {
            builder.flush(&buffer, speaker.as_deref(), section.as_deref());
        }
    }

    builder.chunks
}

/// Trailing whole words of `text` amounting to roughly `overlap_tokens`
fn overlap_tail(text: &str, overlap_tokens: usize) -> String {
    if overlap_tokens == 0 {
        return String::new();
    }
    let words: Vec<&str> = text.split_whitespace().collect();
    let mut tail: Vec<&str> = Vec::new();
    let mut chars = 0usize;
    for word in words.iter().rev() {
        tail.push(word);
        chars += word.chars().count() + 1;
        if chars.div_ceil(4) >= overlap_tokens {
            break;
        }
    }
    tail.reverse();
    tail.join(" ")
}

/// Byte offset of the `n`-th char, clamped to the string end
fn floor_char_boundary(s: &str, n_chars: usize) -> usize {
    s.char_indices()
        .nth(n_chars)
        .map_or(s.len(), |(i, _)| i)
}
