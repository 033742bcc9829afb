//! Moment extraction pipeline
//!
//! A single prompt carries the whole transcript as `[i] speaker: text`
//! lines; the index markers are what ties every returned candidate back to
//! its segments. Candidates are rescored deterministically, filtered,
//! ranked, optionally embedded, then persisted and indexed.

pub mod scoring;

use std::collections::BTreeMap;

use chrono::Utc;
use hansard_core::{Moment, ProcessedTranscript};
use hansard_store::{keys, KvStore, VectorRecord, MOMENTS_TABLE};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::context::AppContext;
use crate::error::PipelineError;
use crate::ingest;
use crate::llm;
use crate::rag::embeddings;

/// Hard cap on `max_results`
pub const MAX_RESULTS_CAP: usize = 50;

#[derive(Debug, Clone, Deserialize)]
pub struct ExtractionCriteria {
    #[serde(default = "default_min_score")]
    pub min_score: f64,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default)]
    pub topics: Option<Vec<String>>,
    #[serde(default)]
    pub speakers: Option<Vec<String>>,
}

const fn default_min_score() -> f64 {
    5.0
}

const fn default_max_results() -> usize {
    20
}

impl Default for ExtractionCriteria {
    fn default() -> Self {
        Self {
            min_score: default_min_score(),
            max_results: default_max_results(),
            topics: None,
            speakers: None,
        }
    }
}

/// Candidate object as returned by the model
#[derive(Debug, Clone, Deserialize)]
pub struct RawCandidate {
    pub quote: String,
    pub speaker: String,
    pub why_viral: String,
    pub ai_score: f64,
    pub topic: String,
    pub emotional_tone: String,
    #[serde(default)]
    pub target_demographic: String,
    #[serde(default)]
    pub contains_jargon: bool,
    #[serde(default)]
    pub has_contradiction: bool,
    #[serde(default)]
    pub affects_everyday_life: bool,
    #[serde(default)]
    pub segment_indices: Vec<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionStats {
    pub total_candidates: usize,
    pub accepted: usize,
    pub by_topic: BTreeMap<String, usize>,
    pub by_speaker: BTreeMap<String, usize>,
    pub by_tone: BTreeMap<String, usize>,
    pub mean_score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub transcript_id: String,
    pub model: String,
    pub moments: Vec<Moment>,
    pub top_moment: Option<Moment>,
    pub stats: ExtractionStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_provider: Option<String>,
    pub processed_at: chrono::DateTime<Utc>,
}

/// Extract, rescore, rank, and persist moments for one transcript
pub async fn extract(
    ctx: &AppContext,
    transcript_id: &str,
    criteria: ExtractionCriteria,
) -> Result<ExtractionResult, PipelineError> {
    if let Some(cached) = ctx
        .kv
        .get_json::<ExtractionResult>(&KvStore::moments_key(transcript_id))
        .await?
    {
        return Ok(cached);
    }

    let transcript = ingest::get_transcript(ctx, transcript_id).await?;

    let (candidates, model) = if transcript.segments.is_empty() {
        (Vec::new(), ctx.config.extraction_model.clone())
    } else {
        let prompt = build_prompt(&transcript);
        let response = llm::chat_completion(
            &ctx.http,
            &ctx.config,
            &ctx.config.extraction_model,
            EXTRACTION_SYSTEM_PROMPT,
            &prompt,
            0.7,
            4000,
        )
        .await?;
        (parse_candidates(&response), ctx.config.extraction_model.clone())
    };

    let total_candidates = candidates.len();
    let mut moments = assemble_moments(&transcript, candidates, &criteria);

    let embedding_provider = if ctx.config.embed_moments && !moments.is_empty() {
        let quotes: Vec<String> = moments.iter().map(|m| m.quote.clone()).collect();
        match embeddings::embed_texts(ctx, &quotes).await {
            Ok((vectors, provider)) => {
                for (moment, vector) in moments.iter_mut().zip(vectors) {
                    moment.embedding = Some(vector);
                }
                Some(provider.as_str().to_string())
            }
            Err(e) => {
                // moments degrade to unembedded rather than being dropped
                warn!(transcript_id, error = %e, "Moment embedding failed");
                None
            }
        }
    } else {
        None
    };

    let stats = compute_stats(total_candidates, &moments);
    let result = ExtractionResult {
        transcript_id: transcript_id.to_string(),
        model,
        top_moment: moments.first().cloned(),
        moments,
        stats,
        embedding_provider: embedding_provider.clone(),
        processed_at: Utc::now(),
    };

    // the JSON artifact is the source of truth; its write is the only fatal one
    ctx.objects
        .put_json(&keys::moments(transcript_id), &result)
        .await?;

    index_moments(ctx, transcript_id, &result).await;
    ctx.kv_put_advisory(
        &KvStore::moments_key(transcript_id),
        &result,
        Some(ctx.config.moments_cache_ttl()),
    )
    .await;
    if let Some(provider) = &embedding_provider {
        ctx.kv_put_advisory(embeddings::MOMENTS_PROVIDER_KEY, provider, None)
            .await;
    }

    info!(
        transcript_id,
        candidates = result.stats.total_candidates,
        accepted = result.stats.accepted,
        "Extracted moments"
    );
    Ok(result)
}

/// One hit from the semantic moment search
#[derive(Debug, Clone, Serialize)]
pub struct MomentSearchHit {
    pub moment_id: String,
    pub transcript_id: String,
    pub quote: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speaker: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub virality_score: Option<f32>,
    pub score: f32,
}

/// Semantic search across every indexed moment.
///
/// The query is embedded with whichever provider built the moment index
/// (recorded at extraction time); without that marker the provider chain
/// decides.
pub async fn search_moments(
    ctx: &AppContext,
    query: &str,
    limit: usize,
) -> Result<Vec<MomentSearchHit>, PipelineError> {
    let query = query.trim();
    if query.is_empty() {
        return Err(PipelineError::BadRequest("search query must not be empty".into()));
    }

    let provider = ctx
        .kv
        .get_json::<String>(embeddings::MOMENTS_PROVIDER_KEY)
        .await?
        .and_then(|s| s.parse::<embeddings::EmbeddingProvider>().ok());

    let texts = vec![query.to_string()];
    let vector = match provider {
        Some(p) => embeddings::embed_with_provider(ctx, p, &texts).await?,
        None => embeddings::embed_texts(ctx, &texts).await?.0,
    }
    .into_iter()
    .next()
    .ok_or_else(|| PipelineError::Internal("empty query embedding".to_string()))?;

    let hits = ctx
        .vectors
        .search(MOMENTS_TABLE, &vector, limit.clamp(1, MAX_RESULTS_CAP), None)
        .await?;

    Ok(hits
        .into_iter()
        .map(|h| MomentSearchHit {
            moment_id: h.id,
            transcript_id: h.transcript_id,
            quote: h.text,
            speaker: h.speaker,
            topic: h.topic,
            virality_score: h.virality_score,
            score: h.score,
        })
        .collect())
}

/// Upsert embedded moments into the vector index; failures are logged, the
/// artifact already holds the data
async fn index_moments(ctx: &AppContext, transcript_id: &str, result: &ExtractionResult) {
    let records: Vec<VectorRecord> = result
        .moments
        .iter()
        .filter_map(|m| {
            m.embedding.as_ref().map(|embedding| VectorRecord {
                id: m.moment_id.clone(),
                transcript_id: transcript_id.to_string(),
                speaker: Some(m.speaker.clone()),
                topic: Some(m.topic.clone()),
                text: m.quote.clone(),
                chunk_index: m.segment_indices.first().copied().unwrap_or(0) as i32,
                section_title: Some(m.section_title.clone()),
                subsection_title: None,
                word_count: m.quote.split_whitespace().count() as i32,
                virality_score: Some(m.virality_score as f32),
                embedding: embedding.clone(),
            })
        })
        .collect();

    if records.is_empty() {
        return;
    }
    if let Err(e) = ctx
        .vectors
        .replace_transcript(MOMENTS_TABLE, transcript_id, &records)
        .await
    {
        warn!(transcript_id, error = %e, "Moment index upsert failed");
    }
}

const EXTRACTION_SYSTEM_PROMPT: &str = "You identify potentially viral moments in \
parliamentary transcripts for social media. Respond with a JSON array only, no prose. \
Each element must have: quote (verbatim, 15-300 characters), speaker, why_viral, \
ai_score (0-10), topic, emotional_tone, target_demographic, contains_jargon (bool), \
has_contradiction (bool), affects_everyday_life (bool), segment_indices (array of the \
[i] markers the quote spans).";

/// Full transcript as `[i] speaker: text` lines; the markers anchor
/// moment-to-segment traceability
#[must_use]
pub fn build_prompt(transcript: &ProcessedTranscript) -> String {
    let mut lines = Vec::with_capacity(transcript.segments.len() + 2);
    lines.push(format!(
        "Sitting of {} ({}). Find the most quotable moments.\n",
        transcript.sitting_date, transcript.display_date
    ));
    for segment in &transcript.segments {
        lines.push(format!(
            "[{}] {}: {}",
            segment.index, segment.speaker, segment.text
        ));
    }
    lines.join("\n")
}

/// Strip a wrapping markdown code fence, if any
#[must_use]
pub fn strip_code_fence(body: &str) -> &str {
    let trimmed = body.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // drop the info string ("json") on the opening fence line
    let rest = rest.split_once('\n').map_or("", |(_, tail)| tail);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Parse the model response. Individually invalid elements are dropped; an
/// unparseable response yields an empty set, never an error.
#[must_use]
pub fn parse_candidates(body: &str) -> Vec<RawCandidate> {
    let stripped = strip_code_fence(body);
    let Ok(values) = serde_json::from_str::<Vec<serde_json::Value>>(stripped) else {
        warn!("Moment response was not a JSON array; returning no candidates");
        return Vec::new();
    };

    values
        .into_iter()
        .filter_map(|v| serde_json::from_value::<RawCandidate>(v).ok())
        .filter(|c| {
            let len = c.quote.chars().count();
            (15..=300).contains(&len)
        })
        .collect()
}

/// Rescore, attach context, filter, and rank candidates into moments
#[must_use]
pub fn assemble_moments(
    transcript: &ProcessedTranscript,
    candidates: Vec<RawCandidate>,
    criteria: &ExtractionCriteria,
) -> Vec<Moment> {
    let mut moments: Vec<Moment> = candidates
        .into_iter()
        .filter_map(|c| candidate_to_moment(transcript, c))
        .filter(|m| m.virality_score >= criteria.min_score)
        .filter(|m| allow_listed(criteria.topics.as_deref(), &m.topic))
        .filter(|m| allow_listed(criteria.speakers.as_deref(), &m.speaker))
        .collect();

    moments.sort_by(|a, b| {
        b.virality_score
            .partial_cmp(&a.virality_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                b.ai_score
                    .partial_cmp(&a.ai_score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .then_with(|| {
                a.segment_indices
                    .first()
                    .copied()
                    .unwrap_or(usize::MAX)
                    .cmp(&b.segment_indices.first().copied().unwrap_or(usize::MAX))
            })
            .then_with(|| a.quote.len().cmp(&b.quote.len()))
    });

    moments.truncate(criteria.max_results.min(MAX_RESULTS_CAP).max(1));
    moments
}

fn allow_listed(allow: Option<&[String]>, value: &str) -> bool {
    allow.is_none_or(|list| list.iter().any(|a| a.eq_ignore_ascii_case(value)))
}

fn candidate_to_moment(transcript: &ProcessedTranscript, c: RawCandidate) -> Option<Moment> {
    // only indices that actually reference segments survive
    let mut indices: Vec<usize> = c
        .segment_indices
        .iter()
        .copied()
        .filter(|i| *i < transcript.segments.len())
        .collect();
    indices.sort_unstable();
    indices.dedup();
    if indices.is_empty() {
        return None;
    }

    let first = indices[0];
    let last = *indices.last()?;

    // single neighbouring segment on each side; empty at the boundaries
    let context_before = first
        .checked_sub(1)
        .and_then(|i| transcript.segment(i))
        .map(|s| s.text.clone())
        .unwrap_or_default();
    let context_after = transcript
        .segment(last + 1)
        .map(|s| s.text.clone())
        .unwrap_or_default();

    let first_segment = transcript.segment(first)?;
    let timestamp = match (
        first_segment.timestamp.as_deref(),
        transcript.segment(last).and_then(|s| s.timestamp.as_deref()),
    ) {
        (Some(a), Some(b)) if a != b => Some(format!("{a} - {b}")),
        (Some(a), _) => Some(a.to_string()),
        (None, Some(b)) => Some(b.to_string()),
        (None, None) => None,
    };

    let breakdown = scoring::score_candidate(
        &c.quote,
        &c.topic,
        &c.emotional_tone,
        c.ai_score,
        c.has_contradiction,
        c.affects_everyday_life,
    );

    Some(Moment {
        moment_id: Moment::new_id(),
        quote: c.quote,
        speaker: c.speaker,
        timestamp,
        context_before,
        context_after,
        virality_score: breakdown.final_score,
        ai_score: breakdown.ai_score,
        why_viral: c.why_viral,
        topic: c.topic,
        emotional_tone: c.emotional_tone,
        target_demographic: c.target_demographic,
        section_title: first_segment.section_title.clone(),
        transcript_id: transcript.transcript_id.clone(),
        segment_ids: indices
            .iter()
            .map(|i| format!("{}-{i}", transcript.transcript_id))
            .collect(),
        segment_indices: indices,
        embedding: None,
        created_at: Utc::now(),
    })
}

fn compute_stats(total_candidates: usize, moments: &[Moment]) -> ExtractionStats {
    let mut stats = ExtractionStats {
        total_candidates,
        accepted: moments.len(),
        ..ExtractionStats::default()
    };
    for m in moments {
        *stats.by_topic.entry(m.topic.clone()).or_insert(0) += 1;
        *stats.by_speaker.entry(m.speaker.clone()).or_insert(0) += 1;
        *stats.by_tone.entry(m.emotional_tone.clone()).or_insert(0) += 1;
    }
    if !moments.is_empty() {
        stats.mean_score =
            moments.iter().map(|m| m.virality_score).sum::<f64>() / moments.len() as f64;
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use hansard_core::{SectionType, Segment};

    fn transcript(texts: &[(&str, &str)]) -> ProcessedTranscript {
        let segments: Vec<Segment> = texts
            .iter()
            .enumerate()
            .map(|(i, (speaker, text))| Segment {
                id: format!("t1-{i}"),
                speaker: (*speaker).to_string(),
                text: (*text).to_string(),
                timestamp: Some("1.30 pm".to_string()),
                section_title: "Oral Answers".to_string(),
                section_type: SectionType::Oa,
                page_number: 1,
                index: i,
                word_count: text.split_whitespace().count(),
                char_count: text.chars().count(),
            })
            .collect();
        let speakers = segments.iter().map(|s| s.speaker.clone()).collect();
        ProcessedTranscript {
            transcript_id: "t1".to_string(),
            sitting_date: "2024-07-02".to_string(),
            display_date: "Tuesday, 2 July 2024".to_string(),
            parliament_no: 14,
            session_no: 3,
            segments,
            speakers,
            topics: vec!["Oral Answers".to_string()],
            attendance: Vec::new(),
            total_words: 0,
            processed_at: Utc::now(),
        }
    }

    fn candidate(quote: &str, indices: Vec<usize>) -> RawCandidate {
        RawCandidate {
            quote: quote.to_string(),
            speaker: "Minister".to_string(),
            why_viral: "blunt".to_string(),
            ai_score: 7.0,
            topic: "Healthcare".to_string(),
            emotional_tone: "defensive".to_string(),
            target_demographic: "general".to_string(),
            contains_jargon: false,
            has_contradiction: false,
            affects_everyday_life: true,
            segment_indices: indices,
        }
    }

    #[test]
    fn prompt_carries_index_markers() {
        let t = transcript(&[("A", "First remark."), ("B", "Second remark.")]);
        let prompt = build_prompt(&t);
        assert!(prompt.contains("[0] A: First remark."));
        assert!(prompt.contains("[1] B: Second remark."));
    }

    #[test]
    fn strips_json_code_fence() {
        let fenced = "```json\n[{\"a\": 1}]\n```";
        assert_eq!(strip_code_fence(fenced), "[{\"a\": 1}]");
        assert_eq!(strip_code_fence("[1, 2]"), "[1, 2]");
        assert_eq!(strip_code_fence("```\n[]\n```"), "[]");
    }

    #[test]
    fn invalid_candidates_are_dropped_individually() {
        let body = r#"[
            {"quote": "This quote is long enough to count as valid material.",
             "speaker": "A", "why_viral": "x", "ai_score": 8.0,
             "topic": "Housing", "emotional_tone": "angry",
             "segment_indices": [0]},
            {"quote": "too short", "speaker": "A", "why_viral": "x",
             "ai_score": 8.0, "topic": "Housing", "emotional_tone": "angry"},
            {"not_a_candidate": true}
        ]"#;
        let parsed = parse_candidates(body);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].speaker, "A");
    }

    #[test]
    fn unparseable_response_yields_empty_set() {
        assert!(parse_candidates("I could not find any moments.").is_empty());
        assert!(parse_candidates("").is_empty());
    }

    #[test]
    fn context_attaches_neighbouring_segments() {
        let t = transcript(&[
            ("A", "Before text."),
            ("B", "The quoted material that is long enough."),
            ("C", "After text."),
        ]);
        let moments = assemble_moments(
            &t,
            vec![candidate("The quoted material that is long enough.", vec![1])],
            &ExtractionCriteria { min_score: 0.0, ..ExtractionCriteria::default() },
        );
        assert_eq!(moments.len(), 1);
        assert_eq!(moments[0].context_before, "Before text.");
        assert_eq!(moments[0].context_after, "After text.");
        assert_eq!(moments[0].segment_ids, vec!["t1-1"]);
    }

    #[test]
    fn single_segment_transcript_has_empty_context() {
        let t = transcript(&[("A", "Lone segment, still long enough to quote.")]);
        let moments = assemble_moments(
            &t,
            vec![candidate("Lone segment, still long enough to quote.", vec![0])],
            &ExtractionCriteria { min_score: 0.0, ..ExtractionCriteria::default() },
        );
        assert_eq!(moments[0].context_before, "");
        assert_eq!(moments[0].context_after, "");
    }

    #[test]
    fn out_of_range_indices_drop_the_candidate() {
        let t = transcript(&[("A", "Only one segment here.")]);
        let moments = assemble_moments(
            &t,
            vec![candidate("A quote that points at nothing in the transcript.", vec![7])],
            &ExtractionCriteria { min_score: 0.0, ..ExtractionCriteria::default() },
        );
        assert!(moments.is_empty());
    }

    #[test]
    fn ranking_is_score_then_ai_then_position_then_length() {
        let t = transcript(&[("A", "One."), ("B", "Two."), ("C", "Three.")]);
        let mut early = candidate("An identical scoring quote for the tiebreak.", vec![0]);
        let mut late = candidate("An identical scoring quote for the tiebreak.", vec![2]);
        early.ai_score = 6.0;
        late.ai_score = 6.0;
        let moments = assemble_moments(
            &t,
            vec![late, early],
            &ExtractionCriteria { min_score: 0.0, ..ExtractionCriteria::default() },
        );
        assert_eq!(moments.len(), 2);
        assert_eq!(moments[0].segment_indices, vec![0]);
        assert_eq!(moments[1].segment_indices, vec![2]);
    }

    #[test]
    fn min_score_and_allow_lists_filter() {
        let t = transcript(&[("A", "One."), ("B", "Two.")]);
        let c = candidate("A quote that is long enough to pass the gate.", vec![0]);
        let kept = assemble_moments(
            &t,
            vec![c.clone()],
            &ExtractionCriteria {
                min_score: 0.0,
                topics: Some(vec!["healthcare".to_string()]),
                ..ExtractionCriteria::default()
            },
        );
        assert_eq!(kept.len(), 1);

        let filtered = assemble_moments(
            &t,
            vec![c.clone()],
            &ExtractionCriteria {
                min_score: 0.0,
                topics: Some(vec!["Defence".to_string()]),
                ..ExtractionCriteria::default()
            },
        );
        assert!(filtered.is_empty());

        let too_low = assemble_moments(
            &t,
            vec![c],
            &ExtractionCriteria { min_score: 9.9, ..ExtractionCriteria::default() },
        );
        assert!(too_low.is_empty());
    }

    #[test]
    fn extraction_is_stable_under_rerun() {
        let t = transcript(&[("A", "One."), ("B", "Two.")]);
        let run = || {
            assemble_moments(
                &t,
                vec![
                    candidate("First stable quote, long enough for the filter.", vec![0]),
                    candidate("Second stable quote, long enough for the filter.", vec![1]),
                ],
                &ExtractionCriteria { min_score: 0.0, ..ExtractionCriteria::default() },
            )
        };
        let a = run();
        let b = run();
        assert_eq!(a.len(), b.len());
        let key = |m: &Moment| {
            (
                m.quote.clone(),
                m.speaker.clone(),
                m.topic.clone(),
                m.virality_score.to_bits(),
            )
        };
        let ka: Vec<_> = a.iter().map(key).collect();
        let kb: Vec<_> = b.iter().map(key).collect();
        assert_eq!(ka, kb);
    }
}
