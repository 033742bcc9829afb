//! Grounded question answering over an embedded session
//!
//! Retrieval is filtered to the session's transcript; the LLM is only called
//! when retrieval produced context. Generation failures after retrieval
//! degrade to a failure-shaped answer that still carries the citations.

use chrono::{DateTime, Utc};
use hansard_store::{KvStore, VectorHit, VectorIndex, VectorRecord, CHUNKS_TABLE};
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, warn};

use crate::context::AppContext;
use crate::error::PipelineError;
use crate::ingest;
use crate::llm;
use crate::rag::chunker::{self, ChunkParams};
use crate::rag::embeddings::{self, EmbeddingProvider};

pub const DEFAULT_TOP_K: usize = 5;
pub const MAX_TOP_K: usize = 10;

/// Answer returned when retrieval found nothing relevant; the LLM is not
/// consulted in that case
pub const NO_CONTEXT_ANSWER: &str = "I could not find anything relevant to that question in \
this sitting's transcript. It may concern a topic that was not raised in this sitting; try \
rephrasing, or ask about one of the sitting's topics.";

/// Answer used when generation failed after retrieval succeeded
pub const GENERATION_FAILED_ANSWER: &str = "The relevant transcript passages were found (see \
citations), but the answer could not be generated right now. Please retry shortly.";

const CHAT_SYSTEM_PROMPT: &str = "You answer questions about one Singapore Parliament sitting. \
Use ONLY the provided context passages. If the context does not contain the answer, say so \
plainly instead of guessing. Name the speakers when the context identifies them. Never invent \
facts, figures, or attributions. Quote directly only when a short phrase carries the point.";

/// Session readiness marker stored under `embedded:{transcript_id}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddedMarker {
    pub chunk_count: usize,
    pub embedded_at: DateTime<Utc>,
    pub provider: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbedOutcome {
    pub transcript_id: String,
    pub chunk_count: usize,
    pub provider: String,
    /// True when the session was already embedded and `force` was not set
    pub already_embedded: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub transcript_id: String,
    pub embedded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedded_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RagChatRequest {
    pub transcript_id: String,
    pub question: String,
    #[serde(default)]
    pub max_results: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Citation {
    /// Chunk text truncated to ~200 chars
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speaker: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section_title: Option<String>,
    /// Retrieval score in [0, 1]
    pub confidence: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatAnswer {
    pub transcript_id: String,
    pub question: String,
    pub answer: String,
    pub citations: Vec<Citation>,
    /// Which model generated the answer; absent when the LLM was not called
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default)]
    pub cached: bool,
}

/// Head of a streaming chat response, known before the body starts
#[derive(Debug, Clone)]
pub struct StreamHead {
    pub model: Option<String>,
    pub citations: Vec<Citation>,
}

/// Chunk, embed, and index one session's transcript.
///
/// A no-op when the session is already embedded, unless `force` is set.
pub async fn embed_session(
    ctx: &AppContext,
    transcript_id: &str,
    force: bool,
) -> Result<EmbedOutcome, PipelineError> {
    let marker_key = KvStore::embedded_key(transcript_id);

    if !force {
        if let Some(marker) = ctx.kv.get_json::<EmbeddedMarker>(&marker_key).await? {
            return Ok(EmbedOutcome {
                transcript_id: transcript_id.to_string(),
                chunk_count: marker.chunk_count,
                provider: marker.provider,
                already_embedded: true,
            });
        }
    }

    let transcript = ingest::get_transcript(ctx, transcript_id).await?;
    if transcript.segments.iter().all(|s| s.text.trim().is_empty()) {
        return Err(PipelineError::BadRequest(format!(
            "transcript {transcript_id} has no content to embed"
        )));
    }

    let chunks = chunker::chunk_transcript(&transcript, ChunkParams::default());
    if chunks.is_empty() {
        return Err(PipelineError::BadRequest(format!(
            "transcript {transcript_id} produced no chunks"
        )));
    }

    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let (vectors, provider) = embeddings::embed_texts(ctx, &texts).await?;

    let records: Vec<VectorRecord> = chunks
        .iter()
        .zip(vectors)
        .map(|(chunk, embedding)| VectorRecord {
            id: chunk.chunk_id.clone(),
            transcript_id: transcript_id.to_string(),
            speaker: chunk.speaker.clone(),
            topic: None,
            text: chunk.text.clone(),
            chunk_index: chunk.chunk_index as i32,
            section_title: chunk.section_title.clone(),
            subsection_title: chunk.subsection_title.clone(),
            word_count: chunk.word_count as i32,
            virality_score: None,
            embedding,
        })
        .collect();

    ctx.vectors
        .replace_transcript(CHUNKS_TABLE, transcript_id, &records)
        .await?;

    let marker = EmbeddedMarker {
        chunk_count: records.len(),
        embedded_at: Utc::now(),
        provider: provider.as_str().to_string(),
    };
    // the marker is session state, not an advisory cache: a failed write
    // must surface, otherwise chat would stay locked out silently
    ctx.kv.put_json(&marker_key, &marker, None).await?;

    info!(
        transcript_id,
        chunks = marker.chunk_count,
        provider = %provider,
        "Embedded session"
    );

    Ok(EmbedOutcome {
        transcript_id: transcript_id.to_string(),
        chunk_count: marker.chunk_count,
        provider: marker.provider,
        already_embedded: false,
    })
}

/// Readiness of one session
pub async fn session_status(
    ctx: &AppContext,
    transcript_id: &str,
) -> Result<SessionStatus, PipelineError> {
    let marker = ctx
        .kv
        .get_json::<EmbeddedMarker>(&KvStore::embedded_key(transcript_id))
        .await?;
    Ok(match marker {
        Some(m) => SessionStatus {
            transcript_id: transcript_id.to_string(),
            embedded: true,
            chunk_count: Some(m.chunk_count),
            embedded_at: Some(m.embedded_at),
            provider: Some(m.provider),
        },
        None => SessionStatus {
            transcript_id: transcript_id.to_string(),
            embedded: false,
            chunk_count: None,
            embedded_at: None,
            provider: None,
        },
    })
}

/// Embed the question with the session's provider and query the index.
/// `NotReady` when the session was never embedded.
async fn retrieve(
    ctx: &AppContext,
    transcript_id: &str,
    question: &str,
    top_k: usize,
) -> Result<Vec<VectorHit>, PipelineError> {
    let marker = ctx
        .kv
        .get_json::<EmbeddedMarker>(&KvStore::embedded_key(transcript_id))
        .await?
        .ok_or_else(|| {
            PipelineError::NotReady(format!(
                "session {transcript_id} is not embedded yet; call /embed-session first"
            ))
        })?;

    let provider: EmbeddingProvider = marker
        .provider
        .parse()
        .map_err(PipelineError::Internal)?;

    let query = embeddings::embed_with_provider(ctx, provider, &[question.to_string()])
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| PipelineError::Internal("empty query embedding".to_string()))?;

    Ok(ctx
        .vectors
        .search(
            CHUNKS_TABLE,
            &query,
            top_k,
            Some(VectorIndex::transcript_filter(transcript_id)),
        )
        .await?)
}

/// Labelled source block per retrieved chunk, highest score first
#[must_use]
pub fn build_context(hits: &[VectorHit]) -> String {
    let mut blocks = Vec::with_capacity(hits.len());
    for (i, hit) in hits.iter().enumerate() {
        let mut block = format!(
            "--- Source {} (Confidence: {:.1}%) ---\n[{}]\n",
            i + 1,
            f64::from(hit.score) * 100.0,
            hit.speaker.as_deref().unwrap_or("Unknown Speaker"),
        );
        if let Some(section) = hit.section_title.as_deref() {
            block.push_str(&format!("Section: {section}\n"));
        }
        block.push_str(&hit.text);
        blocks.push(block);
    }
    blocks.join("\n\n")
}

/// One citation per retrieved source, in retrieval-score order
#[must_use]
pub fn build_citations(hits: &[VectorHit]) -> Vec<Citation> {
    hits.iter()
        .map(|hit| Citation {
            text: truncate_chars(&hit.text, 200),
            speaker: hit.speaker.clone(),
            section_title: hit.section_title.clone(),
            confidence: hit.score,
        })
        .collect()
}

fn truncate_chars(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let truncated: String = s.chars().take(max_chars).collect();
    format!("{truncated}...")
}

fn question_hash(question: &str) -> String {
    let digest = Md5::digest(question.trim().to_lowercase().as_bytes());
    format!("{digest:x}")
}

fn user_prompt(question: &str, context: &str) -> String {
    format!(
        "QUESTION:\n{question}\n\nCONTEXT FROM THE SITTING TRANSCRIPT:\n{context}\n\n\
         Answer from the context only. Acknowledge gaps explicitly."
    )
}

const fn clamp_top_k(requested: Option<usize>) -> usize {
    match requested {
        Some(k) if k >= 1 => {
            if k > MAX_TOP_K {
                MAX_TOP_K
            } else {
                k
            }
        }
        _ => DEFAULT_TOP_K,
    }
}

/// Answer a question over an embedded session
pub async fn chat(ctx: &AppContext, req: RagChatRequest) -> Result<ChatAnswer, PipelineError> {
    let question = req.question.trim().to_string();
    if question.is_empty() {
        return Err(PipelineError::BadRequest("question must not be empty".into()));
    }
    let top_k = clamp_top_k(req.max_results);

    let cache_key = KvStore::answer_key(&req.transcript_id, &question_hash(&question));
    if let Some(mut cached) = ctx.kv.get_json::<ChatAnswer>(&cache_key).await? {
        cached.cached = true;
        return Ok(cached);
    }

    let hits = retrieve(ctx, &req.transcript_id, &question, top_k).await?;

    if hits.is_empty() {
        // nothing to ground on: answer without touching the LLM
        return Ok(ChatAnswer {
            transcript_id: req.transcript_id,
            question,
            answer: NO_CONTEXT_ANSWER.to_string(),
            citations: Vec::new(),
            model: None,
            cached: false,
        });
    }

    let context = build_context(&hits);
    let citations = build_citations(&hits);
    let prompt = user_prompt(&question, &context);

    let (answer, model) = match generate(ctx, &prompt).await {
        Ok(pair) => pair,
        Err(e) => {
            // retrieval succeeded; degrade instead of surfacing a bare 500
            warn!(transcript_id = %req.transcript_id, error = %e, "Answer generation failed");
            (GENERATION_FAILED_ANSWER.to_string(), None)
        }
    };

    let result = ChatAnswer {
        transcript_id: req.transcript_id.clone(),
        question,
        answer,
        citations,
        model,
        cached: false,
    };

    if result.model.is_some() {
        ctx.kv_put_advisory(&cache_key, &result, Some(ctx.config.answer_cache_ttl()))
            .await;
    }
    Ok(result)
}

type ModelAnswer = (String, Option<String>);

/// Primary model with fallback; records which one answered
async fn generate(ctx: &AppContext, prompt: &str) -> Result<ModelAnswer, PipelineError> {
    let primary = &ctx.config.chat_model;
    match llm::chat_completion(&ctx.http, &ctx.config, primary, CHAT_SYSTEM_PROMPT, prompt, 0.3, 500)
        .await
    {
        Ok(answer) => Ok((answer, Some(primary.clone()))),
        Err(PipelineError::Configuration(e)) => Err(PipelineError::Configuration(e)),
        Err(primary_err) => {
            let fallback = &ctx.config.chat_fallback_model;
            warn!("Primary chat model failed ({primary_err}), trying {fallback}");
            let answer = llm::chat_completion(
                &ctx.http,
                &ctx.config,
                fallback,
                CHAT_SYSTEM_PROMPT,
                prompt,
                0.3,
                500,
            )
            .await?;
            Ok((answer, Some(fallback.clone())))
        }
    }
}

/// Streaming variant: identical retrieval and context build, then a lazy
/// stream of text fragments. The head carries the model and citations so
/// the HTTP layer can emit them as headers before the body.
pub async fn chat_stream(
    ctx: &AppContext,
    req: RagChatRequest,
) -> Result<(StreamHead, ReceiverStream<Result<String, PipelineError>>), PipelineError> {
    let question = req.question.trim().to_string();
    if question.is_empty() {
        return Err(PipelineError::BadRequest("question must not be empty".into()));
    }
    let top_k = clamp_top_k(req.max_results);

    let hits = retrieve(ctx, &req.transcript_id, &question, top_k).await?;

    if hits.is_empty() {
        return Ok((
            StreamHead { model: None, citations: Vec::new() },
            single_fragment_stream(NO_CONTEXT_ANSWER),
        ));
    }

    let context = build_context(&hits);
    let citations = build_citations(&hits);
    let prompt = user_prompt(&question, &context);

    let primary = ctx.config.chat_model.clone();
    match llm::chat_completion_stream(
        &ctx.http,
        &ctx.config,
        &primary,
        CHAT_SYSTEM_PROMPT,
        &prompt,
        0.3,
        500,
    )
    .await
    {
        Ok(stream) => Ok((
            StreamHead { model: Some(primary), citations },
            stream,
        )),
        Err(PipelineError::Configuration(e)) => Err(PipelineError::Configuration(e)),
        Err(primary_err) => {
            let fallback = ctx.config.chat_fallback_model.clone();
            warn!("Primary chat model failed ({primary_err}), streaming from {fallback}");
            match llm::chat_completion_stream(
                &ctx.http,
                &ctx.config,
                &fallback,
                CHAT_SYSTEM_PROMPT,
                &prompt,
                0.3,
                500,
            )
            .await
            {
                Ok(stream) => Ok((
                    StreamHead { model: Some(fallback), citations },
                    stream,
                )),
                Err(e) => {
                    warn!(error = %e, "Fallback chat model failed too");
                    Ok((
                        StreamHead { model: None, citations },
                        single_fragment_stream(GENERATION_FAILED_ANSWER),
                    ))
                }
            }
        }
    }
}

fn single_fragment_stream(text: &str) -> ReceiverStream<Result<String, PipelineError>> {
    let (tx, rx) = tokio::sync::mpsc::channel(1);
    // capacity 1: the send always succeeds, then the sender drops
    let _ = tx.try_send(Ok(text.to_string()));
    ReceiverStream::new(rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(text: &str, speaker: Option<&str>, score: f32) -> VectorHit {
        VectorHit {
            id: "t1_0".to_string(),
            transcript_id: "t1".to_string(),
            speaker: speaker.map(ToString::to_string),
            topic: None,
            text: text.to_string(),
            chunk_index: 0,
            section_title: Some("Oral Answers".to_string()),
            subsection_title: None,
            word_count: text.split_whitespace().count() as i32,
            virality_score: None,
            score,
        }
    }

    #[test]
    fn context_blocks_are_labelled_with_confidence() {
        let hits = vec![
            hit("First passage.", Some("Minister"), 0.92),
            hit("Second passage.", None, 0.4),
        ];
        let context = build_context(&hits);
        assert!(context.contains("--- Source 1 (Confidence: 92.0%) ---"));
        assert!(context.contains("[Minister]"));
        assert!(context.contains("--- Source 2 (Confidence: 40.0%) ---"));
        assert!(context.contains("[Unknown Speaker]"));
        assert!(context.contains("Section: Oral Answers"));
    }

    #[test]
    fn citations_mirror_hits_in_order() {
        let hits = vec![
            hit("High scoring passage.", Some("A"), 0.9),
            hit("Lower scoring passage.", Some("B"), 0.5),
        ];
        let citations = build_citations(&hits);
        assert_eq!(citations.len(), 2);
        assert_eq!(citations[0].speaker.as_deref(), Some("A"));
        assert!((citations[0].confidence - 0.9).abs() < 1e-6);
        assert!((citations[1].confidence - 0.5).abs() < 1e-6);
    }

    #[test]
    fn citation_text_is_truncated() {
        let long = "x".repeat(400);
        let citations = build_citations(&[hit(&long, None, 0.7)]);
        assert!(citations[0].text.chars().count() <= 203);
        assert!(citations[0].text.ends_with("..."));
    }

    #[test]
    fn question_hash_normalizes_case_and_whitespace() {
        assert_eq!(question_hash("What about COE?"), question_hash(" what about coe? "));
        assert_ne!(question_hash("a"), question_hash("b"));
    }

    #[test]
    fn top_k_clamps_to_bounds() {
        assert_eq!(clamp_top_k(None), DEFAULT_TOP_K);
        assert_eq!(clamp_top_k(Some(0)), DEFAULT_TOP_K);
        assert_eq!(clamp_top_k(Some(3)), 3);
        assert_eq!(clamp_top_k(Some(99)), MAX_TOP_K);
    }

    #[tokio::test]
    async fn chat_on_unembedded_session_is_not_ready() {
        let (_dir, ctx) = crate::test_support::test_context();
        let err = chat(
            &ctx,
            RagChatRequest {
                transcript_id: "never-embedded".to_string(),
                question: "What happened?".to_string(),
                max_results: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, PipelineError::NotReady(_)));
    }

    #[tokio::test]
    async fn empty_question_is_rejected() {
        let (_dir, ctx) = crate::test_support::test_context();
        let err = chat(
            &ctx,
            RagChatRequest {
                transcript_id: "t1".to_string(),
                question: "   ".to_string(),
                max_results: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, PipelineError::BadRequest(_)));
    }

    #[tokio::test]
    async fn embed_refuses_empty_transcript() {
        use crate::ingest::{ingest, IngestRequest};
        let (_dir, ctx) = crate::test_support::test_context();
        let raw = serde_json::json!({
            "metadata": {
                "parlimentNO": 14, "sessionNO": 3,
                "sittingDate": "02-07-2024", "dateFull": "Tuesday, 2 July 2024"
            },
            "takesSectionVOList": [],
            "attendanceList": []
        });
        let result = ingest(
            &ctx,
            IngestRequest { raw_hansard: Some(raw), ..IngestRequest::default() },
        )
        .await
        .unwrap();

        let err = embed_session(&ctx, &result.transcript_id, false)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::BadRequest(_)));
    }

    #[tokio::test]
    async fn session_status_reflects_marker() {
        let (_dir, ctx) = crate::test_support::test_context();
        let status = session_status(&ctx, "t1").await.unwrap();
        assert!(!status.embedded);

        let marker = EmbeddedMarker {
            chunk_count: 4,
            embedded_at: Utc::now(),
            provider: "native".to_string(),
        };
        ctx.kv
            .put_json(&KvStore::embedded_key("t1"), &marker, None)
            .await
            .unwrap();

        let status = session_status(&ctx, "t1").await.unwrap();
        assert!(status.embedded);
        assert_eq!(status.chunk_count, Some(4));
        assert_eq!(status.provider.as_deref(), Some("native"));
    }

    #[tokio::test]
    async fn already_embedded_session_is_a_noop_without_force() {
        let (_dir, ctx) = crate::test_support::test_context();
        let marker = EmbeddedMarker {
            chunk_count: 7,
            embedded_at: Utc::now(),
            provider: "fallback".to_string(),
        };
        ctx.kv
            .put_json(&KvStore::embedded_key("t9"), &marker, None)
            .await
            .unwrap();

        let outcome = embed_session(&ctx, "t9", false).await.unwrap();
        assert!(outcome.already_embedded);
        assert_eq!(outcome.chunk_count, 7);
    }
}
