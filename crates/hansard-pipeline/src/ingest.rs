//! Ingestion pipeline: raw Hansard in, processed transcript out
//!
//! Exactly one of the three input forms (sitting date, inline raw document,
//! raw URL) must be supplied. The raw document is persisted verbatim, the
//! processed form is the normalized transcript every downstream pipeline
//! reads. Idempotent per `transcript_id`, modulo the processing timestamp.

use std::time::Instant;

use chrono::Utc;
use hansard_core::{
    build_transcript_id, ProcessedTranscript, RawHansard, Segment, SittingDate,
};
use hansard_store::{keys, KvStore};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::context::AppContext;
use crate::error::PipelineError;
use crate::fetch;
use crate::parser;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IngestRequest {
    pub sitting_date: Option<String>,
    pub raw_hansard: Option<Value>,
    pub raw_url: Option<String>,
    pub transcript_id: Option<String>,
    #[serde(default)]
    pub skip_store: bool,
    #[serde(default)]
    pub force_refresh: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestResult {
    pub transcript_id: String,
    pub sitting_date: String,
    pub display_date: String,
    pub speakers: Vec<String>,
    pub topics: Vec<String>,
    pub segment_count: usize,
    pub total_words: usize,
    pub cached: bool,
    pub processing_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_uri: Option<String>,
}

/// Ingest one sitting
pub async fn ingest(ctx: &AppContext, req: IngestRequest) -> Result<IngestResult, PipelineError> {
    let started = Instant::now();

    let supplied = [
        req.sitting_date.is_some(),
        req.raw_hansard.is_some(),
        req.raw_url.is_some(),
    ]
    .iter()
    .filter(|b| **b)
    .count();
    if supplied != 1 {
        return Err(PipelineError::BadRequest(
            "exactly one of sitting_date, raw_hansard, raw_url must be supplied".to_string(),
        ));
    }

    let mut cached = false;

    let raw_value: Value = if let Some(date_str) = req.sitting_date.as_deref() {
        let date = SittingDate::parse(date_str)?;
        let cache_key = KvStore::raw_hansard_key(&date.iso());

        let hit = if req.force_refresh {
            None
        } else {
            ctx.kv.get_json::<Value>(&cache_key).await?
        };

        match hit {
            Some(v) => {
                cached = true;
                v
            }
            None => {
                let url = fetch::hansard_report_url(&ctx.config.hansard_base_url, &date.dmy());
                fetch::fetch_json(&ctx.http, &ctx.config, &url).await?
            }
        }
    } else if let Some(url) = req.raw_url.as_deref() {
        fetch::fetch_json(&ctx.http, &ctx.config, url).await?
    } else {
        // presence checked above
        req.raw_hansard.clone().unwrap_or_default()
    };

    if RawHansard::looks_like_processed(&raw_value) {
        return Err(PipelineError::BadRequest(
            "a processed transcript is not a valid ingest source; supply the raw hansard"
                .to_string(),
        ));
    }
    let raw = RawHansard::validate(&raw_value)?;

    // canonical date: prefer the document's own metadata, fall back to the
    // requested date when the metadata form is unparseable
    let date = match SittingDate::parse(&raw.metadata.sitting_date) {
        Ok(d) => d,
        Err(_) => req
            .sitting_date
            .as_deref()
            .and_then(|s| SittingDate::parse(s).ok())
            .ok_or_else(|| {
                PipelineError::MalformedSource(format!(
                    "unparseable sitting date '{}'",
                    raw.metadata.sitting_date
                ))
            })?,
    };

    let transcript_id = req.transcript_id.clone().unwrap_or_else(|| {
        build_transcript_id(
            &date,
            Some(raw.metadata.parliament_no),
            Some(raw.metadata.session_no),
        )
    });

    let (yyyy, mm, dd) = date.partition();
    let raw_key = keys::raw_hansard(&yyyy, &mm, &dd, &transcript_id);
    let processed_key = keys::processed_transcript(&transcript_id);

    // processed-form cache short-circuits the whole pipeline
    if !req.force_refresh {
        if let Some(existing) = ctx
            .kv
            .get_json::<ProcessedTranscript>(&KvStore::processed_key(&transcript_id))
            .await?
        {
            return Ok(result_from(
                &existing,
                true,
                started,
                Some(format!("store://{raw_key}")),
                Some(format!("store://{processed_key}")),
            ));
        }
    }

    let transcript = process_raw(&raw, &transcript_id, &date);

    let (raw_uri, processed_uri) = if req.skip_store {
        (None, None)
    } else {
        let (raw_write, processed_write) = tokio::join!(
            ctx.objects.put_json(&raw_key, &raw_value),
            ctx.objects.put_json(&processed_key, &transcript),
        );
        (Some(raw_write?), Some(processed_write?))
    };

    // advisory cache refresh: raw, processed, and the date -> id alias
    ctx.kv_put_advisory(
        &KvStore::raw_hansard_key(&date.iso()),
        &raw_value,
        Some(ctx.config.raw_cache_ttl()),
    )
    .await;
    ctx.kv_put_advisory(
        &KvStore::processed_key(&transcript_id),
        &transcript,
        Some(ctx.config.processed_cache_ttl()),
    )
    .await;
    ctx.kv_put_advisory(&KvStore::by_date_key(&date.iso()), &transcript_id, None)
        .await;

    info!(
        transcript_id = %transcript.transcript_id,
        segments = transcript.segments.len(),
        speakers = transcript.speakers.len(),
        "Ingested sitting"
    );

    Ok(result_from(&transcript, cached, started, raw_uri, processed_uri))
}

/// Normalize a validated raw document into the processed transcript
#[must_use]
pub fn process_raw(
    raw: &RawHansard,
    transcript_id: &str,
    date: &SittingDate,
) -> ProcessedTranscript {
    let mut segments: Vec<Segment> = Vec::new();

    for section in &raw.sections {
        let section_type = section.section_type.parse().unwrap_or_default();
        for parsed in parser::parse_section_html(&section.content) {
            let index = segments.len();
            segments.push(Segment {
                id: format!("{transcript_id}-{index}"),
                speaker: parsed.speaker,
                text: parsed.text.clone(),
                timestamp: parsed.timestamp,
                section_title: section.title.clone(),
                section_type,
                page_number: section.page_number,
                index,
                word_count: parsed.text.split_whitespace().count(),
                char_count: parsed.text.chars().count(),
            });
        }
    }

    let mut speakers: Vec<String> = Vec::new();
    for s in &segments {
        if !s.speaker.is_empty() && !speakers.contains(&s.speaker) {
            speakers.push(s.speaker.clone());
        }
    }

    let mut topics: Vec<String> = Vec::new();
    for section in &raw.sections {
        if !section.title.is_empty() && !topics.contains(&section.title) {
            topics.push(section.title.clone());
        }
    }

    let total_words = segments.iter().map(|s| s.word_count).sum();

    ProcessedTranscript {
        transcript_id: transcript_id.to_string(),
        sitting_date: date.iso(),
        display_date: raw.metadata.display_date.clone(),
        parliament_no: raw.metadata.parliament_no,
        session_no: raw.metadata.session_no,
        segments,
        speakers,
        topics,
        attendance: raw
            .attendance
            .iter()
            .filter(|a| a.present)
            .map(|a| a.name.clone())
            .collect(),
        total_words,
        processed_at: Utc::now(),
    }
}

fn result_from(
    transcript: &ProcessedTranscript,
    cached: bool,
    started: Instant,
    raw_uri: Option<String>,
    processed_uri: Option<String>,
) -> IngestResult {
    IngestResult {
        transcript_id: transcript.transcript_id.clone(),
        sitting_date: transcript.sitting_date.clone(),
        display_date: transcript.display_date.clone(),
        speakers: transcript.speakers.clone(),
        topics: transcript.topics.clone(),
        segment_count: transcript.segments.len(),
        total_words: transcript.total_words,
        cached,
        processing_ms: started.elapsed().as_millis() as u64,
        raw_uri,
        processed_uri,
    }
}

/// Read a processed transcript straight from the object store
pub async fn get_transcript(
    ctx: &AppContext,
    transcript_id: &str,
) -> Result<ProcessedTranscript, PipelineError> {
    ctx.objects
        .get_json(&keys::processed_transcript(transcript_id))
        .await
        .map_err(|e| PipelineError::from_store_read(e, "transcript"))
}

/// Resolve a session path parameter to a transcript id.
///
/// Accepts either a transcript id verbatim or a sitting date, which is
/// resolved through the `transcript:by_date` alias written at ingest time.
pub async fn resolve_transcript_id(
    ctx: &AppContext,
    param: &str,
) -> Result<Option<String>, PipelineError> {
    if let Ok(date) = SittingDate::parse(param) {
        return Ok(ctx
            .kv
            .get_json::<String>(&KvStore::by_date_key(&date.iso()))
            .await?);
    }
    Ok(Some(param.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_context;
    use serde_json::json;

    fn canonical_raw() -> Value {
        json!({
            "metadata": {
                "parlimentNO": 14,
                "sessionNO": 3,
                "sittingDate": "02-07-2024",
                "dateFull": "Tuesday, 2 July 2024"
            },
            "takesSectionVOList": [{
                "pageNumber": 12,
                "title": "Oral Answers to Questions",
                "sectionType": "OA",
                "content": "<h6>1.30 pm</h6>\
                    <p><strong>Speaker A:</strong> Hello world.</p>\
                    <p>Continuing remark.</p>\
                    <p><strong>Speaker B:</strong> Reply.</p>"
            }],
            "attendanceList": [
                {"mpName": "Speaker A", "attendance": true},
                {"mpName": "Speaker C", "attendance": false}
            ]
        })
    }

    #[tokio::test]
    async fn canonical_ingest_reconstructs_segments() {
        let (_dir, ctx) = test_context();
        let result = ingest(
            &ctx,
            IngestRequest {
                raw_hansard: Some(canonical_raw()),
                ..IngestRequest::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(result.transcript_id, "2024-07-02-p14-s3");
        assert_eq!(result.sitting_date, "2024-07-02");
        assert_eq!(result.segment_count, 2);
        assert_eq!(result.speakers, vec!["Speaker A", "Speaker B"]);
        assert!(!result.cached);

        let transcript = get_transcript(&ctx, "2024-07-02-p14-s3").await.unwrap();
        let first = &transcript.segments[0];
        assert_eq!(first.id, "2024-07-02-p14-s3-0");
        assert_eq!(first.speaker, "Speaker A");
        assert_eq!(first.text, "Hello world. Continuing remark.");
        assert_eq!(first.timestamp.as_deref(), Some("1.30 pm"));
        assert_eq!(first.word_count, 4);
        let second = &transcript.segments[1];
        assert_eq!(second.id, "2024-07-02-p14-s3-1");
        assert_eq!(second.speaker, "Speaker B");
        assert_eq!(second.text, "Reply.");
        assert_eq!(second.timestamp.as_deref(), Some("1.30 pm"));
        assert_eq!(second.word_count, 1);
        assert_eq!(transcript.attendance, vec!["Speaker A"]);
    }

    #[tokio::test]
    async fn refetch_by_date_hits_cache_without_upstream() {
        let (_dir, mut ctx) = test_context();
        // unroutable base URL: any real fetch attempt would error out
        ctx.config.hansard_base_url = "http://127.0.0.1:1/hansard".to_string();

        ingest(
            &ctx,
            IngestRequest {
                raw_hansard: Some(canonical_raw()),
                ..IngestRequest::default()
            },
        )
        .await
        .unwrap();

        let result = ingest(
            &ctx,
            IngestRequest {
                sitting_date: Some("02-07-2024".to_string()),
                ..IngestRequest::default()
            },
        )
        .await
        .unwrap();
        assert!(result.cached);

        // raw cache path: drop the processed cache and reprocess from raw
        ctx.kv
            .delete(&KvStore::processed_key("2024-07-02-p14-s3"))
            .await
            .unwrap();
        let result = ingest(
            &ctx,
            IngestRequest {
                sitting_date: Some("02-07-2024".to_string()),
                ..IngestRequest::default()
            },
        )
        .await
        .unwrap();
        assert!(result.cached);
        assert_eq!(result.segment_count, 2);
    }

    #[tokio::test]
    async fn rejects_processed_form_as_input() {
        let (_dir, ctx) = test_context();
        let first = ingest(
            &ctx,
            IngestRequest {
                raw_hansard: Some(canonical_raw()),
                ..IngestRequest::default()
            },
        )
        .await
        .unwrap();

        let processed: Value = ctx
            .objects
            .get_json(&keys::processed_transcript(&first.transcript_id))
            .await
            .unwrap();
        let err = ingest(
            &ctx,
            IngestRequest {
                raw_hansard: Some(processed),
                ..IngestRequest::default()
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, PipelineError::BadRequest(_)));
    }

    #[tokio::test]
    async fn rejects_zero_or_two_input_forms() {
        let (_dir, ctx) = test_context();
        let err = ingest(&ctx, IngestRequest::default()).await.unwrap_err();
        assert!(matches!(err, PipelineError::BadRequest(_)));

        let err = ingest(
            &ctx,
            IngestRequest {
                sitting_date: Some("02-07-2024".to_string()),
                raw_hansard: Some(canonical_raw()),
                ..IngestRequest::default()
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, PipelineError::BadRequest(_)));
    }

    #[tokio::test]
    async fn rejects_invalid_date() {
        let (_dir, ctx) = test_context();
        let err = ingest(
            &ctx,
            IngestRequest {
                sitting_date: Some("2024/07/02".to_string()),
                ..IngestRequest::default()
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, PipelineError::BadRequest(_)));
    }

    #[tokio::test]
    async fn empty_transcript_ingests_with_zero_segments() {
        let (_dir, ctx) = test_context();
        let mut raw = canonical_raw();
        raw["takesSectionVOList"] = json!([]);
        let result = ingest(
            &ctx,
            IngestRequest {
                raw_hansard: Some(raw),
                ..IngestRequest::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(result.segment_count, 0);
        assert!(result.speakers.is_empty());
    }

    #[tokio::test]
    async fn ingest_is_idempotent_modulo_timestamps() {
        let (_dir, ctx) = test_context();
        let req = || IngestRequest {
            raw_hansard: Some(canonical_raw()),
            force_refresh: true,
            ..IngestRequest::default()
        };
        let first = ingest(&ctx, req()).await.unwrap();
        let t1 = get_transcript(&ctx, &first.transcript_id).await.unwrap();
        let second = ingest(&ctx, req()).await.unwrap();
        let t2 = get_transcript(&ctx, &second.transcript_id).await.unwrap();

        assert_eq!(first.transcript_id, second.transcript_id);
        assert_eq!(t1.speakers, t2.speakers);
        assert_eq!(t1.topics, t2.topics);
        let texts1: Vec<_> = t1.segments.iter().map(|s| (&s.id, &s.text)).collect();
        let texts2: Vec<_> = t2.segments.iter().map(|s| (&s.id, &s.text)).collect();
        assert_eq!(texts1, texts2);
    }

    #[tokio::test]
    async fn skip_store_writes_no_artifacts() {
        let (_dir, ctx) = test_context();
        let result = ingest(
            &ctx,
            IngestRequest {
                raw_hansard: Some(canonical_raw()),
                skip_store: true,
                ..IngestRequest::default()
            },
        )
        .await
        .unwrap();
        assert!(result.raw_uri.is_none());
        assert!(result.processed_uri.is_none());
        assert!(
            !ctx.objects
                .exists(&keys::processed_transcript(&result.transcript_id))
                .await
        );
    }
}
