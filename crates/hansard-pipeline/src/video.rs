//! Video matching pipeline
//!
//! Opens a `[sitting - 2 days, sitting + 3 days)` window over the external
//! catalog, scores every candidate on date proximity, title/description
//! keywords, duration, and livestream metadata, and persists the best match
//! when it clears the confidence floor.

pub mod youtube;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use hansard_core::{SittingDate, VideoMatch};
use hansard_store::{keys, KvStore};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::context::AppContext;
use crate::error::PipelineError;
use crate::ingest;
use crate::parser::collapse_whitespace;
use crate::video::youtube::YoutubeClient;

/// Matches scoring below this are rejected entirely
pub const MIN_CONFIDENCE: f64 = 5.0;

/// Candidates requested from the catalog per match attempt
const MAX_CANDIDATES: u32 = 10;

/// Titles and descriptions containing any of these read as parliamentary
/// coverage
pub const PARLIAMENTARY_KEYWORDS: &[&str] = &[
    "parliament",
    "parliamentary",
    "sitting",
    "hansard",
    "debate",
    "question time",
    "second reading",
    "committee of supply",
    "budget",
];

#[derive(Debug, Clone, Deserialize)]
pub struct VideoMatchRequest {
    pub transcript_id: String,
    pub sitting_date: String,
    #[serde(default)]
    pub speakers: Vec<String>,
    #[serde(default)]
    pub channel_id: Option<String>,
}

/// One catalog video under consideration
#[derive(Debug, Clone)]
pub struct VideoCandidate {
    pub video_id: String,
    pub title: String,
    pub description: String,
    pub published_at: DateTime<Utc>,
    pub channel_id: String,
    pub duration_secs: u32,
    pub is_livestream: bool,
    pub captions_available: bool,
}

/// Persisted artifact: the match plus its custom metadata envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoMatchArtifact {
    pub metadata: VideoMatchMeta,
    #[serde(rename = "match")]
    pub video_match: VideoMatch,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoMatchMeta {
    pub transcript_id: String,
    pub video_id: String,
    pub confidence_score: f64,
}

/// Estimated position of a quote inside the matched video
#[derive(Debug, Clone, Serialize)]
pub struct QuoteTimestamp {
    pub transcript_id: String,
    pub video_id: String,
    /// Watch URL with the `t=` offset applied
    pub url: String,
    pub estimated_offset_secs: u32,
    pub segment_id: String,
    pub segment_index: usize,
    pub speaker: String,
}

/// Score one candidate; returns the score and the names of the factors that
/// actually fired
#[must_use]
pub fn score_candidate(
    candidate: &VideoCandidate,
    sitting: &SittingDate,
    speakers: &[String],
) -> (f64, Vec<String>) {
    let mut score = 0.0;
    let mut criteria = Vec::new();

    let day_diff = sitting.days_until(candidate.published_at.date_naive());
    match day_diff.abs() {
        0 => {
            score += 4.0;
            criteria.push("published_same_day".to_string());
        }
        1 => {
            score += 3.0;
            criteria.push("published_within_one_day".to_string());
        }
        2 | 3 => {
            score += 1.0;
            criteria.push("published_within_three_days".to_string());
        }
        _ => {}
    }

    let title_lower = candidate.title.to_lowercase();
    if PARLIAMENTARY_KEYWORDS.iter().any(|k| title_lower.contains(k)) {
        score += 2.0;
        criteria.push("parliamentary_title".to_string());
    }

    if candidate.duration_secs >= 3600 {
        score += 2.0;
        criteria.push("full_sitting_duration".to_string());
    } else if candidate.duration_secs >= 1800 {
        score += 1.0;
        criteria.push("partial_sitting_duration".to_string());
    }

    if candidate.is_livestream {
        score += 1.0;
        criteria.push("livestream".to_string());
    }

    let description_lower = candidate.description.to_lowercase();
    if PARLIAMENTARY_KEYWORDS
        .iter()
        .any(|k| description_lower.contains(k))
    {
        score += 0.5;
        criteria.push("parliamentary_description".to_string());
    }

    if speakers.iter().any(|s| {
        let s = s.to_lowercase();
        !s.is_empty() && (title_lower.contains(&s) || description_lower.contains(&s))
    }) {
        score += 0.5;
        criteria.push("speaker_mention".to_string());
    }

    (score.min(10.0), criteria)
}

/// Highest score wins; ties go to the candidate closer to the sitting date,
/// then to the longer one
#[must_use]
pub fn select_best(
    candidates: &[VideoCandidate],
    sitting: &SittingDate,
    speakers: &[String],
) -> Option<(VideoCandidate, f64, Vec<String>)> {
    let mut best: Option<(usize, f64, Vec<String>)> = None;

    for (i, candidate) in candidates.iter().enumerate() {
        let (score, criteria) = score_candidate(candidate, sitting, speakers);
        let replace = match &best {
            None => true,
            Some((best_i, best_score, _)) => {
                let current = &candidates[*best_i];
                if (score - best_score).abs() < f64::EPSILON {
                    let day = sitting.days_until(candidate.published_at.date_naive()).abs();
                    let best_day = sitting.days_until(current.published_at.date_naive()).abs();
                    day < best_day
                        || (day == best_day && candidate.duration_secs > current.duration_secs)
                } else {
                    score > *best_score
                }
            }
        };
        if replace {
            best = Some((i, score, criteria));
        }
    }

    best.map(|(i, score, criteria)| (candidates[i].clone(), score, criteria))
}

/// Find and persist the best catalog video for a transcript
pub async fn match_video(
    ctx: &AppContext,
    req: VideoMatchRequest,
) -> Result<VideoMatch, PipelineError> {
    let sitting = SittingDate::parse(&req.sitting_date)?;

    let api_key = ctx
        .config
        .youtube_api_key
        .clone()
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| {
            PipelineError::Configuration(
                "video catalog API key not configured (HANSARD_YOUTUBE_API_KEY)".to_string(),
            )
        })?;
    let channel = req
        .channel_id
        .clone()
        .or_else(|| ctx.config.youtube_channel_id.clone());

    let client = YoutubeClient::new(ctx.http.clone(), api_key);
    let candidates = fetch_candidates(&client, &sitting, channel.as_deref()).await?;
    if candidates.is_empty() {
        return Err(PipelineError::NotFound(format!(
            "no catalog videos found around sitting {sitting}"
        )));
    }

    let (best, confidence, criteria) = select_best(&candidates, &sitting, &req.speakers)
        .ok_or_else(|| PipelineError::Internal("candidate selection failed".to_string()))?;

    if confidence < MIN_CONFIDENCE {
        return Err(PipelineError::NotFound(format!(
            "no confident video match for {} (best score {confidence:.1} from {} candidates)",
            req.transcript_id,
            candidates.len()
        )));
    }

    let video_match = VideoMatch {
        transcript_id: req.transcript_id.clone(),
        video_id: best.video_id.clone(),
        url: VideoMatch::watch_url(&best.video_id),
        title: best.title,
        duration_secs: best.duration_secs,
        published_at: best.published_at,
        channel_id: best.channel_id,
        confidence_score: confidence,
        match_criteria: criteria,
        captions_available: best.captions_available,
        matched_at: Utc::now(),
    };

    let artifact = VideoMatchArtifact {
        metadata: VideoMatchMeta {
            transcript_id: req.transcript_id.clone(),
            video_id: video_match.video_id.clone(),
            confidence_score: video_match.confidence_score,
        },
        video_match: video_match.clone(),
    };
    ctx.objects
        .put_json(&keys::video_match(&req.transcript_id), &artifact)
        .await?;
    ctx.kv_put_advisory(
        &KvStore::video_match_key(&req.transcript_id),
        &video_match,
        Some(ctx.config.video_cache_ttl()),
    )
    .await;

    info!(
        transcript_id = %req.transcript_id,
        video_id = %video_match.video_id,
        confidence = video_match.confidence_score,
        "Matched sitting to video"
    );
    Ok(video_match)
}

/// Search window `[sitting - 2, sitting + 3)`, then detail lookup
async fn fetch_candidates(
    client: &YoutubeClient,
    sitting: &SittingDate,
    channel: Option<&str>,
) -> Result<Vec<VideoCandidate>, PipelineError> {
    let after = sitting.date() - ChronoDuration::days(2);
    let before = sitting.date() + ChronoDuration::days(3);
    let query = format!("Parliament sitting {}", sitting.iso());

    let search = client
        .search(&query, channel, after, before, MAX_CANDIDATES)
        .await?;
    let ids: Vec<String> = search
        .items
        .into_iter()
        .filter_map(|item| item.id.video_id)
        .collect();

    let details = client.videos(&ids).await?;

    let mut candidates = Vec::with_capacity(details.items.len());
    for item in details.items {
        let Ok(published_at) = DateTime::parse_from_rfc3339(&item.snippet.published_at) else {
            warn!(video_id = %item.id, "Unparseable publish date, skipping candidate");
            continue;
        };
        let duration_secs = item
            .content_details
            .as_ref()
            .and_then(|d| youtube::parse_duration(&d.duration))
            .unwrap_or(0);
        let captions_available = item
            .content_details
            .as_ref()
            .is_some_and(|d| d.caption == "true");

        candidates.push(VideoCandidate {
            video_id: item.id,
            title: item.snippet.title,
            description: item.snippet.description,
            published_at: published_at.with_timezone(&Utc),
            channel_id: item.snippet.channel_id,
            duration_secs,
            is_livestream: item.live_streaming_details.is_some(),
            captions_available,
        });
    }
    Ok(candidates)
}

/// Cache, then store, then `NotFound`; a store hit rehydrates the cache
pub async fn get_match(
    ctx: &AppContext,
    transcript_id: &str,
) -> Result<VideoMatch, PipelineError> {
    if let Some(cached) = ctx
        .kv
        .get_json::<VideoMatch>(&KvStore::video_match_key(transcript_id))
        .await?
    {
        return Ok(cached);
    }

    let artifact: VideoMatchArtifact = ctx
        .objects
        .get_json(&keys::video_match(transcript_id))
        .await
        .map_err(|e| PipelineError::from_store_read(e, "video match"))?;

    ctx.kv_put_advisory(
        &KvStore::video_match_key(transcript_id),
        &artifact.video_match,
        Some(ctx.config.video_cache_ttl()),
    )
    .await;
    Ok(artifact.video_match)
}

/// Estimate where a quote occurs in the matched video.
///
/// Without caption alignment the estimate is positional: the quote's segment
/// index as a fraction of the transcript, applied to the video duration.
pub async fn find_timestamp(
    ctx: &AppContext,
    transcript_id: &str,
    quote: &str,
) -> Result<QuoteTimestamp, PipelineError> {
    let needle = collapse_whitespace(quote).to_lowercase();
    if needle.is_empty() {
        return Err(PipelineError::BadRequest("quote must not be empty".into()));
    }

    let transcript = ingest::get_transcript(ctx, transcript_id).await?;
    let segment = transcript
        .segments
        .iter()
        .find(|s| s.text.to_lowercase().contains(&needle))
        .ok_or_else(|| {
            PipelineError::NotFound(format!("quote not found in transcript {transcript_id}"))
        })?;

    let video = get_match(ctx, transcript_id).await?;
    let offset = estimate_offset(
        segment.index,
        transcript.segments.len(),
        video.duration_secs,
    );

    Ok(QuoteTimestamp {
        transcript_id: transcript_id.to_string(),
        video_id: video.video_id.clone(),
        url: format!("{}&t={offset}s", video.url),
        estimated_offset_secs: offset,
        segment_id: segment.id.clone(),
        segment_index: segment.index,
        speaker: segment.speaker.clone(),
    })
}

/// Positional estimate of a segment's offset within the recording
#[must_use]
pub fn estimate_offset(segment_index: usize, segment_count: usize, duration_secs: u32) -> u32 {
    if segment_count == 0 {
        return 0;
    }
    let fraction = segment_index as f64 / segment_count as f64;
    (fraction * f64::from(duration_secs)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn candidate(
        video_id: &str,
        published: &str,
        duration_secs: u32,
        is_livestream: bool,
    ) -> VideoCandidate {
        VideoCandidate {
            video_id: video_id.to_string(),
            title: "Parliament Sitting - Full Session".to_string(),
            description: String::new(),
            published_at: NaiveDate::parse_from_str(published, "%Y-%m-%d")
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap()
                .and_utc(),
            channel_id: "channel-1".to_string(),
            duration_secs,
            is_livestream,
            captions_available: false,
        }
    }

    fn sitting() -> SittingDate {
        SittingDate::parse("02-07-2024").unwrap()
    }

    #[test]
    fn same_day_long_video_scores_high() {
        let c = candidate("a", "2024-07-02", 3 * 3600, false);
        let (score, criteria) = score_candidate(&c, &sitting(), &[]);
        // 4 (same day) + 2 (title) + 2 (duration)
        assert!((score - 8.0).abs() < 1e-9);
        assert!(criteria.contains(&"published_same_day".to_string()));
        assert!(criteria.contains(&"parliamentary_title".to_string()));
        assert!(criteria.contains(&"full_sitting_duration".to_string()));
        assert!(!criteria.contains(&"livestream".to_string()));
    }

    #[test]
    fn criteria_are_exactly_the_factors_that_fired() {
        let mut c = candidate("a", "2024-06-20", 600, false);
        c.title = "Cooking show".to_string();
        let (score, criteria) = score_candidate(&c, &sitting(), &[]);
        assert!(score.abs() < 1e-9);
        assert!(criteria.is_empty());
    }

    #[test]
    fn speaker_mention_in_description_counts() {
        let mut c = candidate("a", "2024-07-02", 3600, false);
        c.description = "Featuring remarks by Ms Indranee Rajah".to_string();
        let (score, criteria) =
            score_candidate(&c, &sitting(), &["Indranee Rajah".to_string()]);
        assert!(criteria.contains(&"speaker_mention".to_string()));
        assert!(criteria.contains(&"parliamentary_description".to_string()));
        // 4 + 2 + 2 + 0.5 + 0.5 = 9.0
        assert!((score - 9.0).abs() < 1e-9);
    }

    #[test]
    fn tie_breaks_by_date_proximity() {
        // A: same day, 3 h, no livestream, speaker hit  -> 4+2+2+0+0.5 = 8.5
        // B: next day, 4 h, livestream, speaker hit     -> 3+2+2+1+0.5 = 8.5
        let mut a = candidate("a", "2024-07-02", 3 * 3600, false);
        let mut b = candidate("b", "2024-07-03", 4 * 3600, true);
        a.description = "with Mr Tan".to_string();
        b.description = "with Mr Tan".to_string();
        let speakers = vec!["Mr Tan".to_string()];

        let (sa, _) = score_candidate(&a, &sitting(), &speakers);
        let (sb, _) = score_candidate(&b, &sitting(), &speakers);
        assert!((sa - 8.5).abs() < 1e-9);
        assert!((sb - 8.5).abs() < 1e-9);

        let (best, score, _) =
            select_best(&[a, b], &sitting(), &speakers).expect("candidates present");
        assert_eq!(best.video_id, "a");
        assert!((score - 8.5).abs() < 1e-9);
    }

    #[test]
    fn equal_distance_tie_breaks_by_duration() {
        let a = candidate("short", "2024-07-02", 3600, false);
        let b = candidate("long", "2024-07-02", 2 * 3600, false);
        let (best, _, _) = select_best(&[a, b], &sitting(), &[]).expect("candidates present");
        assert_eq!(best.video_id, "long");
    }

    #[test]
    fn score_is_clipped_at_ten() {
        let mut c = candidate("a", "2024-07-02", 4 * 3600, true);
        c.description = "Parliament debate with Mr Lee".to_string();
        let (score, _) = score_candidate(&c, &sitting(), &["Mr Lee".to_string()]);
        assert!(score <= 10.0);
    }

    #[test]
    fn offset_estimate_is_positional() {
        assert_eq!(estimate_offset(0, 100, 7200), 0);
        assert_eq!(estimate_offset(50, 100, 7200), 3600);
        assert_eq!(estimate_offset(0, 0, 7200), 0);
    }
}
