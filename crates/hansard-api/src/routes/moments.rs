//! Moment extraction endpoints

use axum::extract::{Query, State};
use axum::Json;
use futures::future;
use hansard_core::ScoreBreakdown;
use hansard_pipeline::moments::{self, scoring, ExtractionResult};

use crate::error::ApiError;
use crate::models::request::{AnalyzeBody, BatchExtractBody, ExtractBody, MomentSearchQuery};
use crate::models::response::{BatchItem, MomentSearchResponse};
use crate::AppState;

/// Extract, rescore, and rank moments for one transcript
pub async fn extract_moments(
    State(ctx): State<AppState>,
    Json(body): Json<ExtractBody>,
) -> Result<Json<ExtractionResult>, ApiError> {
    Ok(Json(
        moments::extract(&ctx, &body.transcript_id, body.criteria).await?,
    ))
}

/// Deterministic rescore of a single candidate quote, no LLM round-trip
pub async fn analyze_moment(Json(body): Json<AnalyzeBody>) -> Json<ScoreBreakdown> {
    Json(scoring::score_candidate(
        &body.quote,
        &body.topic,
        &body.emotional_tone,
        body.ai_score,
        body.has_contradiction,
        body.affects_everyday_life,
    ))
}

/// Batch extraction across transcripts; per-item success and failure
pub async fn batch_extract(
    State(ctx): State<AppState>,
    Json(body): Json<BatchExtractBody>,
) -> Json<Vec<BatchItem<ExtractionResult>>> {
    let jobs = body.transcript_ids.iter().map(|id| {
        let criteria = body.criteria.clone();
        let ctx = &ctx;
        async move {
            match moments::extract(ctx, id, criteria).await {
                Ok(result) => BatchItem::success(id.clone(), result),
                Err(e) => BatchItem::failure(id.clone(), e),
            }
        }
    });
    Json(future::join_all(jobs).await)
}

/// Semantic search across every indexed moment
#[utoipa::path(
    get,
    path = "/api/moments/search",
    params(MomentSearchQuery),
    responses(
        (status = 200, description = "Moments ranked by semantic similarity"),
        (status = 400, description = "Empty query")
    )
)]
pub async fn search_moments(
    State(ctx): State<AppState>,
    Query(query): Query<MomentSearchQuery>,
) -> Result<Json<MomentSearchResponse>, ApiError> {
    let limit = query.limit.unwrap_or(10);
    let results = moments::search_moments(&ctx, &query.q, limit).await?;
    Ok(Json(MomentSearchResponse {
        query: query.q,
        total: results.len(),
        results,
    }))
}
