//! Video matching endpoints

use axum::extract::{Path, State};
use axum::Json;
use hansard_core::VideoMatch;
use hansard_pipeline::video::{self, QuoteTimestamp, VideoMatchRequest};

use crate::error::ApiError;
use crate::models::request::FindTimestampBody;
use crate::AppState;

/// Find, score, and persist the best catalog video for a transcript
pub async fn match_video(
    State(ctx): State<AppState>,
    Json(req): Json<VideoMatchRequest>,
) -> Result<Json<VideoMatch>, ApiError> {
    Ok(Json(video::match_video(&ctx, req).await?))
}

/// Cached match lookup: KV, then object store, then 404
pub async fn get_video_match(
    State(ctx): State<AppState>,
    Path(transcript_id): Path<String>,
) -> Result<Json<VideoMatch>, ApiError> {
    Ok(Json(video::get_match(&ctx, &transcript_id).await?))
}

/// Estimate where a quote occurs in the matched recording
pub async fn find_timestamp(
    State(ctx): State<AppState>,
    Json(body): Json<FindTimestampBody>,
) -> Result<Json<QuoteTimestamp>, ApiError> {
    Ok(Json(
        video::find_timestamp(&ctx, &body.transcript_id, &body.quote).await?,
    ))
}
