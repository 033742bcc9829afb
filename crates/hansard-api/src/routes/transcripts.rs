//! Processed transcript read endpoint

use axum::extract::{Path, State};
use axum::Json;
use hansard_core::ProcessedTranscript;
use hansard_pipeline::ingest;

use crate::error::ApiError;
use crate::AppState;

/// Fetch one processed transcript by id
#[utoipa::path(
    get,
    path = "/transcripts/{id}",
    params(
        ("id" = String, Path, description = "Transcript id, e.g. 2024-07-02-p14-s3")
    ),
    responses(
        (status = 200, description = "Processed transcript"),
        (status = 404, description = "Unknown transcript")
    )
)]
pub async fn get_transcript(
    State(ctx): State<AppState>,
    Path(transcript_id): Path<String>,
) -> Result<Json<ProcessedTranscript>, ApiError> {
    Ok(Json(ingest::get_transcript(&ctx, &transcript_id).await?))
}
