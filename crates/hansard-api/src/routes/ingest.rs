//! Ingestion endpoint

use axum::extract::State;
use axum::Json;
use hansard_pipeline::ingest::{self, IngestRequest, IngestResult};

use crate::error::ApiError;
use crate::AppState;

/// Ingest a sitting by date, raw URL, or inline raw document
pub async fn ingest_hansard(
    State(ctx): State<AppState>,
    Json(req): Json<IngestRequest>,
) -> Result<Json<IngestResult>, ApiError> {
    Ok(Json(ingest::ingest(&ctx, req).await?))
}
