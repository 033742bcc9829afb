//! RAG chat and session embedding endpoints

use axum::body::{Body, Bytes};
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::Response;
use axum::Json;
use hansard_pipeline::ingest;
use hansard_pipeline::rag::chat::{
    self, ChatAnswer, EmbedOutcome, RagChatRequest, SessionStatus,
};
use hansard_pipeline::PipelineError;
use tokio_stream::StreamExt;

use crate::error::ApiError;
use crate::models::request::{BulkEmbedBody, EmbedSessionBody};
use crate::models::response::BatchItem;
use crate::AppState;

/// Grounded answer with citations
pub async fn chat(
    State(ctx): State<AppState>,
    Json(req): Json<RagChatRequest>,
) -> Result<Json<ChatAnswer>, ApiError> {
    Ok(Json(chat::chat(&ctx, req).await?))
}

/// Streaming variant: `text/plain` fragments, model and citation count in
/// the response headers
pub async fn chat_stream(
    State(ctx): State<AppState>,
    Json(req): Json<RagChatRequest>,
) -> Result<Response, ApiError> {
    let (head, stream) = chat::chat_stream(&ctx, req).await?;

    let body = Body::from_stream(stream.map(|fragment| fragment.map(Bytes::from)));

    Response::builder()
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .header("X-Model-Used", head.model.unwrap_or_else(|| "none".to_string()))
        .header("X-Citations-Count", head.citations.len().to_string())
        .body(body)
        .map_err(|e| ApiError(PipelineError::Internal(format!("response build failed: {e}"))))
}

async fn resolve_session(
    ctx: &AppState,
    transcript_id: Option<String>,
    sitting_date: Option<String>,
) -> Result<String, PipelineError> {
    if let Some(id) = transcript_id {
        return Ok(id);
    }
    let Some(date) = sitting_date else {
        return Err(PipelineError::BadRequest(
            "supply transcript_id or sitting_date".to_string(),
        ));
    };
    ingest::resolve_transcript_id(ctx, &date)
        .await?
        .ok_or_else(|| {
            PipelineError::NotFound(format!("no ingested transcript for sitting {date}"))
        })
}

/// Chunk, embed, and index one session
pub async fn embed_session(
    State(ctx): State<AppState>,
    Json(body): Json<EmbedSessionBody>,
) -> Result<Json<EmbedOutcome>, ApiError> {
    let transcript_id = resolve_session(&ctx, body.transcript_id, body.sitting_date).await?;
    Ok(Json(
        chat::embed_session(&ctx, &transcript_id, body.force).await?,
    ))
}

/// Embedding readiness for one session; the path accepts a transcript id or
/// a sitting date
pub async fn session_status(
    State(ctx): State<AppState>,
    Path(session): Path<String>,
) -> Result<Json<SessionStatus>, ApiError> {
    match ingest::resolve_transcript_id(&ctx, &session).await? {
        Some(id) => Ok(Json(chat::session_status(&ctx, &id).await?)),
        None => Ok(Json(SessionStatus {
            transcript_id: session,
            embedded: false,
            chunk_count: None,
            embedded_at: None,
            provider: None,
        })),
    }
}

/// Embed many sessions; per-item success and failure
pub async fn bulk_embed(
    State(ctx): State<AppState>,
    Json(body): Json<BulkEmbedBody>,
) -> Json<Vec<BatchItem<EmbedOutcome>>> {
    let mut items = Vec::with_capacity(body.transcript_ids.len());
    // sequential on purpose: embedding holds the native model
    for id in body.transcript_ids {
        let item = match chat::embed_session(&ctx, &id, body.force).await {
            Ok(outcome) => BatchItem::success(id, outcome),
            Err(e) => BatchItem::failure(id, e),
        };
        items.push(item);
    }
    Json(items)
}
