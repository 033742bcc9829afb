//! Health check endpoint

use axum::extract::State;
use axum::Json;

use crate::models::response::HealthResponse;
use crate::AppState;

/// Binding and configuration status
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    )
)]
pub async fn health(State(ctx): State<AppState>) -> Json<HealthResponse> {
    let native_embedder_loaded = ctx.embedder.lock().await.is_some();
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        llm_configured: ctx.config.llm_configured(),
        native_embedder_loaded,
        embedding_fallback_configured: ctx.config.llm_configured(),
        video_catalog_configured: ctx.config.youtube_configured(),
        data_dir: ctx.config.data_dir.display().to_string(),
    })
}
