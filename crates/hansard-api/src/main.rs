//! REST API server for the Hansard knowledge base

mod error;
mod models;
mod routes;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use color_eyre::eyre::Result;
use hansard_pipeline::{AppContext, Config};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

/// Application state shared across handlers
pub type AppState = Arc<AppContext>;

#[derive(OpenApi)]
#[openapi(
    paths(routes::health, routes::get_transcript, routes::search_moments),
    components(schemas(models::response::HealthResponse)),
    info(
        title = "Hansard API",
        description = "Ingest, search, and chat over Singapore Parliament sittings",
        version = "0.1.0"
    )
)]
struct ApiDoc;

async fn openapi_json() -> axum::Json<utoipa::openapi::OpenApi> {
    axum::Json(ApiDoc::openapi())
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    // load .env
    dotenvy::dotenv().ok();

    // initialize tracing
    let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt().with_env_filter(log_level).init();

    // layered configuration: defaults < yaml < env < CLI
    let config = Config::load()?;
    let port = config.port;

    tracing::info!(data_dir = %config.data_dir.display(), "Initializing stores");
    let state: AppState = Arc::new(AppContext::new(config)?);

    let app = Router::new()
        // ingestion
        .route("/api/ingest/hansard", post(routes::ingest_hansard))
        .route("/transcripts/{id}", get(routes::get_transcript))
        // moments
        .route("/api/moments/extract", post(routes::extract_moments))
        .route("/api/moments/analyze", post(routes::analyze_moment))
        .route("/api/moments/batch", post(routes::batch_extract))
        .route("/api/moments/search", get(routes::search_moments))
        // video
        .route("/api/video/match", post(routes::match_video))
        .route("/api/video/find-timestamp", post(routes::find_timestamp))
        .route("/api/video/match/{transcript_id}", get(routes::get_video_match))
        // RAG chat
        .route("/chat", post(routes::chat))
        .route("/chat-stream", post(routes::chat_stream))
        .route("/embed-session", post(routes::embed_session))
        .route("/session/{date}/status", get(routes::session_status))
        .route("/bulk-embed", post(routes::bulk_embed))
        // service
        .route("/health", get(routes::health))
        .route("/api-docs/openapi.json", get(openapi_json))
        .layer(CorsLayer::very_permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("0.0.0.0:{port}");
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
