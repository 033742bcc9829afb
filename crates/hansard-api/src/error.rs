//! API error mapping
//!
//! Every `PipelineError` variant maps to exactly one HTTP status. Internal
//! detail is logged, not leaked; configuration errors keep their binding
//! diagnostic because that is what the operator needs to see.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use hansard_pipeline::PipelineError;
use serde::Serialize;

#[derive(Debug)]
pub struct ApiError(pub PipelineError);

#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_after_secs: Option<u64>,
}

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, message, retry_after) = match self.0 {
            PipelineError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg, None),
            PipelineError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg, None),
            PipelineError::NotReady(msg) => (StatusCode::NOT_FOUND, "not_ready", msg, None),
            PipelineError::Upstream(msg) => {
                tracing::error!("Upstream failure: {}", msg);
                (StatusCode::SERVICE_UNAVAILABLE, "upstream_error", msg, None)
            }
            PipelineError::RateLimit { message, retry_after_secs } => (
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limited",
                message,
                retry_after_secs,
            ),
            PipelineError::MalformedSource(msg) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "malformed_source", msg, None)
            }
            PipelineError::Configuration(msg) => {
                tracing::error!("Configuration error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "configuration_error", msg, None)
            }
            PipelineError::Store(e) => {
                tracing::error!("Store error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "store_error",
                    "storage operation failed".to_string(),
                    None,
                )
            }
            PipelineError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "operation failed".to_string(),
                    None,
                )
            }
        };

        let body = ErrorResponse {
            error,
            message,
            retry_after_secs: retry_after,
        };

        let mut response = (status, axum::Json(body)).into_response();
        if let Some(secs) = retry_after {
            if let Ok(value) = secs.to_string().parse() {
                response
                    .headers_mut()
                    .insert(axum::http::header::RETRY_AFTER, value);
            }
        }
        response
    }
}
