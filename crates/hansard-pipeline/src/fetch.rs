//! Upstream fetch with automatic retries
//!
//! Retries only network errors and 5xx responses, bounded by the configured
//! retry budget with exponential backoff. 4xx responses fail immediately;
//! 429 surfaces as a rate-limit error with a retry-after hint.

use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

use crate::config::Config;
use crate::error::PipelineError;

#[derive(Debug, Error)]
enum FetchError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Status {
        status: StatusCode,
        body: String,
        retry_after: Option<u64>,
    },
}

impl FetchError {
    const fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Status { status, .. } => status.is_server_error(),
        }
    }
}

async fn do_fetch(
    http: &reqwest::Client,
    url: &str,
    timeout: Duration,
) -> Result<Value, FetchError> {
    let response = http.get(url).timeout(timeout).send().await?;
    let status = response.status();

    if !status.is_success() {
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());
        let body = response.text().await.unwrap_or_default();
        let body = body.chars().take(300).collect();
        return Err(FetchError::Status {
            status,
            body,
            retry_after,
        });
    }

    Ok(response.json().await?)
}

/// Fetch a JSON document with the configured retry policy
pub async fn fetch_json(
    http: &reqwest::Client,
    config: &Config,
    url: &str,
) -> Result<Value, PipelineError> {
    let timeout = config.fetch_timeout();
    let fetch = || async { do_fetch(http, url, timeout).await };

    let result = fetch
        .retry(
            ExponentialBuilder::default()
                .with_max_times(config.max_retries)
                .with_min_delay(config.retry_base_delay())
                .with_max_delay(Duration::from_secs(30)),
        )
        .when(FetchError::is_retryable)
        .notify(|err, dur| {
            tracing::warn!("Upstream fetch failed, retrying in {:?}: {}", dur, err);
        })
        .await;

    result.map_err(|e| match e {
        FetchError::Status {
            status: StatusCode::TOO_MANY_REQUESTS,
            body,
            retry_after,
        } => PipelineError::RateLimit {
            message: format!("upstream returned 429: {body}"),
            retry_after_secs: retry_after,
        },
        other => PipelineError::Upstream(other.to_string()),
    })
}

/// URL of the official report for one sitting; the catalog expects the
/// `DD-MM-YYYY` form
#[must_use]
pub fn hansard_report_url(base_url: &str, sitting_date_dmy: &str) -> String {
    format!(
        "{}?sittingDate={}",
        base_url.trim_end_matches('?'),
        sitting_date_dmy
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_url_uses_dmy_form() {
        assert_eq!(
            hansard_report_url("https://example.org/getHansardReport/", "02-07-2024"),
            "https://example.org/getHansardReport/?sittingDate=02-07-2024"
        );
    }

    #[test]
    fn server_errors_are_retryable_client_errors_are_not() {
        let server = FetchError::Status {
            status: StatusCode::BAD_GATEWAY,
            body: String::new(),
            retry_after: None,
        };
        let client = FetchError::Status {
            status: StatusCode::NOT_FOUND,
            body: String::new(),
            retry_after: None,
        };
        let quota = FetchError::Status {
            status: StatusCode::TOO_MANY_REQUESTS,
            body: String::new(),
            retry_after: Some(30),
        };
        assert!(server.is_retryable());
        assert!(!client.is_retryable());
        assert!(!quota.is_retryable());
    }
}
