//! YouTube Data API v3 client
//!
//! Two-call shape: `/search` narrows the window, `/videos` fetches duration,
//! caption state, and livestream details for the shortlisted ids.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::Deserialize;
use tracing::debug;

use crate::error::PipelineError;

const YOUTUBE_API_BASE: &str = "https://www.googleapis.com/youtube/v3";

/// ISO 8601 durations as the catalog emits them, e.g. `PT1H30M15S`
static DURATION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^PT(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?$").expect("valid regex")
});

pub struct YoutubeClient {
    http: reqwest::Client,
    api_key: String,
}

impl YoutubeClient {
    pub fn new(http: reqwest::Client, api_key: String) -> Self {
        Self { http, api_key }
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response, PipelineError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let retry_after = resp
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());
        let body: String = resp.text().await.unwrap_or_default().chars().take(300).collect();

        // quota exhaustion arrives as 403 quotaExceeded or plain 429
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS
            || (status == reqwest::StatusCode::FORBIDDEN && body.contains("quota"))
        {
            return Err(PipelineError::RateLimit {
                message: format!("video catalog quota exhausted: {body}"),
                retry_after_secs: retry_after.or(Some(3600)),
            });
        }
        Err(PipelineError::Upstream(format!(
            "video catalog returned {status}: {body}"
        )))
    }

    /// Search for videos in a publish-date window, newest first
    pub async fn search(
        &self,
        query: &str,
        channel_id: Option<&str>,
        published_after: NaiveDate,
        published_before: NaiveDate,
        max_results: u32,
    ) -> Result<SearchResponse, PipelineError> {
        let url = format!("{YOUTUBE_API_BASE}/search");
        let after = format!("{}T00:00:00Z", published_after.format("%Y-%m-%d"));
        let before = format!("{}T00:00:00Z", published_before.format("%Y-%m-%d"));
        let max = max_results.to_string();

        let mut params = vec![
            ("part", "snippet"),
            ("type", "video"),
            ("order", "date"),
            ("q", query),
            ("maxResults", &max),
            ("publishedAfter", &after),
            ("publishedBefore", &before),
            ("key", &self.api_key),
        ];
        if let Some(channel) = channel_id {
            params.push(("channelId", channel));
        }

        debug!(query, "YouTube search");
        let resp = self
            .http
            .get(url)
            .query(&params)
            .send()
            .await
            .map_err(|e| PipelineError::Upstream(format!("video catalog request failed: {e}")))?;
        let resp = Self::check(resp).await?;
        resp.json()
            .await
            .map_err(|e| PipelineError::Upstream(format!("invalid catalog response: {e}")))
    }

    /// Fetch duration, caption state, and livestream details for video ids
    pub async fn videos(&self, video_ids: &[String]) -> Result<VideoListResponse, PipelineError> {
        if video_ids.is_empty() {
            return Ok(VideoListResponse { items: Vec::new() });
        }
        let url = format!("{YOUTUBE_API_BASE}/videos");
        let ids = video_ids.join(",");

        debug!(count = video_ids.len(), "YouTube video details");
        let resp = self
            .http
            .get(url)
            .query(&[
                ("part", "snippet,contentDetails,liveStreamingDetails"),
                ("id", &ids),
                ("key", &self.api_key),
            ])
            .send()
            .await
            .map_err(|e| PipelineError::Upstream(format!("video catalog request failed: {e}")))?;
        let resp = Self::check(resp).await?;
        resp.json()
            .await
            .map_err(|e| PipelineError::Upstream(format!("invalid catalog response: {e}")))
    }
}

// API response types

#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
pub struct SearchItem {
    pub id: SearchItemId,
}

#[derive(Debug, Deserialize)]
pub struct SearchItemId {
    #[serde(rename = "videoId")]
    pub video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VideoListResponse {
    #[serde(default)]
    pub items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
pub struct VideoItem {
    pub id: String,
    pub snippet: VideoSnippet,
    #[serde(rename = "contentDetails")]
    pub content_details: Option<ContentDetails>,
    #[serde(rename = "liveStreamingDetails")]
    pub live_streaming_details: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct VideoSnippet {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "publishedAt")]
    pub published_at: String,
    #[serde(rename = "channelId")]
    pub channel_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ContentDetails {
    pub duration: String,
    /// The API reports this as the string "true"/"false"
    #[serde(default)]
    pub caption: String,
}

/// Parse an ISO 8601 duration (`PT1H30M15S`) to seconds
#[must_use]
pub fn parse_duration(duration: &str) -> Option<u32> {
    let caps = DURATION_PATTERN.captures(duration.trim())?;

    let mut total: Option<u32> = None;
    for (group, unit) in (1..=3).zip([3600_u32, 60, 1]) {
        if let Some(m) = caps.get(group) {
            let value: u32 = m.as_str().parse().ok()?;
            total = Some(total.unwrap_or(0) + value * unit);
        }
    }

    // a bare "PT" carries no components at all
    total
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_iso8601_durations() {
        assert_eq!(parse_duration("PT1H30M15S"), Some(5415));
        assert_eq!(parse_duration("PT45M"), Some(2700));
        assert_eq!(parse_duration("PT30S"), Some(30));
        assert_eq!(parse_duration("PT4H"), Some(14400));
        assert_eq!(parse_duration("1H30M"), None);
        // no components at all is not a duration
        assert_eq!(parse_duration("PT"), None);
    }
}
