//! OpenAI-compatible LLM client
//!
//! One chat-completions call shape shared by moment proposal and RAG
//! answers, plus a streaming variant and the remote embeddings endpoint.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;

use crate::config::Config;
use crate::error::PipelineError;

#[derive(Serialize)]
struct ChatReq<'a> {
    model: &'a str,
    messages: Vec<ChatMsg<'a>>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Serialize)]
struct ChatMsg<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResp {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMsg,
}

#[derive(Deserialize)]
struct ChatChoiceMsg {
    content: String,
}

#[derive(Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Deserialize, Default)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

fn api_key(config: &Config) -> Result<&str, PipelineError> {
    config
        .llm_api_key
        .as_deref()
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| {
            PipelineError::Configuration("LLM API key not configured (HANSARD_LLM_API_KEY)".into())
        })
}

fn map_status(status: StatusCode, body: String, retry_after: Option<u64>) -> PipelineError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        PipelineError::RateLimit {
            message: format!("LLM provider returned 429: {body}"),
            retry_after_secs: retry_after,
        }
    } else {
        PipelineError::Upstream(format!("LLM provider returned {status}: {body}"))
    }
}

async fn error_from_response(resp: reqwest::Response) -> PipelineError {
    let status = resp.status();
    let retry_after = resp
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok());
    let body: String = resp
        .text()
        .await
        .unwrap_or_default()
        .chars()
        .take(300)
        .collect();
    map_status(status, body, retry_after)
}

/// One blocking chat completion; returns the assistant message content
pub async fn chat_completion(
    http: &reqwest::Client,
    config: &Config,
    model: &str,
    system: &str,
    user: &str,
    temperature: f32,
    max_tokens: u32,
) -> Result<String, PipelineError> {
    let key = api_key(config)?;
    let url = format!("{}/chat/completions", config.llm_base_url.trim_end_matches('/'));

    let resp = http
        .post(url)
        .bearer_auth(key)
        .json(&ChatReq {
            model,
            messages: vec![
                ChatMsg { role: "system", content: system },
                ChatMsg { role: "user", content: user },
            ],
            temperature,
            max_tokens,
            stream: false,
        })
        .send()
        .await
        .map_err(|e| PipelineError::Upstream(format!("LLM request failed: {e}")))?;

    if !resp.status().is_success() {
        return Err(error_from_response(resp).await);
    }

    let data: ChatResp = resp
        .json()
        .await
        .map_err(|e| PipelineError::Upstream(format!("invalid LLM response JSON: {e}")))?;
    let content = data
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| PipelineError::Upstream("LLM returned no choices".into()))?
        .message
        .content;
    Ok(content.trim().to_string())
}

/// Streaming chat completion: text fragments as they arrive.
///
/// Dropping the returned stream drops the reader task's channel, which ends
/// the task and aborts the upstream call, so caller cancellation propagates
/// promptly.
pub async fn chat_completion_stream(
    http: &reqwest::Client,
    config: &Config,
    model: &str,
    system: &str,
    user: &str,
    temperature: f32,
    max_tokens: u32,
) -> Result<ReceiverStream<Result<String, PipelineError>>, PipelineError> {
    let key = api_key(config)?;
    let url = format!("{}/chat/completions", config.llm_base_url.trim_end_matches('/'));

    let resp = http
        .post(url)
        .bearer_auth(key)
        .json(&ChatReq {
            model,
            messages: vec![
                ChatMsg { role: "system", content: system },
                ChatMsg { role: "user", content: user },
            ],
            temperature,
            max_tokens,
            stream: true,
        })
        .send()
        .await
        .map_err(|e| PipelineError::Upstream(format!("LLM request failed: {e}")))?;

    if !resp.status().is_success() {
        return Err(error_from_response(resp).await);
    }

    let (tx, rx) = tokio::sync::mpsc::channel::<Result<String, PipelineError>>(32);

    tokio::spawn(async move {
        let mut bytes = resp.bytes_stream();
        let mut buffer = String::new();

        while let Some(chunk) = bytes.next().await {
            let chunk = match chunk {
                Ok(c) => c,
                Err(e) => {
                    let _ = tx
                        .send(Err(PipelineError::Upstream(format!("stream error: {e}"))))
                        .await;
                    return;
                }
            };
            buffer.push_str(&String::from_utf8_lossy(&chunk));

            while let Some(pos) = buffer.find('\n') {
                let line = buffer[..pos].trim().to_string();
                buffer.drain(..=pos);

                let Some(payload) = line.strip_prefix("data:") else {
                    continue;
                };
                let payload = payload.trim();
                if payload.is_empty() || payload == "[DONE]" {
                    continue;
                }
                if let Ok(parsed) = serde_json::from_str::<StreamChunk>(payload) {
                    let fragment = parsed
                        .choices
                        .into_iter()
                        .next()
                        .and_then(|c| c.delta.content);
                    if let Some(text) = fragment {
                        if !text.is_empty() && tx.send(Ok(text)).await.is_err() {
                            // receiver gone: caller cancelled
                            return;
                        }
                    }
                }
            }
        }
    });

    Ok(ReceiverStream::new(rx))
}

#[derive(Serialize)]
struct EmbReq<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

/// Remote embeddings endpoint; the 1536-dim fallback provider
pub async fn remote_embeddings(
    http: &reqwest::Client,
    config: &Config,
    texts: &[String],
) -> Result<Vec<Vec<f32>>, PipelineError> {
    let key = api_key(config)?;
    let url = format!("{}/embeddings", config.llm_base_url.trim_end_matches('/'));

    let resp = http
        .post(url)
        .bearer_auth(key)
        .json(&EmbReq {
            model: &config.embedding_fallback_model,
            input: texts,
        })
        .send()
        .await
        .map_err(|e| PipelineError::Upstream(format!("embedding request failed: {e}")))?;

    if !resp.status().is_success() {
        return Err(error_from_response(resp).await);
    }

    let data: EmbeddingsResponse = resp
        .json()
        .await
        .map_err(|e| PipelineError::Upstream(format!("invalid embeddings JSON: {e}")))?;

    if data.data.len() != texts.len() {
        return Err(PipelineError::Upstream(format!(
            "embedding count mismatch: sent {}, got {}",
            texts.len(),
            data.data.len()
        )));
    }
    Ok(data.data.into_iter().map(|d| d.embedding).collect())
}
