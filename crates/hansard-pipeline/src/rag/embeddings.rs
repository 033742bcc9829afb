//! Embedding provider chain
//!
//! Primary: the native 768-dim model run in-process. Fallback: the remote
//! OpenAI-compatible endpoint (1536-dim). A session's chunks and its query
//! embeddings must come from the same provider; the chosen provider is
//! recorded in the session's `embedded:` marker.

use std::fmt;
use std::str::FromStr;

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::context::AppContext;
use crate::error::PipelineError;
use crate::llm;

pub const NATIVE_DIM: usize = 768;
pub const FALLBACK_DIM: usize = 1536;

/// Embedding requests batch at most this many texts
pub const EMBED_BATCH_SIZE: usize = 100;

/// KV key recording which provider embedded the moment index
pub const MOMENTS_PROVIDER_KEY: &str = "moments:embedding_provider";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    Native,
    Fallback,
}

impl EmbeddingProvider {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Native => "native",
            Self::Fallback => "fallback",
        }
    }

    #[must_use]
    pub const fn dimension(self) -> usize {
        match self {
            Self::Native => NATIVE_DIM,
            Self::Fallback => FALLBACK_DIM,
        }
    }
}

impl fmt::Display for EmbeddingProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmbeddingProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "native" => Ok(Self::Native),
            "fallback" => Ok(Self::Fallback),
            other => Err(format!("unknown embedding provider '{other}'")),
        }
    }
}

/// Native text embedder (BGE-base-en-v1.5, 768-dim)
pub struct TextEmbedder(TextEmbedding);

impl TextEmbedder {
    /// Initialize the embedding model
    ///
    /// # Errors
    /// Returns an error if the embedding model fails to initialize
    pub fn new() -> Result<Self, PipelineError> {
        let model = TextEmbedding::try_new(InitOptions::new(EmbeddingModel::BGEBaseENV15))
            .map_err(|e| {
                PipelineError::Internal(format!("failed to initialize embedding model: {e}"))
            })?;
        Ok(Self(model))
    }

    /// Embed a batch of text segments
    ///
    /// # Errors
    /// Returns an error if embedding generation fails
    pub fn embed_batch(&mut self, texts: &[&str]) -> Result<Vec<Vec<f32>>, PipelineError> {
        self.0
            .embed(texts, None)
            .map_err(|e| PipelineError::Internal(format!("embedding failed: {e}")))
    }
}

fn embed_native(
    embedder: &mut TextEmbedder,
    texts: &[String],
) -> Result<Vec<Vec<f32>>, PipelineError> {
    let mut out = Vec::with_capacity(texts.len());
    for batch in texts.chunks(EMBED_BATCH_SIZE) {
        let refs: Vec<&str> = batch.iter().map(String::as_str).collect();
        out.extend(embedder.embed_batch(&refs)?);
    }
    Ok(out)
}

async fn embed_fallback(
    ctx: &AppContext,
    texts: &[String],
) -> Result<Vec<Vec<f32>>, PipelineError> {
    if !ctx.config.llm_configured() {
        return Err(PipelineError::Configuration(
            "no embedding provider available: native model not loaded and no API key for the \
             fallback (HANSARD_LLM_API_KEY)"
                .to_string(),
        ));
    }
    let mut out = Vec::with_capacity(texts.len());
    for batch in texts.chunks(EMBED_BATCH_SIZE) {
        out.extend(llm::remote_embeddings(&ctx.http, &ctx.config, batch).await?);
    }
    Ok(out)
}

/// Embed with the provider chain: native first, remote fallback second.
/// Returns the vectors and the provider that produced them.
pub async fn embed_texts(
    ctx: &AppContext,
    texts: &[String],
) -> Result<(Vec<Vec<f32>>, EmbeddingProvider), PipelineError> {
    {
        let mut guard = ctx.embedder.lock().await;
        if let Some(embedder) = guard.as_mut() {
            match embed_native(embedder, texts) {
                Ok(vectors) => return Ok((vectors, EmbeddingProvider::Native)),
                Err(e) => warn!("Native embedding failed, trying fallback: {e}"),
            }
        }
    }

    let vectors = embed_fallback(ctx, texts).await?;
    Ok((vectors, EmbeddingProvider::Fallback))
}

/// Embed with a specific provider; used at query time so a session's query
/// vectors match its chunk vectors dimensionally
pub async fn embed_with_provider(
    ctx: &AppContext,
    provider: EmbeddingProvider,
    texts: &[String],
) -> Result<Vec<Vec<f32>>, PipelineError> {
    match provider {
        EmbeddingProvider::Native => {
            let mut guard = ctx.embedder.lock().await;
            let embedder = guard.as_mut().ok_or_else(|| {
                PipelineError::Configuration(
                    "session was embedded with the native provider, which is no longer available"
                        .to_string(),
                )
            })?;
            embed_native(embedder, texts)
        }
        EmbeddingProvider::Fallback => embed_fallback(ctx, texts).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_round_trips_through_strings() {
        assert_eq!(
            "native".parse::<EmbeddingProvider>().unwrap(),
            EmbeddingProvider::Native
        );
        assert_eq!(
            "fallback".parse::<EmbeddingProvider>().unwrap(),
            EmbeddingProvider::Fallback
        );
        assert!("openai".parse::<EmbeddingProvider>().is_err());
    }

    #[test]
    fn provider_dimensions() {
        assert_eq!(EmbeddingProvider::Native.dimension(), 768);
        assert_eq!(EmbeddingProvider::Fallback.dimension(), 1536);
    }

    #[tokio::test]
    async fn neither_provider_configured_is_a_configuration_error() {
        let (_dir, ctx) = crate::test_support::test_context();
        let err = embed_texts(&ctx, &["hello".to_string()]).await.unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
    }
}
