//! Runtime configuration for the service
//!
//! Layered config with precedence:
//! `defaults → config/hansard.yaml → HANSARD_-prefixed env vars`

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use figment2::{
    providers::{Env, Format, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use serde_inline_default::serde_inline_default;

/// Command line of the service binary; everything else comes from the
/// config file and environment
#[derive(Parser, Debug)]
#[command(version, about = "Hansard knowledge-base service")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "config/hansard.yaml")]
    config_path: PathBuf,
}

#[serde_inline_default]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // === Server ===
    /// Port the HTTP API binds to
    #[serde_inline_default(8787_u16)]
    pub port: u16,

    // === Storage ===
    /// Root directory for the object store, KV cache, and vector index
    #[serde_inline_default(PathBuf::from("./data"))]
    pub data_dir: PathBuf,

    // === Upstream Hansard catalog ===
    /// Base URL of the official Hansard report endpoint
    #[serde_inline_default(String::from("https://sprs.parl.gov.sg/search/getHansardReport/"))]
    pub hansard_base_url: String,

    /// Per-attempt fetch timeout in seconds
    #[serde_inline_default(30_u64)]
    pub fetch_timeout_secs: u64,

    /// Retry budget for upstream fetches
    #[serde_inline_default(3_usize)]
    pub max_retries: usize,

    /// Base delay for exponential backoff, in milliseconds
    #[serde_inline_default(1000_u64)]
    pub retry_base_delay_ms: u64,

    // === Cache TTLs ===
    #[serde_inline_default(86_400_u64)]
    pub raw_cache_ttl_secs: u64,

    #[serde_inline_default(86_400_u64)]
    pub processed_cache_ttl_secs: u64,

    #[serde_inline_default(3_600_u64)]
    pub moments_cache_ttl_secs: u64,

    #[serde_inline_default(86_400_u64)]
    pub video_cache_ttl_secs: u64,

    #[serde_inline_default(3_600_u64)]
    pub answer_cache_ttl_secs: u64,

    // === LLM providers ===
    /// OpenAI-compatible API base URL
    #[serde_inline_default(String::from("https://api.openai.com/v1"))]
    pub llm_base_url: String,

    #[serde(default)]
    pub llm_api_key: Option<String>,

    /// Model used for moment proposal
    #[serde_inline_default(String::from("gpt-4o-mini"))]
    pub extraction_model: String,

    /// Primary model for chat answers
    #[serde_inline_default(String::from("gpt-4o"))]
    pub chat_model: String,

    /// Fallback model when the primary is unavailable
    #[serde_inline_default(String::from("gpt-4o-mini"))]
    pub chat_fallback_model: String,

    // === Embeddings ===
    /// Remote fallback model (1536-dim) behind the native 768-dim embedder
    #[serde_inline_default(String::from("text-embedding-3-small"))]
    pub embedding_fallback_model: String,

    /// Whether moment quotes are embedded and indexed at extraction time
    #[serde_inline_default(true)]
    pub embed_moments: bool,

    // === Video catalog ===
    #[serde(default)]
    pub youtube_api_key: Option<String>,

    /// Default channel searched when a request does not name one
    #[serde(default)]
    pub youtube_channel_id: Option<String>,
}

impl Config {
    /// Load config with layered precedence:
    /// defaults < YAML file < env vars
    ///
    /// # Errors
    /// Returns an error if config parsing fails
    pub fn load() -> Result<Self, figment2::Error> {
        let cli = Cli::parse();
        Self::load_from(&cli.config_path)
    }

    /// Load config from a specific path (also used by tests)
    ///
    /// # Errors
    /// Returns an error if config parsing fails
    pub fn load_from(config_path: &Path) -> Result<Self, figment2::Error> {
        Figment::new()
            .merge(Yaml::file(config_path))
            .merge(Env::prefixed("HANSARD_"))
            .extract()
    }

    // Convenience getters

    #[must_use]
    pub const fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    #[must_use]
    pub const fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    #[must_use]
    pub const fn raw_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.raw_cache_ttl_secs)
    }

    #[must_use]
    pub const fn processed_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.processed_cache_ttl_secs)
    }

    #[must_use]
    pub const fn moments_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.moments_cache_ttl_secs)
    }

    #[must_use]
    pub const fn video_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.video_cache_ttl_secs)
    }

    #[must_use]
    pub const fn answer_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.answer_cache_ttl_secs)
    }

    #[must_use]
    pub fn objects_dir(&self) -> PathBuf {
        self.data_dir.join("objects")
    }

    #[must_use]
    pub fn kv_path(&self) -> PathBuf {
        self.data_dir.join("kv.sqlite")
    }

    #[must_use]
    pub fn lancedb_uri(&self) -> String {
        self.data_dir.join("lancedb").to_string_lossy().into_owned()
    }

    #[must_use]
    pub fn llm_configured(&self) -> bool {
        self.llm_api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }

    #[must_use]
    pub fn youtube_configured(&self) -> bool {
        self.youtube_api_key
            .as_deref()
            .is_some_and(|k| !k.trim().is_empty())
    }
}
