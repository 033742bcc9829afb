//! Shared application context
//!
//! One context per process, wrapped in `Arc` by the API layer. All mutable
//! state lives in the external stores; the context itself only holds clients
//! and the local embedding model.

use std::time::Duration;

use hansard_store::{KvStore, ObjectStore, VectorIndex};
use tokio::sync::Mutex;
use tracing::warn;

use crate::config::Config;
use crate::error::PipelineError;
use crate::rag::embeddings::TextEmbedder;

pub struct AppContext {
    pub config: Config,
    pub http: reqwest::Client,
    pub objects: ObjectStore,
    pub kv: KvStore,
    pub vectors: VectorIndex,
    /// Native 768-dim embedder; `None` when model initialization failed and
    /// the remote fallback carries the load
    pub embedder: Mutex<Option<TextEmbedder>>,
}

impl AppContext {
    /// Build the context from configuration.
    ///
    /// A failed native-embedder initialization is downgraded to a warning:
    /// the remote fallback provider can still serve embedding requests.
    pub fn new(config: Config) -> Result<Self, PipelineError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(10)
            .build()
            .map_err(|e| PipelineError::Internal(format!("failed to build HTTP client: {e}")))?;

        let objects = ObjectStore::new(config.objects_dir());
        let kv = KvStore::new(config.kv_path());
        let vectors = VectorIndex::new(config.lancedb_uri());

        let embedder = match TextEmbedder::new() {
            Ok(e) => Some(e),
            Err(e) => {
                warn!("Native embedding model unavailable, using fallback only: {e}");
                None
            }
        };

        Ok(Self {
            config,
            http,
            objects,
            kv,
            vectors,
            embedder: Mutex::new(embedder),
        })
    }

    /// Advisory KV write: failures are logged and swallowed, never fatal
    pub async fn kv_put_advisory<T: serde::Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) {
        if let Err(e) = self.kv.put_json(key, value, ttl).await {
            warn!(key, error = %e, "KV cache write failed");
        }
    }
}
