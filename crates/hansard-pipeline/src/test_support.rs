//! Shared fixtures for pipeline tests

use std::path::Path;

use hansard_store::{KvStore, ObjectStore, VectorIndex};
use tokio::sync::Mutex;

use crate::config::Config;
use crate::context::AppContext;

/// Context over a temp data dir, without the native embedding model
pub fn test_context() -> (tempfile::TempDir, AppContext) {
    let dir = tempfile::tempdir().expect("temp dir");
    let mut config =
        Config::load_from(Path::new("no-such-config.yaml")).expect("default config");
    config.data_dir = dir.path().to_path_buf();

    let ctx = AppContext {
        http: reqwest::Client::new(),
        objects: ObjectStore::new(config.objects_dir()),
        kv: KvStore::new(config.kv_path()),
        vectors: VectorIndex::new(config.lancedb_uri()),
        embedder: Mutex::new(None),
        config,
    };
    (dir, ctx)
}
