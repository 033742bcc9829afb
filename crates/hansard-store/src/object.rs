//! File-backed object store for JSON artifacts
//!
//! Keys are relative slash-separated paths; values are UTF-8 JSON documents.
//! Writes are last-write-wins per key; same-input writes are idempotent.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::StoreError;

/// Object store rooted at a base directory
#[derive(Debug, Clone)]
pub struct ObjectStore(PathBuf);

impl ObjectStore {
    pub fn new(base_path: impl AsRef<Path>) -> Self {
        Self(base_path.as_ref().to_path_buf())
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let mut path = self.0.clone();
        for part in key.split('/').filter(|p| !p.is_empty() && *p != "..") {
            path.push(part);
        }
        path
    }

    /// Write a JSON document under `key`, creating parent directories.
    /// Returns the store URI of the written object.
    pub async fn put_json<T: Serialize>(&self, key: &str, value: &T) -> Result<String, StoreError> {
        let path = self.path_for(key);
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await.map_err(|e| StoreError::Io {
                path: dir.to_path_buf(),
                source: e,
            })?;
        }

        let bytes = serde_json::to_vec(value)?;
        tokio::fs::write(&path, bytes).await.map_err(|e| StoreError::Io {
            path: path.clone(),
            source: e,
        })?;

        tracing::debug!(key, "Stored object");
        Ok(format!("store://{key}"))
    }

    /// Read a JSON document; a missing key is `StoreError::NotFound`
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<T, StoreError> {
        let path = self.path_for(key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(key.to_string()));
            }
            Err(e) => return Err(StoreError::Io { path, source: e }),
        };
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub async fn exists(&self, key: &str) -> bool {
        tokio::fs::metadata(self.path_for(key)).await.is_ok()
    }

    pub async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let path = self.path_for(key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Io { path, source: e }),
        }
    }
}

/// Object store key layout
pub mod keys {
    /// `transcripts/raw/{yyyy}/{mm}/{dd}/{transcript_id}.json`
    #[must_use]
    pub fn raw_hansard(yyyy: &str, mm: &str, dd: &str, transcript_id: &str) -> String {
        format!("transcripts/raw/{yyyy}/{mm}/{dd}/{transcript_id}.json")
    }

    /// `transcripts/processed/{transcript_id}.json`
    #[must_use]
    pub fn processed_transcript(transcript_id: &str) -> String {
        format!("transcripts/processed/{transcript_id}.json")
    }

    /// `moments/{transcript_id}.json`
    #[must_use]
    pub fn moments(transcript_id: &str) -> String {
        format!("moments/{transcript_id}.json")
    }

    /// `video-matches/{transcript_id}.json`
    #[must_use]
    pub fn video_match(transcript_id: &str) -> String {
        format!("video-matches/{transcript_id}.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Doc {
        name: String,
        count: u32,
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = ObjectStore::new(dir.path());

        let doc = Doc {
            name: "sitting".to_string(),
            count: 3,
        };
        let uri = store
            .put_json("transcripts/processed/2024-07-02-p14-s3.json", &doc)
            .await
            .unwrap();
        assert_eq!(uri, "store://transcripts/processed/2024-07-02-p14-s3.json");

        let back: Doc = store
            .get_json("transcripts/processed/2024-07-02-p14-s3.json")
            .await
            .unwrap();
        assert_eq!(back, doc);
    }

    #[tokio::test]
    async fn missing_key_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = ObjectStore::new(dir.path());
        let err = store.get_json::<Doc>("moments/nope.json").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn overwrite_is_last_write_wins() {
        let dir = tempfile::tempdir().unwrap();
        let store = ObjectStore::new(dir.path());

        let key = "moments/t1.json";
        store
            .put_json(key, &Doc { name: "a".into(), count: 1 })
            .await
            .unwrap();
        store
            .put_json(key, &Doc { name: "b".into(), count: 2 })
            .await
            .unwrap();

        let back: Doc = store.get_json(key).await.unwrap();
        assert_eq!(back.name, "b");
    }

    #[test]
    fn key_layout_is_date_partitioned() {
        assert_eq!(
            keys::raw_hansard("2024", "07", "02", "2024-07-02-p14-s3"),
            "transcripts/raw/2024/07/02/2024-07-02-p14-s3.json"
        );
        assert_eq!(keys::moments("t1"), "moments/t1.json");
        assert_eq!(keys::video_match("t1"), "video-matches/t1.json");
    }
}
