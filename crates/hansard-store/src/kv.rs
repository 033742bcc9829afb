//! SQLite-backed KV cache with per-entry TTL
//!
//! The cache is advisory: every entry can be deleted without data loss, it
//! only forces recomputation. Operations open a connection per call on a
//! rooted path and run under `spawn_blocking`.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::StoreError;

/// KV store backed by a single SQLite file
#[derive(Debug, Clone)]
pub struct KvStore(PathBuf);

impl KvStore {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self(db_path.as_ref().to_path_buf())
    }

    fn connection(path: &Path) -> Result<Connection, StoreError> {
        if let Some(dir) = path.parent() {
            if !dir.exists() {
                std::fs::create_dir_all(dir).map_err(|e| StoreError::Io {
                    path: dir.to_path_buf(),
                    source: e,
                })?;
            }
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(
            r"
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                expires_at INTEGER
            );
            ",
        )?;
        Ok(conn)
    }

    fn now_secs() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_secs() as i64)
    }

    /// Get a value; expired entries are removed lazily and read as misses
    pub async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let path = self.0.clone();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = Self::connection(&path)?;
            let row: Option<(String, Option<i64>)> = conn
                .query_row(
                    "SELECT value, expires_at FROM kv WHERE key = ?1",
                    [&key],
                    |r| Ok((r.get(0)?, r.get(1)?)),
                )
                .optional()?;

            match row {
                Some((_, Some(expires))) if expires <= Self::now_secs() => {
                    conn.execute("DELETE FROM kv WHERE key = ?1", [&key])?;
                    Ok(None)
                }
                Some((value, _)) => Ok(Some(value)),
                None => Ok(None),
            }
        })
        .await?
    }

    /// Put a value with an optional TTL; `None` means no expiry
    pub async fn put(
        &self,
        key: &str,
        value: String,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        let path = self.0.clone();
        let key = key.to_string();
        let expires_at = ttl.map(|t| Self::now_secs() + t.as_secs() as i64);
        tokio::task::spawn_blocking(move || {
            let conn = Self::connection(&path)?;
            conn.execute(
                "INSERT OR REPLACE INTO kv (key, value, expires_at) VALUES (?1, ?2, ?3)",
                params![key, value, expires_at],
            )?;
            Ok(())
        })
        .await?
    }

    pub async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let path = self.0.clone();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = Self::connection(&path)?;
            conn.execute("DELETE FROM kv WHERE key = ?1", [&key])?;
            Ok(())
        })
        .await?
    }

    /// Typed read; a cached entry that no longer parses is deleted and read
    /// as a miss, so a schema change can never wedge a key
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        match self.get(key).await? {
            Some(raw) => match serde_json::from_str(&raw) {
                Ok(v) => Ok(Some(v)),
                Err(e) => {
                    tracing::warn!(key, error = %e, "Dropping unparseable cache entry");
                    self.delete(key).await?;
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    pub async fn put_json<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        self.put(key, serde_json::to_string(value)?, ttl).await
    }
}

/// KV key layout
impl KvStore {
    #[must_use]
    pub fn raw_hansard_key(iso_date: &str) -> String {
        format!("hansard:raw:{iso_date}")
    }

    #[must_use]
    pub fn processed_key(transcript_id: &str) -> String {
        format!("transcript:processed:{transcript_id}")
    }

    #[must_use]
    pub fn by_date_key(iso_date: &str) -> String {
        format!("transcript:by_date:{iso_date}")
    }

    #[must_use]
    pub fn moments_key(transcript_id: &str) -> String {
        format!("moments:{transcript_id}")
    }

    #[must_use]
    pub fn video_match_key(transcript_id: &str) -> String {
        format!("video_match:{transcript_id}")
    }

    #[must_use]
    pub fn embedded_key(transcript_id: &str) -> String {
        format!("embedded:{transcript_id}")
    }

    #[must_use]
    pub fn answer_key(transcript_id: &str, question_hash: &str) -> String {
        format!("chat:{transcript_id}:{question_hash}")
    }
}
