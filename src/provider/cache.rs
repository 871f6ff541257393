//! Content-Addressed Provider Cache
//!
//! Responses for sequence/timetable calls are written through a local
//! cache keyed by method + URL + sorted query parameters (spec.md §4.1,
//! §9). Writes are atomic (write-to-temp, rename) and entries carry a
//! `calculated_at` timestamp, the same discipline `graph::io::
//! write_atomic` uses for the final artifact.

use crate::error::Result;
use serde::{de::DeserializeOwned, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

#[derive(serde::Serialize, serde::Deserialize)]
struct CacheEnvelope<T> {
    calculated_at: chrono::DateTime<chrono::Utc>,
    body: T,
}

/// A directory-backed cache with a per-key async lock, so concurrent
/// requests for the same key don't race on the same temp file (spec.md
/// §5: "cache I/O is serialised per key via per-key locks").
pub struct ProviderCache {
    dir: PathBuf,
    locks: Mutex<HashMap<String, std::sync::Arc<Mutex<()>>>>,
}

impl ProviderCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        ProviderCache {
            dir: dir.into(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Build a stable cache key from the method, URL, and sorted query params.
    pub fn key_for(method: &str, url: &str, params: &[(&str, &str)]) -> String {
        let mut sorted = params.to_vec();
        sorted.sort_by(|a, b| a.0.cmp(b.0));
        let mut hasher = Sha256::new();
        hasher.update(method.as_bytes());
        hasher.update(b"|");
        hasher.update(url.as_bytes());
        for (k, v) in sorted {
            hasher.update(b"|");
            hasher.update(k.as_bytes());
            hasher.update(b"=");
            hasher.update(v.as_bytes());
        }
        format!("{:x}", hasher.finalize())
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    async fn lock_for(&self, key: &str) -> std::sync::Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(key.to_string())
            .or_insert_with(|| std::sync::Arc::new(Mutex::new(())))
            .clone()
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let path = self.path_for(key);
        let guard = self.lock_for(key).await;
        let _held = guard.lock().await;
        let contents = tokio::fs::read_to_string(&path).await.ok()?;
        let envelope: CacheEnvelope<T> = serde_json::from_str(&contents).ok()?;
        Some(envelope.body)
    }

    /// `calculated_at` reflects when the entry was written, not read.
    pub async fn put<T: Serialize>(&self, key: &str, body: &T) -> Result<()> {
        let guard = self.lock_for(key).await;
        let _held = guard.lock().await;

        tokio::fs::create_dir_all(&self.dir).await?;
        let envelope = CacheEnvelope {
            calculated_at: chrono::Utc::now(),
            body,
        };
        let json = serde_json::to_string(&envelope)?;

        let tmp_path = self.dir.join(format!(".{key}.tmp"));
        tokio::fs::write(&tmp_path, json).await?;
        tokio::fs::rename(&tmp_path, self.path_for(key)).await?;
        Ok(())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}
