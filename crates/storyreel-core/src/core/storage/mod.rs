//! Persistence Capabilities
//!
//! Black-box collaborators the core persists through. Both are injected:
//! the core never opens files or databases on its own.
//!
//! - [`KeyValueStore`]: text-oriented persistence (`load`/`save`).
//! - [`BlobStore`]: binary media registry (`put`/`get`), keeping large media
//!   out of the text path.
//!
//! In-memory and file-backed implementations are provided.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::core::fs::{atomic_write_bytes, read_to_string_if_exists, validate_file_key};
use crate::core::{new_id, CoreError, CoreResult};

// =============================================================================
// Traits
// =============================================================================

/// Text key-value persistence
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Loads the value stored under `key`, if any
    async fn load(&self, key: &str) -> CoreResult<Option<String>>;

    /// Stores `value` under `key`. May fail (e.g. quota exceeded).
    async fn save(&self, key: &str, value: &str) -> CoreResult<()>;
}

/// A stored binary object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

/// Binary blob registry
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Stores bytes and returns an opaque handle
    async fn put(&self, bytes: Vec<u8>, mime_type: &str) -> CoreResult<String>;

    /// Fetches a blob by handle; unknown handles resolve to `None`
    async fn get(&self, handle: &str) -> CoreResult<Option<Blob>>;
}

// =============================================================================
// In-Memory Implementations
// =============================================================================

/// In-memory key-value store with an optional byte quota
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    entries: RwLock<HashMap<String, String>>,
    quota_bytes: Option<usize>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that rejects writes pushing total size past `quota_bytes`
    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            quota_bytes: Some(quota_bytes),
        }
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn load(&self, key: &str) -> CoreResult<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn save(&self, key: &str, value: &str) -> CoreResult<()> {
        let mut entries = self.entries.write().await;

        if let Some(quota) = self.quota_bytes {
            let others: usize = entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            let needed = others + key.len() + value.len();
            if needed > quota {
                return Err(CoreError::StorageError(format!(
                    "Quota exceeded: {} bytes needed, {} allowed",
                    needed, quota
                )));
            }
        }

        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// In-memory blob registry
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, Blob>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience constructor returning a shareable handle
    pub fn shared() -> Arc<dyn BlobStore> {
        Arc::new(Self::new())
    }

    /// Number of stored blobs
    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, bytes: Vec<u8>, mime_type: &str) -> CoreResult<String> {
        let handle = new_id();
        self.blobs.write().await.insert(
            handle.clone(),
            Blob {
                bytes,
                mime_type: mime_type.to_string(),
            },
        );
        Ok(handle)
    }

    async fn get(&self, handle: &str) -> CoreResult<Option<Blob>> {
        Ok(self.blobs.read().await.get(handle).cloned())
    }
}

// =============================================================================
// File-Backed Implementations
// =============================================================================

/// Key-value store writing one JSON document per key into a directory
#[derive(Debug, Clone)]
pub struct FileKeyValueStore {
    dir: PathBuf,
}

impl FileKeyValueStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> CoreResult<PathBuf> {
        validate_file_key(key, "storage key")?;
        Ok(self.dir.join(format!("{}.json", key.trim())))
    }
}

#[async_trait]
impl KeyValueStore for FileKeyValueStore {
    async fn load(&self, key: &str) -> CoreResult<Option<String>> {
        let path = self.path_for(key)?;
        tokio::task::spawn_blocking(move || read_to_string_if_exists(&path))
            .await
            .map_err(|e| CoreError::Internal(format!("Storage task failed: {}", e)))?
    }

    async fn save(&self, key: &str, value: &str) -> CoreResult<()> {
        let path = self.path_for(key)?;
        let bytes = value.as_bytes().to_vec();
        tokio::task::spawn_blocking(move || atomic_write_bytes(&path, &bytes))
            .await
            .map_err(|e| CoreError::Internal(format!("Storage task failed: {}", e)))?
    }
}

/// Blob registry storing each blob as a file named `<ulid>.<ext>`
#[derive(Debug, Clone)]
pub struct FileBlobStore {
    dir: PathBuf,
}

impl FileBlobStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

/// File extension used for a mime type
fn extension_for(mime_type: &str) -> &'static str {
    match mime_type {
        "image/png" => "png",
        "image/jpeg" | "image/jpg" => "jpg",
        "image/webp" => "webp",
        "audio/mpeg" | "audio/mp3" => "mp3",
        "audio/wav" | "audio/x-wav" => "wav",
        "audio/ogg" => "ogg",
        "video/mp4" => "mp4",
        _ => "bin",
    }
}

/// Mime type recovered from a blob file extension
fn mime_for(extension: &str) -> &'static str {
    match extension {
        "png" => "image/png",
        "jpg" => "image/jpeg",
        "webp" => "image/webp",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "ogg" => "audio/ogg",
        "mp4" => "video/mp4",
        _ => "application/octet-stream",
    }
}

#[async_trait]
impl BlobStore for FileBlobStore {
    async fn put(&self, bytes: Vec<u8>, mime_type: &str) -> CoreResult<String> {
        let handle = format!("{}.{}", new_id(), extension_for(mime_type));
        let path = self.dir.join(&handle);
        tokio::task::spawn_blocking(move || atomic_write_bytes(&path, &bytes))
            .await
            .map_err(|e| CoreError::Internal(format!("Blob task failed: {}", e)))??;
        debug!("Stored blob {}", handle);
        Ok(handle)
    }

    async fn get(&self, handle: &str) -> CoreResult<Option<Blob>> {
        if validate_file_key(handle, "blob handle").is_err() {
            return Ok(None);
        }
        let path = self.dir.join(handle);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CoreError::IoError(e)),
        };
        let extension = handle.rsplit('.').next().unwrap_or_default();
        Ok(Some(Blob {
            bytes,
            mime_type: mime_for(extension).to_string(),
        }))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_memory_kv_roundtrip() {
        let store = MemoryKeyValueStore::new();
        assert!(store.load("board").await.unwrap().is_none());
        store.save("board", "{}").await.unwrap();
        assert_eq!(store.load("board").await.unwrap().as_deref(), Some("{}"));
    }

    #[tokio::test]
    async fn test_memory_kv_quota() {
        let store = MemoryKeyValueStore::with_quota(16);
        store.save("k", "small").await.unwrap();
        let err = store.save("k", &"x".repeat(64)).await.unwrap_err();
        assert!(matches!(err, CoreError::StorageError(_)));
        // Previous value survives a rejected write
        assert_eq!(store.load("k").await.unwrap().as_deref(), Some("small"));
    }

    #[tokio::test]
    async fn test_memory_blob_store() {
        let store = MemoryBlobStore::new();
        let handle = store.put(vec![1, 2, 3], "image/png").await.unwrap();
        let blob = store.get(&handle).await.unwrap().unwrap();
        assert_eq!(blob.bytes, vec![1, 2, 3]);
        assert_eq!(blob.mime_type, "image/png");
        assert!(store.get("unknown").await.unwrap().is_none());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_file_kv_store() {
        let dir = TempDir::new().unwrap();
        let store = FileKeyValueStore::new(dir.path());
        assert!(store.load("storyboard").await.unwrap().is_none());
        store.save("storyboard", "{\"shots\":[]}").await.unwrap();
        assert_eq!(
            store.load("storyboard").await.unwrap().as_deref(),
            Some("{\"shots\":[]}")
        );
        assert!(store.save("../escape", "x").await.is_err());
    }

    #[tokio::test]
    async fn test_file_blob_store() {
        let dir = TempDir::new().unwrap();
        let store = FileBlobStore::new(dir.path());
        let handle = store.put(b"RIFF".to_vec(), "audio/wav").await.unwrap();
        assert!(handle.ends_with(".wav"));

        let blob = store.get(&handle).await.unwrap().unwrap();
        assert_eq!(blob.bytes, b"RIFF".to_vec());
        assert_eq!(blob.mime_type, "audio/wav");

        assert!(store.get("missing.png").await.unwrap().is_none());
        assert!(store.get("../missing.png").await.unwrap().is_none());
    }
}
