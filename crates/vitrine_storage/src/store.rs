//! Content-addressed blob stores.

use crate::blob::Blob;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use vitrine_core::{ContentHash, CoreError};

/// Store configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding blobs named by their hash
    pub root: PathBuf,
    /// Subdirectories probed after the root, in order
    pub subdirs: Vec<String>,
    /// Maximum blob size in bytes (0 = unlimited)
    pub max_blob_size: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("trace-resources"),
            subdirs: vec!["resources".to_string()],
            max_blob_size: 256 * 1024 * 1024, // 256 MB
        }
    }
}

/// Store error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Blob not found
    #[error("Blob not found: {hash}")]
    NotFound {
        /// Requested hash
        hash: ContentHash,
    },
    /// Blob larger than the configured limit
    #[error("Blob {hash} too large: {size} bytes (limit: {limit})")]
    TooLarge {
        /// Requested hash
        hash: ContentHash,
        /// Size on disk
        size: u64,
        /// Configured limit
        limit: u64,
    },
    /// IO error
    #[error("IO error reading {hash}: {reason}")]
    Io {
        /// Requested hash
        hash: ContentHash,
        /// OS error text
        reason: String,
    },
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { hash } => CoreError::NotFound {
                kind: "Blob".to_string(),
                id: hash.to_string(),
            },
            other => CoreError::Io {
                message: other.to_string(),
            },
        }
    }
}

/// Store statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    /// Successful reads
    pub hits: u64,
    /// Reads that found nothing
    pub misses: u64,
}

/// Read-only content-addressed store
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Read the blob stored under `hash`
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if nothing is stored under the hash
    async fn read(&self, hash: &ContentHash) -> Result<Blob, StoreError>;

    /// Check whether a blob exists
    async fn contains(&self, hash: &ContentHash) -> bool {
        self.read(hash).await.is_ok()
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Counters {
    fn record<T, E>(&self, result: &Result<T, E>) {
        let counter = if result.is_ok() {
            &self.hits
        } else {
            &self.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> StoreStats {
        StoreStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

/// In-memory content store
#[derive(Debug, Default)]
pub struct MemoryStore {
    blobs: RwLock<HashMap<ContentHash, Blob>>,
    counters: Counters,
}

impl MemoryStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store data under its BLAKE3 hash and return the hash
    pub fn write(&self, data: impl Into<bytes::Bytes>) -> ContentHash {
        let blob = Blob::from_data(data);
        let hash = blob.hash().clone();
        self.insert(blob);
        hash
    }

    /// Store a blob under the hash it carries
    pub fn insert(&self, blob: Blob) {
        let mut blobs = self
            .blobs
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        blobs.insert(blob.hash().clone(), blob);
    }

    /// Number of stored blobs
    #[must_use]
    pub fn len(&self) -> usize {
        self.blobs
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    /// Whether the store is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read statistics
    #[must_use]
    pub fn stats(&self) -> StoreStats {
        self.counters.snapshot()
    }
}

#[async_trait]
impl BlobStore for MemoryStore {
    async fn read(&self, hash: &ContentHash) -> Result<Blob, StoreError> {
        let result = self
            .blobs
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(hash)
            .cloned()
            .ok_or_else(|| StoreError::NotFound { hash: hash.clone() });
        self.counters.record(&result);
        result
    }
}

/// Directory-backed store: one file per blob, named by its hash
#[derive(Debug)]
pub struct DirStore {
    config: StoreConfig,
    counters: Counters,
}

impl DirStore {
    /// Open a store rooted at `root` with default settings
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_config(StoreConfig {
            root: root.into(),
            ..StoreConfig::default()
        })
    }

    /// Open with custom configuration
    #[must_use]
    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            config,
            counters: Counters::default(),
        }
    }

    /// Store root
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.config.root
    }

    /// Read statistics
    #[must_use]
    pub fn stats(&self) -> StoreStats {
        self.counters.snapshot()
    }

    fn candidates(&self, hash: &ContentHash) -> Vec<PathBuf> {
        let mut paths = Vec::with_capacity(self.config.subdirs.len() + 1);
        paths.push(self.config.root.join(hash.as_str()));
        for sub in &self.config.subdirs {
            paths.push(self.config.root.join(sub).join(hash.as_str()));
        }
        paths
    }

    async fn read_from_disk(&self, hash: &ContentHash) -> Result<Blob, StoreError> {
        for path in self.candidates(hash) {
            let meta = match tokio::fs::metadata(&path).await {
                Ok(meta) if meta.is_file() => meta,
                Ok(_) => continue,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(StoreError::Io {
                        hash: hash.clone(),
                        reason: e.to_string(),
                    });
                }
            };
            let limit = self.config.max_blob_size;
            if limit > 0 && meta.len() > limit {
                return Err(StoreError::TooLarge {
                    hash: hash.clone(),
                    size: meta.len(),
                    limit,
                });
            }
            let data = tokio::fs::read(&path).await.map_err(|e| StoreError::Io {
                hash: hash.clone(),
                reason: e.to_string(),
            })?;
            tracing::trace!(%hash, path = %path.display(), "blob read");
            return Ok(Blob::new(hash.clone(), data));
        }
        Err(StoreError::NotFound { hash: hash.clone() })
    }
}

#[async_trait]
impl BlobStore for DirStore {
    async fn read(&self, hash: &ContentHash) -> Result<Blob, StoreError> {
        let result = self.read_from_disk(hash).await;
        self.counters.record(&result);
        result
    }
}
