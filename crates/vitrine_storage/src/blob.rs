//! Blob primitives.

use bytes::Bytes;
use vitrine_core::ContentHash;

/// Immutable blob read from the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    /// Hash the blob was looked up by
    hash: ContentHash,
    /// Raw data bytes
    data: Bytes,
}

impl Blob {
    /// Create a blob under an explicit hash
    #[must_use]
    pub fn new(hash: ContentHash, data: impl Into<Bytes>) -> Self {
        Self {
            hash,
            data: data.into(),
        }
    }

    /// Create a blob addressed by its own BLAKE3 hash
    #[must_use]
    pub fn from_data(data: impl Into<Bytes>) -> Self {
        let data = data.into();
        Self {
            hash: ContentHash::compute(&data),
            data,
        }
    }

    /// Content hash
    #[must_use]
    pub const fn hash(&self) -> &ContentHash {
        &self.hash
    }

    /// Get data bytes
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Cheap handle to the data
    #[must_use]
    pub fn bytes(&self) -> Bytes {
        self.data.clone()
    }

    /// Get data size
    #[must_use]
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Check if blob is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl AsRef<[u8]> for Blob {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}
