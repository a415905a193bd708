//! Content hashes addressing blobs in the resource store.
//!
//! Recorders name blobs by a hex digest of their bytes. The digest algorithm
//! is the recorder's business; this crate only requires a non-empty
//! lowercase hex string. Locally produced blobs use BLAKE3.

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Hex content hash of a stored blob
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentHash(String);

impl ContentHash {
    /// Compute the BLAKE3 content hash of data
    #[must_use]
    pub fn compute(data: &[u8]) -> Self {
        Self(blake3::hash(data).to_hex().to_string())
    }

    /// Parse from hex string, normalized to lowercase.
    ///
    /// Blob files are named by the lowercase digest.
    ///
    /// # Errors
    ///
    /// Returns error if the string is empty or not an even-length hex digest
    pub fn parse(hex: &str) -> Result<Self, CoreError> {
        if hex.is_empty() {
            return Err(CoreError::InvalidHash {
                reason: "empty hash".to_string(),
            });
        }
        if hex.len() % 2 != 0 || hex::decode(hex).is_err() {
            return Err(CoreError::InvalidHash {
                reason: format!("not a hex digest: {}", hex),
            });
        }
        Ok(Self(hex.to_ascii_lowercase()))
    }

    /// Get as hex string
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check if hash matches data under BLAKE3
    #[must_use]
    pub fn verify(&self, data: &[u8]) -> bool {
        Self::compute(data) == *self
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ContentHash {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ContentHash> for String {
    fn from(hash: ContentHash) -> Self {
        hash.0
    }
}

impl AsRef<str> for ContentHash {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
