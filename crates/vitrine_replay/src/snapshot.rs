//! Captured DOM snapshots.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use vitrine_core::{ContentHash, CoreError, CoreResult, FrameId};
use vitrine_log::SnapshotRef;
use vitrine_storage::BlobStore;

/// Resource whose in-page content diverged from the network response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceOverride {
    /// Resource URL, compared exactly
    pub url: String,
    /// Hash of the captured content
    pub content_hash: ContentHash,
}

/// DOM state of one frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameSnapshot {
    /// Recorded frame id
    pub frame_id: FrameId,
    /// Recorded frame URL
    pub url: String,
    /// Serialized document
    pub html: String,
    /// Content overrides
    #[serde(default)]
    pub resource_overrides: Vec<ResourceOverride>,
}

impl FrameSnapshot {
    /// Override for exactly this URL, if any
    #[must_use]
    pub fn override_for(&self, url: &str) -> Option<&ResourceOverride> {
        self.resource_overrides.iter().find(|o| o.url == url)
    }
}

/// DOM state of a page: the root frame followed by its descendants
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSnapshot {
    /// Frames in document order, root first
    pub frames: Vec<FrameSnapshot>,
}

impl PageSnapshot {
    /// Decode a snapshot document
    ///
    /// # Errors
    ///
    /// Returns error if the JSON is invalid or frame ids repeat
    pub fn decode(data: &[u8]) -> CoreResult<Self> {
        let snapshot: Self = serde_json::from_slice(data)?;
        let mut seen = HashSet::new();
        for frame in &snapshot.frames {
            if !seen.insert(&frame.frame_id) {
                return Err(CoreError::Validation {
                    field: "frames".to_string(),
                    reason: format!("duplicate frame id {}", frame.frame_id),
                });
            }
        }
        Ok(snapshot)
    }

    /// Fetch and decode the snapshot a trace action points at
    ///
    /// # Errors
    ///
    /// Returns error if the blob is missing or undecodable
    pub async fn load(store: &dyn BlobStore, snapshot: &SnapshotRef) -> CoreResult<Self> {
        let blob = store.read(&snapshot.content_hash).await?;
        Self::decode(blob.as_bytes())
    }

    /// Root frame
    #[must_use]
    pub fn root(&self) -> Option<&FrameSnapshot> {
        self.frames.first()
    }

    /// First non-root frame whose recorded URL is a suffix of `live_url`
    #[must_use]
    pub fn child_for_live_url(&self, live_url: &str) -> Option<usize> {
        self.frames
            .iter()
            .enumerate()
            .skip(1)
            .find(|(_, frame)| !frame.url.is_empty() && live_url.ends_with(&frame.url))
            .map(|(idx, _)| idx)
    }
}
