//! Resource matching: pick the recorded response that answers a live request.

use crate::index::SessionIndex;
use vitrine_core::{ContextId, FrameId};
use vitrine_log::ResourceEvent;

/// Matches live requests against recorded resources
#[derive(Debug, Clone, Copy)]
pub struct ResourceMatcher<'a> {
    index: &'a SessionIndex,
}

impl<'a> ResourceMatcher<'a> {
    /// Create a matcher over an index
    #[must_use]
    pub const fn new(index: &'a SessionIndex) -> Self {
        Self { index }
    }

    /// Find the resource answering `url` within `context`.
    ///
    /// Only resources recorded in `context` are considered. Among them the
    /// earliest recorded wins, unless a resource recorded by
    /// `preferred_frame` exists, in which case the first such one wins.
    #[must_use]
    pub fn find(
        &self,
        url: &str,
        context: &ContextId,
        preferred_frame: Option<&FrameId>,
    ) -> Option<&'a ResourceEvent> {
        let candidates = self.index.resources_for(url)?;
        let mut chosen = None;
        for candidate in candidates.iter().filter(|r| &r.context_id == context) {
            if preferred_frame == Some(&candidate.frame_id) {
                return Some(candidate);
            }
            if chosen.is_none() {
                chosen = Some(candidate);
            }
        }
        chosen
    }
}
