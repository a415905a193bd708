//! Session-wide lookup tables derived from loaded trace events.

use indexmap::IndexSet;
use std::collections::{BTreeSet, HashMap, HashSet};
use url::Url;
use vitrine_core::{ContextId, PageId};
use vitrine_log::{ContextCreated, Event, ResourceEvent};

/// Strip the fragment from a URL.
///
/// URLs that do not parse are returned unmodified.
#[must_use]
pub fn normalize_url(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(mut url) => {
            url.set_fragment(None);
            url.into()
        }
        Err(_) => raw.to_string(),
    }
}

/// Outcome of indexing one batch of events
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    /// Events added to the index
    pub indexed: usize,
    /// Events skipped because their context was never created
    pub orphans: usize,
}

/// In-memory indices over every loaded trace source
#[derive(Debug, Default)]
pub struct SessionIndex {
    /// Normalized URL -> resources in load order
    resources: HashMap<String, Vec<ResourceEvent>>,
    /// Context id -> creation event
    contexts: HashMap<ContextId, ContextCreated>,
    /// Distinct browser names
    browsers: BTreeSet<String>,
    /// Context id -> live page ids in creation order
    pages: HashMap<ContextId, IndexSet<PageId>>,
    /// Contexts that saw a destroy event
    destroyed: HashSet<ContextId>,
}

impl SessionIndex {
    /// Create an empty index
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Index a batch of events in order
    pub fn ingest(&mut self, events: &[Event]) -> IngestStats {
        let mut stats = IngestStats::default();
        for event in events {
            if self.ingest_one(event) {
                stats.indexed += 1;
            } else {
                stats.orphans += 1;
                tracing::debug!(
                    context = %event.context_id(),
                    kind = ?event.kind(),
                    "skipping event for unknown context"
                );
            }
        }
        stats
    }

    fn ingest_one(&mut self, event: &Event) -> bool {
        match event {
            Event::ContextCreated(created) => {
                self.browsers.insert(created.browser_name.clone());
                self.destroyed.remove(&created.context_id);
                self.contexts
                    .insert(created.context_id.clone(), created.clone());
                true
            }
            Event::ContextDestroyed(destroyed) => {
                if !self.contexts.contains_key(&destroyed.context_id) {
                    return false;
                }
                self.destroyed.insert(destroyed.context_id.clone());
                true
            }
            Event::PageCreated(page) => {
                if !self.contexts.contains_key(&page.context_id) {
                    return false;
                }
                self.pages
                    .entry(page.context_id.clone())
                    .or_default()
                    .insert(page.page_id.clone());
                true
            }
            Event::PageDestroyed(page) => {
                if !self.contexts.contains_key(&page.context_id) {
                    return false;
                }
                if let Some(pages) = self.pages.get_mut(&page.context_id) {
                    pages.shift_remove(&page.page_id);
                }
                true
            }
            Event::Action(action) => self.contexts.contains_key(&action.context_id),
            Event::Resource(resource) => {
                if !self.contexts.contains_key(&resource.context_id) {
                    return false;
                }
                self.resources
                    .entry(normalize_url(&resource.url))
                    .or_default()
                    .push(resource.clone());
                true
            }
        }
    }

    /// Resources recorded under a URL, fragment ignored, in load order
    #[must_use]
    pub fn resources_for(&self, url: &str) -> Option<&[ResourceEvent]> {
        self.resources
            .get(&normalize_url(url))
            .map(Vec::as_slice)
    }

    /// Creation event of a context
    #[must_use]
    pub fn context(&self, id: &ContextId) -> Option<&ContextCreated> {
        self.contexts.get(id)
    }

    /// Distinct browser names, sorted
    pub fn browser_names(&self) -> impl Iterator<Item = &str> {
        self.browsers.iter().map(String::as_str)
    }

    /// Pages of a context that are still open at the end of the log
    #[must_use]
    pub fn open_pages(&self, id: &ContextId) -> Vec<&PageId> {
        self.pages
            .get(id)
            .map(|pages| pages.iter().collect())
            .unwrap_or_default()
    }

    /// Whether the log recorded the context being closed
    #[must_use]
    pub fn is_destroyed(&self, id: &ContextId) -> bool {
        self.destroyed.contains(id)
    }

    /// Number of known contexts
    #[must_use]
    pub fn context_count(&self) -> usize {
        self.contexts.len()
    }

    /// Number of distinct normalized resource URLs
    #[must_use]
    pub fn url_count(&self) -> usize {
        self.resources.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vitrine_core::{ContentHash, FrameId};
    use vitrine_log::{ContextDestroyed, PageLifecycle};

    fn created(id: &str, browser: &str) -> Event {
        Event::ContextCreated(ContextCreated {
            context_id: ContextId::new(id),
            browser_name: browser.to_string(),
            is_mobile: false,
            viewport_size: None,
            device_scale_factor: 1.0,
        })
    }

    fn resource(ctx: &str, frame: &str, url: &str, body: &[u8]) -> Event {
        Event::Resource(ResourceEvent {
            context_id: ContextId::new(ctx),
            frame_id: FrameId::new(frame),
            url: url.to_string(),
            content_type: "text/plain".to_string(),
            response_headers: Vec::new(),
            content_hash: ContentHash::compute(body),
        })
    }

    fn page(ctx: &str, page: &str, open: bool) -> Event {
        let lifecycle = PageLifecycle {
            context_id: ContextId::new(ctx),
            page_id: PageId::new(page),
        };
        if open {
            Event::PageCreated(lifecycle)
        } else {
            Event::PageDestroyed(lifecycle)
        }
    }

    #[test]
    fn test_normalize_strips_fragment() {
        assert_eq!(normalize_url("https://x/y#frag1"), "https://x/y");
        assert_eq!(normalize_url("https://x/y#frag2"), normalize_url("https://x/y"));
        assert_eq!(normalize_url("https://x/y?q=1#a"), "https://x/y?q=1");
    }

    #[test]
    fn test_normalize_keeps_unparseable() {
        assert_eq!(normalize_url("not a url#frag"), "not a url#frag");
        assert_eq!(normalize_url(""), "");
    }

    #[test]
    fn test_ingest_indexes_by_normalized_url() {
        let mut index = SessionIndex::new();
        let stats = index.ingest(&[
            created("c1", "chromium"),
            resource("c1", "f1", "https://a/app.js#one", b"1"),
            resource("c1", "f2", "https://a/app.js", b"2"),
        ]);
        assert_eq!(stats, IngestStats { indexed: 3, orphans: 0 });

        let list = index.resources_for("https://a/app.js#v2").unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].frame_id, FrameId::new("f1"));
        assert_eq!(list[1].frame_id, FrameId::new("f2"));
        assert_eq!(index.url_count(), 1);
    }

    #[test]
    fn test_orphans_skipped() {
        let mut index = SessionIndex::new();
        let stats = index.ingest(&[
            resource("ghost", "f1", "https://a/x.css", b"x"),
            page("ghost", "p1", true),
            created("c1", "webkit"),
        ]);
        assert_eq!(stats, IngestStats { indexed: 1, orphans: 2 });
        assert!(index.resources_for("https://a/x.css").is_none());
        assert!(index.open_pages(&ContextId::new("ghost")).is_empty());
    }

    #[test]
    fn test_browser_names_sorted_and_distinct() {
        let mut index = SessionIndex::new();
        index.ingest(&[
            created("c1", "webkit"),
            created("c2", "chromium"),
            created("c3", "webkit"),
        ]);
        let names: Vec<_> = index.browser_names().collect();
        assert_eq!(names, vec!["chromium", "webkit"]);
        assert_eq!(index.context_count(), 3);
    }

    #[test]
    fn test_page_and_context_lifecycle() {
        let mut index = SessionIndex::new();
        index.ingest(&[
            created("c1", "firefox"),
            page("c1", "p1", true),
            page("c1", "p2", true),
            page("c1", "p1", false),
            Event::ContextDestroyed(ContextDestroyed {
                context_id: ContextId::new("c1"),
            }),
        ]);
        let ctx = ContextId::new("c1");
        assert_eq!(index.open_pages(&ctx), vec![&PageId::new("p2")]);
        assert!(index.is_destroyed(&ctx));
        assert!(index.context(&ctx).is_some());
    }

    proptest::proptest! {
        #[test]
        fn prop_fragment_never_affects_lookup(path in "[a-z]{1,8}", frag in "[a-zA-Z0-9]{0,8}") {
            let bare = format!("https://example.test/{}", path);
            let tagged = format!("{}#{}", bare, frag);
            proptest::prop_assert_eq!(normalize_url(&bare), normalize_url(&tagged));
        }
    }
}
