//! Context/action tree for display.
//!
//! Produces plain data (trace -> context -> page -> action) that any
//! renderer can consume.

use crate::session::{ActionRef, TraceSession};
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt::Write as _;
use vitrine_core::{ContextId, PageId};
use vitrine_log::{ActionEvent, Event};

/// Action with its address in the session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionEntry {
    /// Where the action lives
    pub id: ActionRef,
    /// The recorded action
    pub action: ActionEvent,
}

/// Actions of one page, in log order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageGroup {
    /// Page the actions ran on; `None` for page-less actions
    pub page_id: Option<PageId>,
    /// Actions on this page
    pub actions: Vec<ActionRef>,
}

/// One browser context
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextNode {
    /// `<trace> :: context <n>`
    pub label: String,
    /// Trace that first mentioned the context
    pub trace: String,
    /// Actions in log order
    pub actions: Vec<ActionEntry>,
    /// Actions grouped by page, pages in first-seen order
    pub pages: Vec<PageGroup>,
}

impl ContextNode {
    fn new(label: String, trace: String) -> Self {
        Self {
            label,
            trace,
            actions: Vec::new(),
            pages: Vec::new(),
        }
    }

    fn push(&mut self, entry: ActionEntry) {
        let page_id = entry.action.page_id.clone();
        match self.pages.iter_mut().find(|g| g.page_id == page_id) {
            Some(group) => group.actions.push(entry.id),
            None => self.pages.push(PageGroup {
                page_id,
                actions: vec![entry.id],
            }),
        }
        self.actions.push(entry);
    }
}

/// Contexts of one browser, keyed by context id in first-seen order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextTree {
    /// Browser the tree was built for
    pub browser_name: String,
    /// Contexts
    pub contexts: IndexMap<ContextId, ContextNode>,
}

impl ContextTree {
    /// Total number of actions
    #[must_use]
    pub fn action_count(&self) -> usize {
        self.contexts.values().map(|c| c.actions.len()).sum()
    }

    /// Indented outline for terminals
    #[must_use]
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", self.browser_name);
        for node in self.contexts.values() {
            let _ = writeln!(out, "  {}", node.label);
            let by_id: HashMap<ActionRef, &ActionEvent> =
                node.actions.iter().map(|e| (e.id, &e.action)).collect();
            for group in &node.pages {
                let page = group.page_id.as_ref().map_or("(no page)", PageId::as_str);
                let _ = writeln!(out, "    {}", page);
                for id in &group.actions {
                    let Some(action) = by_id.get(id) else {
                        continue;
                    };
                    let marker = if action.error.is_some() { " !" } else { "" };
                    let _ = writeln!(
                        out,
                        "      [{}] {} ({:.0}ms){}",
                        id,
                        action.title(),
                        action.duration_ms(),
                        marker
                    );
                }
            }
        }
        out
    }
}

/// Builds display trees from a session
#[derive(Debug, Clone, Copy)]
pub struct TreeBuilder<'a> {
    session: &'a TraceSession,
}

impl<'a> TreeBuilder<'a> {
    /// Create a builder
    #[must_use]
    pub const fn new(session: &'a TraceSession) -> Self {
        Self { session }
    }

    /// Build the tree of every context recorded in `browser_name`.
    ///
    /// Context labels number contexts per trace, 1-based, in the order this
    /// pass first labels them; contexts of other browsers are not counted.
    /// Actions that precede their context's creation are skipped, as they
    /// are by the index.
    #[must_use]
    pub fn build(&self, browser_name: &str) -> ContextTree {
        let mut contexts: IndexMap<ContextId, ContextNode> = IndexMap::new();
        let mut created: HashMap<&ContextId, &str> = HashMap::new();

        for (trace_no, trace) in self.session.traces().iter().enumerate() {
            let mut counter = 0usize;

            for (event_no, event) in trace.events().iter().enumerate() {
                let context_id = match event {
                    Event::ContextCreated(record) => {
                        created.insert(&record.context_id, &record.browser_name);
                        &record.context_id
                    }
                    Event::Action(action) => &action.context_id,
                    _ => continue,
                };
                if created.get(context_id).copied() != Some(browser_name) {
                    continue;
                }

                if !contexts.contains_key(context_id) {
                    counter += 1;
                    contexts.insert(
                        context_id.clone(),
                        ContextNode::new(
                            format!("{} :: context {}", trace.id(), counter),
                            trace.id().to_string(),
                        ),
                    );
                }

                if let Event::Action(action) = event
                    && let Some(node) = contexts.get_mut(context_id)
                {
                    node.push(ActionEntry {
                        id: ActionRef::new(trace_no, event_no),
                        action: action.clone(),
                    });
                }
            }
        }

        ContextTree {
            browser_name: browser_name.to_string(),
            contexts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vitrine_log::TraceSource;

    fn session(traces: &[(&str, &str)]) -> TraceSession {
        let mut session = TraceSession::new();
        for (id, text) in traces {
            session
                .load(&TraceSource::from_bytes(*id, text.as_bytes().to_vec()))
                .unwrap();
        }
        session
    }

    const MIXED: &str = r##"{"type":"context-created","contextId":"w1","browserName":"webkit"}
{"type":"context-created","contextId":"c1","browserName":"chromium"}
{"type":"action","contextId":"w1","pageId":"p0","action":"goto","startTime":0,"endTime":5}
{"type":"page-created","contextId":"c1","pageId":"p1"}
{"type":"action","contextId":"c1","pageId":"p1","action":"goto","target":"https://a/","startTime":0,"endTime":12}
{"type":"context-created","contextId":"c2","browserName":"chromium"}
{"type":"action","contextId":"c2","action":"click","target":"#ok","startTime":3,"endTime":4,"error":"timeout"}
{"type":"action","contextId":"c1","pageId":"p1","action":"fill","value":"x","startTime":13,"endTime":20}
{"type":"action","contextId":"ghost","action":"click","startTime":0,"endTime":1}
"##;

    #[test]
    fn test_only_requested_browser_counted() {
        let session = session(&[("run.trace", MIXED)]);
        let tree = TreeBuilder::new(&session).build("chromium");

        let labels: Vec<_> = tree.contexts.values().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, vec!["run.trace :: context 1", "run.trace :: context 2"]);
        assert_eq!(tree.action_count(), 3);
        assert!(!tree.contexts.contains_key(&ContextId::new("w1")));
        assert!(!tree.contexts.contains_key(&ContextId::new("ghost")));
    }

    #[test]
    fn test_actions_keep_log_order_and_refs() {
        let session = session(&[("run.trace", MIXED)]);
        let tree = TreeBuilder::new(&session).build("chromium");
        let c1 = &tree.contexts[&ContextId::new("c1")];
        let names: Vec<_> = c1.actions.iter().map(|e| e.action.action.as_str()).collect();
        assert_eq!(names, vec!["goto", "fill"]);
        assert_eq!(c1.actions[0].id, ActionRef::new(0, 4));
        assert_eq!(c1.actions[1].id, ActionRef::new(0, 7));
        assert_eq!(
            session.action(c1.actions[1].id).unwrap().value.as_deref(),
            Some("x")
        );
    }

    #[test]
    fn test_page_grouping() {
        let session = session(&[("run.trace", MIXED)]);
        let tree = TreeBuilder::new(&session).build("chromium");
        let c1 = &tree.contexts[&ContextId::new("c1")];
        assert_eq!(c1.pages.len(), 1);
        assert_eq!(c1.pages[0].page_id, Some(PageId::new("p1")));
        assert_eq!(c1.pages[0].actions.len(), 2);

        let c2 = &tree.contexts[&ContextId::new("c2")];
        assert_eq!(c2.pages[0].page_id, None);
    }

    #[test]
    fn test_counter_is_per_trace() {
        let first = r#"{"type":"context-created","contextId":"a1","browserName":"firefox"}"#;
        let second = r#"{"type":"context-created","contextId":"b1","browserName":"firefox"}
{"type":"context-created","contextId":"b2","browserName":"firefox"}"#;
        let session = session(&[("w0.trace", first), ("w1.trace", second)]);
        let tree = TreeBuilder::new(&session).build("firefox");
        let labels: Vec<_> = tree.contexts.values().map(|c| c.label.as_str()).collect();
        assert_eq!(
            labels,
            vec!["w0.trace :: context 1", "w1.trace :: context 1", "w1.trace :: context 2"]
        );
    }

    #[test]
    fn test_actions_from_later_trace_attach_to_earlier_context() {
        let first = r#"{"type":"context-created","contextId":"c1","browserName":"chromium"}"#;
        let second = r#"{"type":"action","contextId":"c1","action":"reload","startTime":0,"endTime":1}"#;
        let session = session(&[("a.trace", first), ("b.trace", second)]);
        let tree = TreeBuilder::new(&session).build("chromium");
        assert_eq!(tree.contexts.len(), 1);
        let node = &tree.contexts[&ContextId::new("c1")];
        assert_eq!(node.label, "a.trace :: context 1");
        assert_eq!(node.actions.len(), 1);
    }

    #[test]
    fn test_action_before_context_creation_skipped() {
        let log = r#"{"type":"action","contextId":"c1","action":"click","startTime":0,"endTime":1}
{"type":"resource","contextId":"c1","frameId":"f1","url":"https://a/early.js","contentHash":"aa"}
{"type":"context-created","contextId":"c1","browserName":"chromium"}
{"type":"action","contextId":"c1","action":"fill","startTime":2,"endTime":3}"#;
        let session = session(&[("late.trace", log)]);
        assert!(session.index().resources_for("https://a/early.js").is_none());

        let tree = TreeBuilder::new(&session).build("chromium");
        let node = &tree.contexts[&ContextId::new("c1")];
        let names: Vec<_> = node.actions.iter().map(|e| e.action.action.as_str()).collect();
        assert_eq!(names, vec!["fill"]);
        assert_eq!(node.actions[0].id, ActionRef::new(0, 3));
    }

    #[test]
    fn test_numbering_has_no_gap_for_earlier_contexts() {
        let first = r#"{"type":"context-created","contextId":"c1","browserName":"chromium"}"#;
        let second = r#"{"type":"action","contextId":"c1","action":"reload","startTime":0,"endTime":1}
{"type":"context-created","contextId":"c2","browserName":"chromium"}"#;
        let session = session(&[("a.trace", first), ("b.trace", second)]);
        let tree = TreeBuilder::new(&session).build("chromium");
        assert_eq!(tree.contexts[&ContextId::new("c2")].label, "b.trace :: context 1");
    }

    #[test]
    fn test_unknown_browser_is_empty() {
        let session = session(&[("run.trace", MIXED)]);
        let tree = TreeBuilder::new(&session).build("netscape");
        assert!(tree.contexts.is_empty());
    }

    #[test]
    fn test_render_text() {
        let session = session(&[("run.trace", MIXED)]);
        let text = TreeBuilder::new(&session).build("chromium").render_text();
        assert!(text.starts_with("chromium\n"));
        assert!(text.contains("  run.trace :: context 1\n"));
        assert!(text.contains("    p1\n"));
        assert!(text.contains("[0:4] goto https://a/ (12ms)"));
        assert!(text.contains("(no page)"));
        assert!(text.contains("click #ok (1ms) !"));
    }

    #[test]
    fn test_tree_serializes() {
        let session = session(&[("run.trace", MIXED)]);
        let tree = TreeBuilder::new(&session).build("chromium");
        let json = serde_json::to_value(&tree).unwrap();
        assert_eq!(json["contexts"]["c1"]["label"], "run.trace :: context 1");
    }
}
