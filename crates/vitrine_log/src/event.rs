//! Event types for the trace log.
//!
//! One JSON object per line, discriminated by its `type` field.

use vitrine_core::{ContentHash, ContextId, FrameId, PageId};
use serde::{Deserialize, Serialize};

/// Viewport dimensions in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewportSize {
    /// Width
    pub width: u32,
    /// Height
    pub height: u32,
}

/// A browser context was opened
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextCreated {
    /// Context id
    pub context_id: ContextId,
    /// Browser engine name, e.g. `chromium`
    pub browser_name: String,
    /// Mobile emulation flag
    #[serde(default)]
    pub is_mobile: bool,
    /// Viewport size, if the context had one
    #[serde(default)]
    pub viewport_size: Option<ViewportSize>,
    /// Device scale factor
    #[serde(default = "default_scale_factor")]
    pub device_scale_factor: f64,
}

fn default_scale_factor() -> f64 {
    1.0
}

/// A browser context was closed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextDestroyed {
    /// Context id
    pub context_id: ContextId,
}

/// A page was opened or closed within a context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageLifecycle {
    /// Owning context
    pub context_id: ContextId,
    /// Page id
    pub page_id: PageId,
}

/// Pointer to a captured DOM snapshot in the blob store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotRef {
    /// Hash of the snapshot JSON blob
    pub content_hash: ContentHash,
    /// Time the capture took
    #[serde(default)]
    pub duration_ms: u64,
}

/// A recorded user action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionEvent {
    /// Owning context
    pub context_id: ContextId,
    /// Page the action ran on
    #[serde(default)]
    pub page_id: Option<PageId>,
    /// Action name, e.g. `click`
    pub action: String,
    /// Selector or other target description
    #[serde(default)]
    pub target: Option<String>,
    /// Typed or selected value
    #[serde(default)]
    pub value: Option<String>,
    /// Human-readable label
    #[serde(default)]
    pub label: Option<String>,
    /// Start time in milliseconds
    pub start_time: f64,
    /// End time in milliseconds
    pub end_time: f64,
    /// Error message if the action failed
    #[serde(default)]
    pub error: Option<String>,
    /// Stack of the failing call
    #[serde(default)]
    pub stack: Option<String>,
    /// Log lines emitted while the action ran
    #[serde(default)]
    pub logs: Vec<String>,
    /// DOM snapshot taken after the action
    #[serde(default)]
    pub snapshot: Option<SnapshotRef>,
}

impl ActionEvent {
    /// Wall time of the action in milliseconds, never negative
    #[must_use]
    pub fn duration_ms(&self) -> f64 {
        (self.end_time - self.start_time).max(0.0)
    }

    /// Display title: the label when present, else `action target`
    #[must_use]
    pub fn title(&self) -> String {
        if let Some(label) = &self.label {
            return label.clone();
        }
        match &self.target {
            Some(target) => format!("{} {}", self.action, target),
            None => self.action.clone(),
        }
    }
}

/// Recorded response header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    /// Header name
    pub name: String,
    /// Header value
    pub value: String,
}

impl Header {
    /// Create a header
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A recorded network response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceEvent {
    /// Owning context
    pub context_id: ContextId,
    /// Frame that issued the request
    pub frame_id: FrameId,
    /// Request URL as recorded
    pub url: String,
    /// Response content type
    #[serde(default)]
    pub content_type: String,
    /// Response headers in recorded order
    #[serde(default)]
    pub response_headers: Vec<Header>,
    /// Hash of the body blob
    pub content_hash: ContentHash,
}

/// Discriminant of an [`Event`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// `context-created`
    ContextCreated,
    /// `context-destroyed`
    ContextDestroyed,
    /// `page-created`
    PageCreated,
    /// `page-destroyed`
    PageDestroyed,
    /// `action`
    Action,
    /// `resource`
    Resource,
}

/// A trace event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Event {
    /// Browser context opened
    ContextCreated(ContextCreated),
    /// Browser context closed
    ContextDestroyed(ContextDestroyed),
    /// Page opened
    PageCreated(PageLifecycle),
    /// Page closed
    PageDestroyed(PageLifecycle),
    /// User action
    Action(ActionEvent),
    /// Network response
    Resource(ResourceEvent),
}

impl Event {
    /// Event discriminant
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::ContextCreated(_) => EventKind::ContextCreated,
            Self::ContextDestroyed(_) => EventKind::ContextDestroyed,
            Self::PageCreated(_) => EventKind::PageCreated,
            Self::PageDestroyed(_) => EventKind::PageDestroyed,
            Self::Action(_) => EventKind::Action,
            Self::Resource(_) => EventKind::Resource,
        }
    }

    /// Context every event belongs to
    #[must_use]
    pub fn context_id(&self) -> &ContextId {
        match self {
            Self::ContextCreated(e) => &e.context_id,
            Self::ContextDestroyed(e) => &e.context_id,
            Self::PageCreated(e) | Self::PageDestroyed(e) => &e.context_id,
            Self::Action(e) => &e.context_id,
            Self::Resource(e) => &e.context_id,
        }
    }

    /// Action payload, if this is an action
    #[must_use]
    pub fn as_action(&self) -> Option<&ActionEvent> {
        match self {
            Self::Action(action) => Some(action),
            _ => None,
        }
    }
}
