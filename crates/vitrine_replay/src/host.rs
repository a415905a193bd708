//! Rendering host interface.
//!
//! The engine never talks to a browser directly. A host adapter exposes
//! contexts, pages and frames, plus a catch-all request interception hook
//! whose routes must each be fulfilled or aborted exactly once.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use vitrine_core::CoreResult;
use vitrine_log::{ContextCreated, Header, ViewportSize};

/// Host-assigned identifier of a live frame
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LiveFrameId(String);

impl LiveFrameId {
    /// Create from the host's frame handle
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get as string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for LiveFrameId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Emulation settings for a live context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextOptions {
    /// Viewport size
    pub viewport: Option<ViewportSize>,
    /// Device scale factor
    pub device_scale_factor: f64,
    /// Mobile emulation
    pub is_mobile: bool,
}

impl From<&ContextCreated> for ContextOptions {
    fn from(created: &ContextCreated) -> Self {
        Self {
            viewport: created.viewport_size,
            device_scale_factor: created.device_scale_factor,
            is_mobile: created.is_mobile,
        }
    }
}

/// A request paused by the interceptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterceptedRequest {
    /// Request URL
    pub url: String,
    /// Frame that issued the request
    pub frame: LiveFrameId,
    /// Whether this request loads a frame's document
    pub is_navigation: bool,
}

/// Response used to fulfill an intercepted request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteResponse {
    /// HTTP status
    pub status: u16,
    /// Declared content type
    pub content_type: Option<String>,
    /// Response headers
    pub headers: Vec<Header>,
    /// Body
    pub body: Bytes,
}

/// Intercepted request awaiting a decision
#[async_trait]
pub trait Route: Send {
    /// The paused request
    fn request(&self) -> &InterceptedRequest;

    /// Answer the request
    ///
    /// # Errors
    ///
    /// Returns error if the host rejects the response
    async fn fulfill(self: Box<Self>, response: RouteResponse) -> CoreResult<()>;

    /// Fail the request
    ///
    /// # Errors
    ///
    /// Returns error if the host rejects the abort
    async fn abort(self: Box<Self>) -> CoreResult<()>;
}

/// Receives every intercepted request.
///
/// Called by the host as requests arrive, possibly from several tasks at
/// once. Must not block.
pub trait RouteHandler: Send + Sync {
    /// Take ownership of a paused request
    fn on_route(&self, route: Box<dyn Route>);
}

/// Engine logic callable from inside a live page
#[async_trait]
pub trait BindingHandler: Send + Sync {
    /// Handle one call with its JSON argument
    ///
    /// # Errors
    ///
    /// Returns error if the call fails; the host reports it to the page
    async fn call(&self, payload: serde_json::Value) -> CoreResult<serde_json::Value>;
}

/// Live page in the rendering host
#[async_trait]
pub trait LivePage: Send + Sync {
    /// Install a catch-all interceptor for every request of this page
    async fn route_all(&self, handler: Arc<dyn RouteHandler>) -> CoreResult<()>;

    /// Navigate the main frame and wait for it to load
    async fn goto(&self, url: &str) -> CoreResult<()>;

    /// Main frame handle
    fn main_frame(&self) -> LiveFrameId;

    /// Direct children of a frame
    async fn child_frames(&self, frame: &LiveFrameId) -> CoreResult<Vec<LiveFrameId>>;

    /// Wait until a frame finished loading
    async fn wait_for_load(&self, frame: &LiveFrameId) -> CoreResult<()>;

    /// Current URL of a frame
    async fn frame_url(&self, frame: &LiveFrameId) -> CoreResult<String>;

    /// Replace a frame's document
    async fn set_content(&self, frame: &LiveFrameId, html: &str) -> CoreResult<()>;

    /// Expose a named function to page scripts
    async fn expose_binding(&self, name: &str, handler: Arc<dyn BindingHandler>)
    -> CoreResult<()>;
}

/// Live browsing context
#[async_trait]
pub trait LiveContext: Send + Sync {
    /// Open a page
    async fn new_page(&self) -> CoreResult<Arc<dyn LivePage>>;

    /// Close the context and its pages
    async fn close(&self) -> CoreResult<()>;
}

/// Running browser
#[async_trait]
pub trait BrowserHost: Send + Sync {
    /// Open an isolated context
    async fn new_context(&self, options: ContextOptions) -> CoreResult<Arc<dyn LiveContext>>;
}

/// Starts or attaches to browsers by engine name
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    /// Launch a browser of the given engine
    async fn launch(&self, browser_name: &str) -> CoreResult<Arc<dyn BrowserHost>>;
}
