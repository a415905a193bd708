//! Snapshot replayer: reproduce a captured DOM inside a live page.
//!
//! Every request the page makes is intercepted. The root document is served
//! from the snapshot html; everything else is resolved through frame
//! overrides and the resource matcher, or aborted when nothing matches.

use crate::host::{InterceptedRequest, LiveFrameId, LivePage, Route, RouteHandler, RouteResponse};
use crate::matcher::ResourceMatcher;
use crate::session::{ActionRef, TraceSession};
use crate::snapshot::PageSnapshot;
use bytes::Bytes;
use futures::future::{BoxFuture, FutureExt};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use vitrine_core::{ContentHash, ContextId, CoreError};
use vitrine_log::{Header, SnapshotRef};
use vitrine_storage::BlobStore;

const ALLOW_ORIGIN: &str = "access-control-allow-origin";

/// Replay configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    /// Value of the injected `access-control-allow-origin` header
    pub allow_origin: String,
    /// Content type declared for frame documents
    pub html_content_type: String,
    /// Attach child frames after the root document loads
    pub attach_frames: bool,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            allow_origin: "*".to_string(),
            html_content_type: "text/html".to_string(),
            attach_frames: true,
        }
    }
}

/// Replay errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReplayError {
    /// Action id does not resolve to an action event
    #[error("Unknown action {0}")]
    UnknownAction(ActionRef),
    /// Action references a context the session never created
    #[error("Unknown context {0}")]
    UnknownContext(ContextId),
    /// Context was recorded in another browser
    #[error("Context {context} was recorded in {actual}, not {expected}")]
    WrongBrowser {
        /// Recorded context
        context: ContextId,
        /// Browser of this replay session
        expected: String,
        /// Browser the context was recorded in
        actual: String,
    },
    /// Action has no snapshot
    #[error("Action {0} has no snapshot")]
    MissingSnapshot(ActionRef),
    /// Snapshot blob missing or undecodable
    #[error("Snapshot {hash} unavailable: {reason}")]
    SnapshotUnavailable {
        /// Snapshot blob hash
        hash: ContentHash,
        /// Store or decode failure
        reason: CoreError,
    },
    /// Snapshot has no frames
    #[error("Snapshot has no frames")]
    EmptySnapshot,
    /// Interceptor could not be installed
    #[error("Failed to install request interceptor: {0}")]
    InterceptorInstall(CoreError),
    /// Root document navigation failed
    #[error("Failed to navigate to {url}: {reason}")]
    Navigation {
        /// Root frame URL
        url: String,
        /// Host failure
        reason: CoreError,
    },
    /// Live context or page could not be opened
    #[error("Rendering host failure: {0}")]
    Host(CoreError),
}

impl From<ReplayError> for CoreError {
    fn from(err: ReplayError) -> Self {
        match err {
            ReplayError::UnknownAction(id) => CoreError::NotFound {
                kind: "Action".to_string(),
                id: id.to_string(),
            },
            ReplayError::UnknownContext(id) => CoreError::NotFound {
                kind: "Context".to_string(),
                id: id.to_string(),
            },
            ReplayError::InterceptorInstall(reason) | ReplayError::Host(reason) => reason,
            other => CoreError::Validation {
                field: "replay".to_string(),
                reason: other.to_string(),
            },
        }
    }
}

/// Replay progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ReplayState {
    /// Nothing installed yet
    Idle,
    /// Interceptor active, root not yet loaded
    RouteInstalled,
    /// Root document loaded and its requests resolved
    RootServed,
    /// Child frames bound to their snapshots
    FramesAttached,
    /// Every interception resolved
    Settled,
}

/// Summary of one replay invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayReport {
    /// Final state
    pub state: ReplayState,
    /// Requests fulfilled from recorded data
    pub fulfilled: usize,
    /// Requests aborted
    pub aborted: usize,
    /// Distinct unmatched URLs, first seen first
    pub unmatched: Vec<String>,
    /// Live child frames bound to snapshot frames
    pub frames_attached: usize,
}

/// Shared state of one replay, guarded by a single lock
#[derive(Default)]
struct Monitor {
    /// Live frame -> index into the snapshot frames
    bindings: HashMap<LiveFrameId, usize>,
    /// Live frames whose document was already served
    served: HashSet<LiveFrameId>,
    /// Unmatched URLs already reported
    unmatched: IndexSet<String>,
    /// Resolutions not yet joined
    pending: Vec<JoinHandle<()>>,
    /// Replay finished; later resolutions run detached
    settled: bool,
    fulfilled: usize,
    aborted: usize,
}

struct ReplayShared {
    session: Arc<TraceSession>,
    store: Arc<dyn BlobStore>,
    config: ReplayConfig,
    context_id: ContextId,
    snapshot: PageSnapshot,
    runtime: Handle,
    monitor: Mutex<Monitor>,
}

enum Resolution {
    Fulfill(RouteResponse),
    Unmatched,
}

impl ReplayShared {
    fn new(replayer: &SnapshotReplayer, context_id: &ContextId, snapshot: PageSnapshot) -> Self {
        Self {
            session: Arc::clone(&replayer.session),
            store: Arc::clone(&replayer.store),
            config: replayer.config.clone(),
            context_id: context_id.clone(),
            snapshot,
            runtime: Handle::current(),
            monitor: Mutex::new(Monitor::default()),
        }
    }

    fn monitor(&self) -> MutexGuard<'_, Monitor> {
        self.monitor.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn html_response(&self, html: &str) -> RouteResponse {
        RouteResponse {
            status: 200,
            content_type: Some(self.config.html_content_type.clone()),
            headers: vec![Header::new(ALLOW_ORIGIN, self.config.allow_origin.clone())],
            body: Bytes::copy_from_slice(html.as_bytes()),
        }
    }

    fn resource_response(&self, content_type: Option<String>, recorded: &[Header], body: Bytes) -> RouteResponse {
        let mut headers: Vec<Header> = recorded
            .iter()
            .filter(|h| !h.name.eq_ignore_ascii_case(ALLOW_ORIGIN))
            .cloned()
            .collect();
        headers.push(Header::new(ALLOW_ORIGIN, self.config.allow_origin.clone()));
        RouteResponse {
            status: 200,
            content_type,
            headers,
            body,
        }
    }

    /// Bind a live frame to a snapshot frame; returns whether its document
    /// was already served.
    fn bind(&self, frame: LiveFrameId, idx: usize) -> bool {
        let mut monitor = self.monitor();
        let served = monitor.served.contains(&frame);
        monitor.bindings.insert(frame, idx);
        served
    }

    /// Snapshot frame serving requests of a live frame
    fn frame_for(&self, request: &InterceptedRequest) -> Option<(usize, bool)> {
        let mut monitor = self.monitor();
        if let Some(&idx) = monitor.bindings.get(&request.frame) {
            return Some((idx, false));
        }
        if !request.is_navigation {
            return None;
        }
        let idx = self.snapshot.child_for_live_url(&request.url)?;
        monitor.bindings.insert(request.frame.clone(), idx);
        monitor.served.insert(request.frame.clone());
        Some((idx, true))
    }

    async fn read_body(&self, hash: &ContentHash, url: &str) -> Option<Bytes> {
        match self.store.read(hash).await {
            Ok(blob) => Some(blob.bytes()),
            Err(e) => {
                tracing::debug!(%url, error = %e, "recorded body unavailable");
                None
            }
        }
    }

    async fn resolve(&self, request: &InterceptedRequest) -> Resolution {
        let frames = &self.snapshot.frames;
        if request.url == frames[0].url {
            self.monitor().served.insert(request.frame.clone());
            return Resolution::Fulfill(self.html_response(&frames[0].html));
        }

        let Some((idx, document)) = self.frame_for(request) else {
            return Resolution::Unmatched;
        };
        let frame = &frames[idx];
        if document {
            return Resolution::Fulfill(self.html_response(&frame.html));
        }

        let matcher = ResourceMatcher::new(self.session.index());
        let matched = matcher.find(&request.url, &self.context_id, Some(&frame.frame_id));
        let hash = match (frame.override_for(&request.url), matched) {
            (Some(over), _) => &over.content_hash,
            (None, Some(resource)) => &resource.content_hash,
            (None, None) => return Resolution::Unmatched,
        };
        let Some(body) = self.read_body(hash, &request.url).await else {
            return Resolution::Unmatched;
        };
        let (content_type, headers) = match matched {
            Some(resource) => (
                Some(resource.content_type.clone()).filter(|ct| !ct.is_empty()),
                resource.response_headers.as_slice(),
            ),
            None => (None, &[][..]),
        };
        Resolution::Fulfill(self.resource_response(content_type, headers, body))
    }

    async fn handle(&self, route: Box<dyn Route>) {
        let request = route.request().clone();
        match self.resolve(&request).await {
            Resolution::Fulfill(response) => match route.fulfill(response).await {
                Ok(()) => self.monitor().fulfilled += 1,
                Err(e) => tracing::warn!(url = %request.url, error = %e, "fulfill failed"),
            },
            Resolution::Unmatched => {
                let first = self.monitor().unmatched.insert(request.url.clone());
                if first {
                    tracing::warn!(url = %request.url, "no recorded resource for request");
                }
                match route.abort().await {
                    Ok(()) => self.monitor().aborted += 1,
                    Err(e) => tracing::debug!(url = %request.url, error = %e, "abort failed"),
                }
            }
        }
    }

    /// Join every outstanding resolution, including ones spawned meanwhile.
    /// With `settle`, resolutions spawned after the last join are no longer
    /// tracked.
    async fn drain(&self, settle: bool) {
        loop {
            let pending = {
                let mut monitor = self.monitor();
                if monitor.pending.is_empty() {
                    monitor.settled |= settle;
                    return;
                }
                std::mem::take(&mut monitor.pending)
            };
            for result in futures::future::join_all(pending).await {
                if let Err(e) = result {
                    tracing::error!(error = %e, "request resolution panicked");
                }
            }
        }
    }

    fn attach_children<'a>(&'a self, page: &'a dyn LivePage, parent: LiveFrameId) -> BoxFuture<'a, usize> {
        async move {
            let children = match page.child_frames(&parent).await {
                Ok(children) => children,
                Err(e) => {
                    tracing::warn!(frame = %parent, error = %e, "cannot list child frames");
                    return 0;
                }
            };
            let mut attached = 0;
            for child in children {
                if let Err(e) = page.wait_for_load(&child).await {
                    tracing::warn!(frame = %child, error = %e, "child frame failed to load");
                    continue;
                }
                let live_url = match page.frame_url(&child).await {
                    Ok(url) => url,
                    Err(e) => {
                        tracing::warn!(frame = %child, error = %e, "cannot read child frame url");
                        continue;
                    }
                };
                let Some(idx) = self.snapshot.child_for_live_url(&live_url) else {
                    tracing::debug!(frame = %child, url = %live_url, "no snapshot frame for child");
                    continue;
                };
                let served = self.bind(child.clone(), idx);
                if !served {
                    let html = &self.snapshot.frames[idx].html;
                    if let Err(e) = page.set_content(&child, html).await {
                        tracing::warn!(frame = %child, error = %e, "cannot write child frame document");
                        continue;
                    }
                    self.monitor().served.insert(child.clone());
                }
                attached += 1;
                attached += self.attach_children(page, child).await;
            }
            attached
        }
        .boxed()
    }

    fn report(&self, state: ReplayState, frames_attached: usize) -> ReplayReport {
        let monitor = self.monitor();
        ReplayReport {
            state,
            fulfilled: monitor.fulfilled,
            aborted: monitor.aborted,
            unmatched: monitor.unmatched.iter().cloned().collect(),
            frames_attached,
        }
    }
}

/// Interceptor installed on the replay page
struct Interceptor {
    shared: Arc<ReplayShared>,
}

impl RouteHandler for Interceptor {
    fn on_route(&self, route: Box<dyn Route>) {
        let shared = Arc::clone(&self.shared);
        let handle = self
            .shared
            .runtime
            .spawn(async move { shared.handle(route).await });
        let mut monitor = self.shared.monitor();
        if !monitor.settled {
            monitor.pending.push(handle);
        }
    }
}

/// Replays page snapshots against a live page
pub struct SnapshotReplayer {
    session: Arc<TraceSession>,
    store: Arc<dyn BlobStore>,
    config: ReplayConfig,
}

impl SnapshotReplayer {
    /// Create a replayer over a loaded session and its blob store
    #[must_use]
    pub fn new(session: Arc<TraceSession>, store: Arc<dyn BlobStore>) -> Self {
        Self {
            session,
            store,
            config: ReplayConfig::default(),
        }
    }

    /// Create with custom config
    #[must_use]
    pub fn with_config(mut self, config: ReplayConfig) -> Self {
        self.config = config;
        self
    }

    /// Current configuration
    #[must_use]
    pub const fn config(&self) -> &ReplayConfig {
        &self.config
    }

    /// Fetch the snapshot behind `snapshot` and replay it
    ///
    /// # Errors
    ///
    /// Returns error if the snapshot cannot be loaded or the root document
    /// cannot be served
    pub async fn replay_ref(
        &self,
        page: &dyn LivePage,
        context_id: &ContextId,
        snapshot: &SnapshotRef,
    ) -> Result<ReplayReport, ReplayError> {
        let decoded = PageSnapshot::load(self.store.as_ref(), snapshot)
            .await
            .map_err(|reason| ReplayError::SnapshotUnavailable {
                hash: snapshot.content_hash.clone(),
                reason,
            })?;
        self.replay(page, context_id, decoded).await
    }

    /// Replay a decoded snapshot on `page`, resolving resources recorded in
    /// `context_id`.
    ///
    /// Returns once every request intercepted during the replay has been
    /// answered. There is no internal timeout; a frame that never finishes
    /// loading keeps this future pending.
    ///
    /// # Errors
    ///
    /// Returns error if the snapshot is empty, the interceptor cannot be
    /// installed or the root navigation fails
    pub async fn replay(
        &self,
        page: &dyn LivePage,
        context_id: &ContextId,
        snapshot: PageSnapshot,
    ) -> Result<ReplayReport, ReplayError> {
        let Some(root) = snapshot.root() else {
            return Err(ReplayError::EmptySnapshot);
        };
        let root_url = root.url.clone();
        let main = page.main_frame();
        let mut state = ReplayState::Idle;

        let shared = Arc::new(ReplayShared::new(self, context_id, snapshot));
        shared.bind(main.clone(), 0);

        page.route_all(Arc::new(Interceptor {
            shared: Arc::clone(&shared),
        }))
        .await
        .map_err(ReplayError::InterceptorInstall)?;
        advance(&mut state, ReplayState::RouteInstalled);

        if let Err(reason) = page.goto(&root_url).await {
            shared.drain(true).await;
            return Err(ReplayError::Navigation {
                url: root_url,
                reason,
            });
        }
        shared.drain(false).await;
        advance(&mut state, ReplayState::RootServed);

        let frames_attached = if self.config.attach_frames {
            shared.attach_children(page, main).await
        } else {
            0
        };
        advance(&mut state, ReplayState::FramesAttached);

        shared.drain(true).await;
        advance(&mut state, ReplayState::Settled);

        let report = shared.report(state, frames_attached);
        tracing::info!(
            context = %context_id,
            fulfilled = report.fulfilled,
            aborted = report.aborted,
            unmatched = report.unmatched.len(),
            frames = report.frames_attached,
            "snapshot replayed"
        );
        Ok(report)
    }
}

fn advance(state: &mut ReplayState, next: ReplayState) {
    tracing::debug!(from = ?*state, to = ?next, "replay state");
    *state = next;
}
