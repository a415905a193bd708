//! Replay sessions: one per recorded browser.
//!
//! A replay session owns a running browser and lazily mirrors every recorded
//! context into a live one, so replaying several actions of the same context
//! reuses the same emulation settings and storage.

use crate::engine::{ReplayConfig, ReplayError, ReplayReport, SnapshotReplayer};
use crate::host::{BindingHandler, BrowserHost, BrowserLauncher, ContextOptions, LiveContext, LivePage};
use crate::session::{ActionRef, TraceSession};
use crate::tree::{ContextTree, TreeBuilder};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError};
use tokio::sync::Mutex;
use vitrine_core::{ContextId, CoreError, CoreResult};
use vitrine_storage::BlobStore;

/// Name of the function exposed to viewer pages
pub const RENDER_BINDING: &str = "renderSnapshot";

/// Page showing a replayed snapshot
pub struct ReplayedPage {
    /// Live page; dropping it releases it to the host
    pub page: Arc<dyn LivePage>,
    /// Outcome of the replay
    pub report: ReplayReport,
}

/// Replays actions recorded in one browser
pub struct ReplaySession {
    browser_name: String,
    host: Arc<dyn BrowserHost>,
    session: Arc<TraceSession>,
    replayer: SnapshotReplayer,
    contexts: Mutex<HashMap<ContextId, Arc<dyn LiveContext>>>,
}

impl ReplaySession {
    /// Create a session replaying into `host`
    #[must_use]
    pub fn new(
        browser_name: impl Into<String>,
        host: Arc<dyn BrowserHost>,
        session: Arc<TraceSession>,
        store: Arc<dyn BlobStore>,
        config: ReplayConfig,
    ) -> Self {
        Self {
            browser_name: browser_name.into(),
            host,
            replayer: SnapshotReplayer::new(Arc::clone(&session), store).with_config(config),
            session,
            contexts: Mutex::new(HashMap::new()),
        }
    }

    /// Browser this session replays
    #[must_use]
    pub fn browser_name(&self) -> &str {
        &self.browser_name
    }

    /// Context/action tree of this browser
    #[must_use]
    pub fn tree(&self) -> ContextTree {
        TreeBuilder::new(&self.session).build(&self.browser_name)
    }

    /// Number of live contexts created so far
    pub async fn live_context_count(&self) -> usize {
        self.contexts.lock().await.len()
    }

    /// Live counterpart of a recorded context, created on first use.
    ///
    /// # Errors
    ///
    /// Returns error if the context was never recorded, belongs to another
    /// browser, or the host cannot create it
    pub async fn live_context(&self, context_id: &ContextId) -> Result<Arc<dyn LiveContext>, ReplayError> {
        let created = self
            .session
            .index()
            .context(context_id)
            .ok_or_else(|| ReplayError::UnknownContext(context_id.clone()))?;
        if created.browser_name != self.browser_name {
            return Err(ReplayError::WrongBrowser {
                context: context_id.clone(),
                expected: self.browser_name.clone(),
                actual: created.browser_name.clone(),
            });
        }

        let mut contexts = self.contexts.lock().await;
        if let Some(live) = contexts.get(context_id) {
            return Ok(Arc::clone(live));
        }
        let live = self
            .host
            .new_context(ContextOptions::from(created))
            .await
            .map_err(ReplayError::Host)?;
        tracing::debug!(context = %context_id, browser = %self.browser_name, "live context created");
        contexts.insert(context_id.clone(), Arc::clone(&live));
        Ok(live)
    }

    /// Replay the snapshot captured with an action on a fresh page.
    ///
    /// # Errors
    ///
    /// Returns error if the action, its context or its snapshot cannot be
    /// resolved, or the replay itself fails
    pub async fn replay_action(&self, id: ActionRef) -> Result<ReplayedPage, ReplayError> {
        let action = self.session.action(id).ok_or(ReplayError::UnknownAction(id))?;
        let snapshot = action.snapshot.as_ref().ok_or(ReplayError::MissingSnapshot(id))?;
        let context = self.live_context(&action.context_id).await?;
        let page = context.new_page().await.map_err(ReplayError::Host)?;

        tracing::debug!(action = %id, context = %action.context_id, "replaying action");
        let report = self
            .replayer
            .replay_ref(page.as_ref(), &action.context_id, snapshot)
            .await?;
        Ok(ReplayedPage { page, report })
    }

    /// Expose [`RENDER_BINDING`] on a viewer page.
    ///
    /// The binding takes an action reference (`{"trace":0,"index":3}`),
    /// replays it and answers with the replay report. The most recent replay
    /// page stays open until the next call.
    ///
    /// # Errors
    ///
    /// Returns error if the host refuses the binding
    pub async fn install_binding(self: &Arc<Self>, page: &dyn LivePage) -> CoreResult<()> {
        let handler = Arc::new(RenderBinding {
            session: Arc::clone(self),
            current: std::sync::Mutex::new(None),
        });
        page.expose_binding(RENDER_BINDING, handler).await
    }

    /// Close every live context.
    ///
    /// # Errors
    ///
    /// Returns the first host failure; remaining contexts are still closed
    pub async fn close(&self) -> CoreResult<()> {
        let contexts: Vec<_> = self.contexts.lock().await.drain().collect();
        let mut first_error = None;
        for (id, context) in contexts {
            if let Err(e) = context.close().await {
                tracing::warn!(context = %id, error = %e, "failed to close live context");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

struct RenderBinding {
    session: Arc<ReplaySession>,
    current: std::sync::Mutex<Option<Arc<dyn LivePage>>>,
}

#[async_trait]
impl BindingHandler for RenderBinding {
    async fn call(&self, payload: serde_json::Value) -> CoreResult<serde_json::Value> {
        let id: ActionRef = serde_json::from_value(payload).map_err(|e| CoreError::Validation {
            field: "action".to_string(),
            reason: e.to_string(),
        })?;
        let replayed = self.session.replay_action(id).await?;
        let report = serde_json::to_value(&replayed.report)?;
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = Some(replayed.page);
        Ok(report)
    }
}

/// Launch one replay session per browser found in `session`.
///
/// # Errors
///
/// Returns the first launch failure
pub async fn open_sessions(
    launcher: &dyn BrowserLauncher,
    session: Arc<TraceSession>,
    store: Arc<dyn BlobStore>,
    config: ReplayConfig,
) -> CoreResult<Vec<Arc<ReplaySession>>> {
    let browsers: Vec<String> = session.index().browser_names().map(str::to_string).collect();
    let mut sessions = Vec::with_capacity(browsers.len());
    for browser in browsers {
        let host = launcher.launch(&browser).await?;
        tracing::info!(browser = %browser, "replay session opened");
        sessions.push(Arc::new(ReplaySession::new(
            browser,
            host,
            Arc::clone(&session),
            Arc::clone(&store),
            config.clone(),
        )));
    }
    Ok(sessions)
}
