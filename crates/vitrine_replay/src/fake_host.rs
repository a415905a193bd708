//! In-process rendering host for tests.
//!
//! Pages fire scripted requests through the installed interceptor and
//! record how each one was answered.

use crate::host::{
    BindingHandler, BrowserHost, BrowserLauncher, ContextOptions, InterceptedRequest, LiveContext,
    LiveFrameId, LivePage, Route, RouteHandler, RouteResponse,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use vitrine_core::{CoreError, CoreResult};

const MAIN: &str = "main";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Outcome {
    Fulfilled(RouteResponse),
    Aborted,
}

type OutcomeLog = Arc<Mutex<Vec<(String, Outcome)>>>;

struct FakeRoute {
    request: InterceptedRequest,
    log: OutcomeLog,
}

#[async_trait]
impl Route for FakeRoute {
    fn request(&self) -> &InterceptedRequest {
        &self.request
    }

    async fn fulfill(self: Box<Self>, response: RouteResponse) -> CoreResult<()> {
        tokio::task::yield_now().await;
        let FakeRoute { request, log } = *self;
        log.lock()
            .unwrap()
            .push((request.url, Outcome::Fulfilled(response)));
        Ok(())
    }

    async fn abort(self: Box<Self>) -> CoreResult<()> {
        let FakeRoute { request, log } = *self;
        log.lock().unwrap().push((request.url, Outcome::Aborted));
        Ok(())
    }
}

#[derive(Default)]
struct PageState {
    handler: Option<Arc<dyn RouteHandler>>,
    navigations: Vec<String>,
    routed_before_navigation: bool,
    contents: HashMap<LiveFrameId, String>,
    bindings: HashMap<String, Arc<dyn BindingHandler>>,
}

pub(crate) struct FakePage {
    state: Mutex<PageState>,
    log: OutcomeLog,
    /// Requests fired after the main document request
    requests: Vec<InterceptedRequest>,
    /// Requests fired when a frame's content is written
    content_requests: HashMap<LiveFrameId, Vec<String>>,
    children: HashMap<LiveFrameId, Vec<LiveFrameId>>,
    urls: HashMap<LiveFrameId, String>,
    fail_route: bool,
    fail_navigation: bool,
}

impl FakePage {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(PageState::default()),
            log: Arc::new(Mutex::new(Vec::new())),
            requests: Vec::new(),
            content_requests: HashMap::new(),
            children: HashMap::new(),
            urls: HashMap::new(),
            fail_route: false,
            fail_navigation: false,
        }
    }

    pub(crate) fn with_request(mut self, url: &str, frame: &str, is_navigation: bool) -> Self {
        self.requests.push(InterceptedRequest {
            url: url.to_string(),
            frame: LiveFrameId::new(frame),
            is_navigation,
        });
        self
    }

    pub(crate) fn with_child(mut self, parent: &str, child: &str, url: &str) -> Self {
        self.children
            .entry(LiveFrameId::new(parent))
            .or_default()
            .push(LiveFrameId::new(child));
        self.urls.insert(LiveFrameId::new(child), url.to_string());
        self
    }

    pub(crate) fn with_content_request(mut self, frame: &str, url: &str) -> Self {
        self.content_requests
            .entry(LiveFrameId::new(frame))
            .or_default()
            .push(url.to_string());
        self
    }

    pub(crate) fn failing_route_install(mut self) -> Self {
        self.fail_route = true;
        self
    }

    pub(crate) fn failing_navigation(mut self) -> Self {
        self.fail_navigation = true;
        self
    }

    fn fire(&self, request: InterceptedRequest) {
        let handler = self.state.lock().unwrap().handler.clone();
        let Some(handler) = handler else {
            return;
        };
        handler.on_route(Box::new(FakeRoute {
            request,
            log: Arc::clone(&self.log),
        }));
    }

    pub(crate) fn outcomes_for(&self, url: &str) -> Vec<Outcome> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|(u, _)| u == url)
            .map(|(_, outcome)| outcome.clone())
            .collect()
    }

    pub(crate) fn outcome_for(&self, url: &str) -> Option<Outcome> {
        self.outcomes_for(url).into_iter().next()
    }

    pub(crate) fn content_of(&self, frame: &str) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .contents
            .get(&LiveFrameId::new(frame))
            .cloned()
    }

    pub(crate) fn navigations(&self) -> Vec<String> {
        self.state.lock().unwrap().navigations.clone()
    }

    pub(crate) fn routed_before_first_navigation(&self) -> bool {
        self.state.lock().unwrap().routed_before_navigation
    }

    pub(crate) fn binding(&self, name: &str) -> Option<Arc<dyn BindingHandler>> {
        self.state.lock().unwrap().bindings.get(name).cloned()
    }
}

#[async_trait]
impl LivePage for FakePage {
    async fn route_all(&self, handler: Arc<dyn RouteHandler>) -> CoreResult<()> {
        if self.fail_route {
            return Err(CoreError::host("route", "page closed"));
        }
        self.state.lock().unwrap().handler = Some(handler);
        Ok(())
    }

    async fn goto(&self, url: &str) -> CoreResult<()> {
        {
            let mut state = self.state.lock().unwrap();
            if state.navigations.is_empty() {
                state.routed_before_navigation = state.handler.is_some();
            }
            state.navigations.push(url.to_string());
        }
        if self.fail_navigation {
            return Err(CoreError::host("navigate", "net::ERR_FAILED"));
        }
        self.fire(InterceptedRequest {
            url: url.to_string(),
            frame: LiveFrameId::new(MAIN),
            is_navigation: true,
        });
        for request in &self.requests {
            self.fire(request.clone());
        }
        Ok(())
    }

    fn main_frame(&self) -> LiveFrameId {
        LiveFrameId::new(MAIN)
    }

    async fn child_frames(&self, frame: &LiveFrameId) -> CoreResult<Vec<LiveFrameId>> {
        Ok(self.children.get(frame).cloned().unwrap_or_default())
    }

    async fn wait_for_load(&self, _frame: &LiveFrameId) -> CoreResult<()> {
        tokio::task::yield_now().await;
        Ok(())
    }

    async fn frame_url(&self, frame: &LiveFrameId) -> CoreResult<String> {
        self.urls.get(frame).cloned().ok_or_else(|| CoreError::NotFound {
            kind: "Frame".to_string(),
            id: frame.to_string(),
        })
    }

    async fn set_content(&self, frame: &LiveFrameId, html: &str) -> CoreResult<()> {
        self.state
            .lock()
            .unwrap()
            .contents
            .insert(frame.clone(), html.to_string());
        for url in self.content_requests.get(frame).into_iter().flatten() {
            self.fire(InterceptedRequest {
                url: url.clone(),
                frame: frame.clone(),
                is_navigation: false,
            });
        }
        Ok(())
    }

    async fn expose_binding(
        &self,
        name: &str,
        handler: Arc<dyn BindingHandler>,
    ) -> CoreResult<()> {
        self.state
            .lock()
            .unwrap()
            .bindings
            .insert(name.to_string(), handler);
        Ok(())
    }
}

pub(crate) struct FakeContext {
    pub(crate) options: ContextOptions,
    pages: Mutex<Vec<Arc<FakePage>>>,
    page_factory: Arc<dyn Fn() -> FakePage + Send + Sync>,
}

impl FakeContext {
    pub(crate) fn page_count(&self) -> usize {
        self.pages.lock().unwrap().len()
    }

    pub(crate) fn pages(&self) -> Vec<Arc<FakePage>> {
        self.pages.lock().unwrap().clone()
    }
}

#[async_trait]
impl LiveContext for FakeContext {
    async fn new_page(&self) -> CoreResult<Arc<dyn LivePage>> {
        let page = Arc::new((self.page_factory)());
        self.pages.lock().unwrap().push(Arc::clone(&page));
        Ok(page)
    }

    async fn close(&self) -> CoreResult<()> {
        self.pages.lock().unwrap().clear();
        Ok(())
    }
}

/// Browser handing out fake contexts whose pages come from a factory
pub(crate) struct FakeBrowser {
    contexts: Mutex<Vec<Arc<FakeContext>>>,
    page_factory: Arc<dyn Fn() -> FakePage + Send + Sync>,
}

impl FakeBrowser {
    pub(crate) fn new(page_factory: impl Fn() -> FakePage + Send + Sync + 'static) -> Self {
        Self {
            contexts: Mutex::new(Vec::new()),
            page_factory: Arc::new(page_factory),
        }
    }

    pub(crate) fn contexts(&self) -> Vec<Arc<FakeContext>> {
        self.contexts.lock().unwrap().clone()
    }
}

#[async_trait]
impl BrowserHost for FakeBrowser {
    async fn new_context(&self, options: ContextOptions) -> CoreResult<Arc<dyn LiveContext>> {
        let context = Arc::new(FakeContext {
            options,
            pages: Mutex::new(Vec::new()),
            page_factory: Arc::clone(&self.page_factory),
        });
        self.contexts.lock().unwrap().push(Arc::clone(&context));
        Ok(context)
    }
}

/// Launcher recording which engines were requested
#[derive(Default)]
pub(crate) struct FakeLauncher {
    pub(crate) launched: Mutex<Vec<String>>,
}

#[async_trait]
impl BrowserLauncher for FakeLauncher {
    async fn launch(&self, browser_name: &str) -> CoreResult<Arc<dyn BrowserHost>> {
        self.launched.lock().unwrap().push(browser_name.to_string());
        Ok(Arc::new(FakeBrowser::new(FakePage::new)))
    }
}
