//! VITRINE Replay Engine
//!
//! Loads trace sources into a session index, builds the context/action tree
//! for display and replays captured DOM snapshots inside a live rendering
//! host, answering every intercepted request from recorded resources.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod engine;
pub mod host;
pub mod index;
pub mod matcher;
pub mod session;
pub mod snapshot;
pub mod tree;
pub mod viewer;

#[cfg(test)]
mod fake_host;

pub use engine::{ReplayConfig, ReplayError, ReplayReport, ReplayState, SnapshotReplayer};
pub use host::{
    BindingHandler, BrowserHost, BrowserLauncher, ContextOptions, InterceptedRequest,
    LiveContext, LiveFrameId, LivePage, Route, RouteHandler, RouteResponse,
};
pub use index::{IngestStats, SessionIndex, normalize_url};
pub use matcher::ResourceMatcher;
pub use session::{ActionRef, LoadedTrace, TraceSession};
pub use snapshot::{FrameSnapshot, PageSnapshot, ResourceOverride};
pub use tree::{ActionEntry, ContextNode, ContextTree, PageGroup, TreeBuilder};
pub use viewer::{RENDER_BINDING, ReplaySession, ReplayedPage, open_sessions};
