//! VITRINE Trace Log
//!
//! Typed trace events and the newline-delimited JSON stream they are
//! recorded in. Decoding is fail-fast: a source either yields every one of
//! its events in file order or none of them.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod event;
pub mod source;
pub mod stream;

pub use event::{
    ActionEvent, ContextCreated, ContextDestroyed, Event, EventKind, Header, PageLifecycle,
    ResourceEvent, SnapshotRef, ViewportSize,
};
pub use source::TraceSource;
pub use stream::{EventDecoder, StreamError, StreamWriter};
