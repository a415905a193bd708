//! Trace session: the loaded trace sources and the index built over them.

use crate::index::{IngestStats, SessionIndex};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use vitrine_core::{CoreError, CoreResult};
use vitrine_log::{ActionEvent, Event, TraceSource};

/// Address of an action event within a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActionRef {
    /// Trace ordinal in load order
    pub trace: usize,
    /// Event ordinal within the trace
    pub index: usize,
}

impl ActionRef {
    /// Create a reference
    #[must_use]
    pub const fn new(trace: usize, index: usize) -> Self {
        Self { trace, index }
    }
}

impl fmt::Display for ActionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.trace, self.index)
    }
}

impl FromStr for ActionRef {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CoreError::Validation {
            field: "action".to_string(),
            reason: format!("expected <trace>:<index>, got {}", s),
        };
        let (trace, index) = s.split_once(':').ok_or_else(invalid)?;
        Ok(Self {
            trace: trace.trim().parse().map_err(|_| invalid())?,
            index: index.trim().parse().map_err(|_| invalid())?,
        })
    }
}

/// One successfully loaded trace source
#[derive(Debug, Clone)]
pub struct LoadedTrace {
    id: String,
    events: Vec<Event>,
}

impl LoadedTrace {
    /// Source identifier
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Events in file order
    #[must_use]
    pub fn events(&self) -> &[Event] {
        &self.events
    }
}

/// Every loaded trace source plus the session index over their union
#[derive(Debug, Default)]
pub struct TraceSession {
    traces: Vec<LoadedTrace>,
    index: SessionIndex,
}

impl TraceSession {
    /// Create an empty session
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read and load trace files in order
    ///
    /// # Errors
    ///
    /// Returns the first read or parse failure
    pub async fn open<P: AsRef<Path>>(paths: &[P]) -> CoreResult<Self> {
        let mut session = Self::new();
        for path in paths {
            let source = TraceSource::read(path).await?;
            session.load(&source)?;
        }
        Ok(session)
    }

    /// Load one trace source and return its ordinal.
    ///
    /// Loading is all-or-nothing: a malformed line fails the call and leaves
    /// the session as it was. Loading the same source twice adds two traces.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::ParseError` for the first malformed line
    pub fn load(&mut self, source: &TraceSource) -> CoreResult<usize> {
        let events = source.decode()?;
        let IngestStats { indexed, orphans } = self.index.ingest(&events);
        tracing::info!(
            trace = source.id(),
            events = events.len(),
            indexed,
            orphans,
            "loaded trace"
        );
        self.traces.push(LoadedTrace {
            id: source.id().to_string(),
            events,
        });
        Ok(self.traces.len() - 1)
    }

    /// Loaded traces in load order
    #[must_use]
    pub fn traces(&self) -> &[LoadedTrace] {
        &self.traces
    }

    /// Session index
    #[must_use]
    pub const fn index(&self) -> &SessionIndex {
        &self.index
    }

    /// Look up an action event
    #[must_use]
    pub fn action(&self, id: ActionRef) -> Option<&ActionEvent> {
        self.traces
            .get(id.trace)?
            .events
            .get(id.index)?
            .as_action()
    }

    /// Total events across all traces
    #[must_use]
    pub fn event_count(&self) -> usize {
        self.traces.iter().map(|t| t.events.len()).sum()
    }
}
