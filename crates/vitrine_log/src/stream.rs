//! Newline-delimited event stream decoding and encoding.

use crate::event::Event;
use vitrine_core::CoreError;

/// Stream errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    /// A line is not a valid event object
    #[error("Malformed event in {trace} at line {line}: {message}")]
    Parse {
        /// Trace source identifier
        trace: String,
        /// 1-based line number
        line: usize,
        /// Decoder message
        message: String,
    },

    /// Source is not UTF-8
    #[error("Trace source {trace} is not valid UTF-8")]
    InvalidUtf8 {
        /// Trace source identifier
        trace: String,
    },
}

impl From<StreamError> for CoreError {
    fn from(err: StreamError) -> Self {
        match err {
            StreamError::Parse {
                trace,
                line,
                message,
            } => CoreError::ParseError {
                source: trace,
                line,
                message,
            },
            StreamError::InvalidUtf8 { trace } => CoreError::ParseError {
                source: trace,
                line: 0,
                message: "invalid UTF-8".to_string(),
            },
        }
    }
}

/// Decoder for one trace source
pub struct EventDecoder<'a> {
    source: &'a str,
}

impl<'a> EventDecoder<'a> {
    /// Create a decoder; `source` names the trace in errors
    #[must_use]
    pub const fn new(source: &'a str) -> Self {
        Self { source }
    }

    /// Decode every event in `text`, in file order
    ///
    /// # Errors
    ///
    /// Returns the first malformed line; no events are returned in that case
    pub fn decode_str(&self, text: &str) -> Result<Vec<Event>, StreamError> {
        let mut events = Vec::new();
        for (idx, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            let event = serde_json::from_str::<Event>(line).map_err(|e| StreamError::Parse {
                trace: self.source.to_string(),
                line: idx + 1,
                message: e.to_string(),
            })?;
            events.push(event);
        }
        Ok(events)
    }

    /// Decode raw bytes
    ///
    /// # Errors
    ///
    /// Returns error if the bytes are not UTF-8 or a line is malformed
    pub fn decode(&self, bytes: &[u8]) -> Result<Vec<Event>, StreamError> {
        let text = std::str::from_utf8(bytes).map_err(|_| StreamError::InvalidUtf8 {
            trace: self.source.to_string(),
        })?;
        self.decode_str(text)
    }
}

/// Stream writer for producing a trace log
pub struct StreamWriter {
    buffer: String,
    count: usize,
}

impl StreamWriter {
    /// Create an empty writer
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer: String::new(),
            count: 0,
        }
    }

    /// Append one event as a line
    ///
    /// # Errors
    ///
    /// Returns error if the event cannot be serialized
    pub fn write(&mut self, event: &Event) -> Result<(), CoreError> {
        let line = serde_json::to_string(event)?;
        self.buffer.push_str(&line);
        self.buffer.push('\n');
        self.count += 1;
        Ok(())
    }

    /// Number of events written
    #[must_use]
    pub const fn len(&self) -> usize {
        self.count
    }

    /// Whether nothing was written
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Finish and return the log bytes
    #[must_use]
    pub fn finalize(self) -> Vec<u8> {
        self.buffer.into_bytes()
    }
}

impl Default for StreamWriter {
    fn default() -> Self {
        Self::new()
    }
}
