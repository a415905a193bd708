//! Trace sources: a named blob of newline-delimited events.

use crate::event::Event;
use crate::stream::{EventDecoder, StreamError};
use std::path::Path;
use vitrine_core::{CoreError, CoreResult};

/// One recorded trace file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceSource {
    id: String,
    bytes: Vec<u8>,
}

impl TraceSource {
    /// Create from in-memory bytes
    #[must_use]
    pub fn from_bytes(id: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            id: id.into(),
            bytes,
        }
    }

    /// Read a trace file; the file name becomes the source id
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read
    pub async fn read(path: impl AsRef<Path>) -> CoreResult<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await.map_err(|e| CoreError::Io {
            message: format!("{}: {}", path.display(), e),
        })?;
        let id = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        tracing::debug!(trace = %id, bytes = bytes.len(), "read trace source");
        Ok(Self { id, bytes })
    }

    /// Source identifier used in labels and errors
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Raw log bytes
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Decode all events in file order
    ///
    /// # Errors
    ///
    /// Returns error on the first malformed line
    pub fn decode(&self) -> Result<Vec<Event>, StreamError> {
        EventDecoder::new(&self.id).decode(&self.bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_from_bytes() {
        let source = TraceSource::from_bytes(
            "mem",
            br#"{"type":"context-destroyed","contextId":"c9"}"#.to_vec(),
        );
        assert_eq!(source.id(), "mem");
        assert_eq!(source.decode().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_read_uses_file_name_as_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("worker-0.trace");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, r#"{{"type":"context-created","contextId":"c1","browserName":"firefox"}}"#)
            .unwrap();

        let source = TraceSource::read(&path).await.unwrap();
        assert_eq!(source.id(), "worker-0.trace");
        assert_eq!(source.decode().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_read_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = TraceSource::read(dir.path().join("absent.trace"))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Io { .. }));
    }
}
