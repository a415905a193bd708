//! Core error types for VITRINE.

use std::fmt;

/// Core result type
pub type CoreResult<T> = Result<T, CoreError>;

/// Core error type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Invalid encoding
    InvalidEncoding {
        /// Decoder message
        message: String,
    },

    /// Invalid hash format
    InvalidHash {
        /// Why the hash was rejected
        reason: String,
    },

    /// Parse error
    ParseError {
        /// Trace source identifier
        source: String,
        /// 1-based line number
        line: usize,
        /// Decoder message
        message: String,
    },

    /// Validation error
    Validation {
        /// Field that failed validation
        field: String,
        /// Why it failed
        reason: String,
    },

    /// Not found
    NotFound {
        /// Kind of thing looked up
        kind: String,
        /// Lookup key
        id: String,
    },

    /// I/O failure
    Io {
        /// Error message
        message: String,
    },

    /// Rendering host failure
    Host {
        /// Host operation that failed
        operation: String,
        /// Error message
        message: String,
    },

    /// Internal error (for unexpected errors)
    Internal {
        /// Error message
        message: String,
    },
}

impl CoreError {
    /// Shorthand for a host failure
    #[must_use]
    pub fn host(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Host {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Whether this error is a lookup miss
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidEncoding { message } => write!(f, "Invalid encoding: {}", message),
            Self::InvalidHash { reason } => write!(f, "Invalid hash: {}", reason),
            Self::ParseError {
                source,
                line,
                message,
            } => write!(f, "Parse error in {} at line {}: {}", source, line, message),
            Self::Validation { field, reason } => {
                write!(f, "Validation failed for {}: {}", field, reason)
            }
            Self::NotFound { kind, id } => write!(f, "{} not found: {}", kind, id),
            Self::Io { message } => write!(f, "IO error: {}", message),
            Self::Host { operation, message } => {
                write!(f, "Rendering host failed to {}: {}", operation, message)
            }
            Self::Internal { message } => write!(f, "Internal error: {}", message),
        }
    }
}

impl std::error::Error for CoreError {}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidEncoding {
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for CoreError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
        }
    }
}
