//! VITRINE Core Types
//!
//! Identifiers, content hashes and the shared error type.
//! This crate contains pure types with no I/O.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod hash;
pub mod id;

// Re-exports
pub use error::{CoreError, CoreResult};
pub use hash::ContentHash;
pub use id::{ContextId, FrameId, PageId};
