//! VITRINE Storage
//!
//! Content-addressed, read-only access to recorded resource bodies and
//! snapshot documents. The trace log only carries hashes; bodies live here.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod blob;
pub mod store;

pub use blob::Blob;
pub use store::{BlobStore, DirStore, MemoryStore, StoreConfig, StoreError, StoreStats};
