//! DLFlow Storage Library
//!
//! Storage abstraction for uploaded dataset bytes and the local filesystem
//! backend used by the ingestion server.
//!
//! # Storage key format
//!
//! Every upload is stored flat under the uploads directory as `{id}.{ext}`.
//! Keys must not contain `..`, a path separator or a leading `/`; the
//! `{id}.{ext}` name itself comes from `FileJob::stored_filename_for`.

pub mod local;
pub mod traits;

// Re-export commonly used types
pub use local::LocalStorage;
pub use traits::{Storage, StorageError, StorageResult};
