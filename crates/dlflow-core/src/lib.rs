//! DLFlow Core Library
//!
//! This crate provides the domain models, error types, configuration, and the
//! validation-error taxonomy shared by the ingestion server and its client.

pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod validation;

// Re-export commonly used types
pub use config::{Config, JobStoreBackend, PreviewFailurePolicy};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use validation::{FileValidationPolicy, ValidationError, ValidationErrorCode};
