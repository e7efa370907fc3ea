//! Shared constants.

/// API base path prefix.
pub const API_PREFIX: &str = "/api";

/// Default upload limit (100 MB).
pub const DEFAULT_MAX_FILE_SIZE_BYTES: usize = 100 * 1024 * 1024;

/// Number of head rows included in a preview.
pub const DEFAULT_PREVIEW_ROWS: usize = 10;

/// Rows scanned by content-level validation.
pub const CONTENT_VALIDATION_ROWS: usize = 10_000;

/// Progress reported while a job is waiting for validation.
pub const PROGRESS_VALIDATING: u8 = 50;

/// Progress of a finished job.
pub const PROGRESS_COMPLETE: u8 = 100;

/// Extensions accepted by default (without leading dot).
pub const DEFAULT_ALLOWED_EXTENSIONS: &[&str] = &["csv", "parquet"];
