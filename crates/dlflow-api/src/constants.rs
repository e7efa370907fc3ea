//! API-level constants.

pub use dlflow_core::constants::API_PREFIX;

/// Multipart field carrying the file bytes.
pub const UPLOAD_FILE_FIELD: &str = "file";

/// Extra request body allowance on top of the file limit for multipart framing and form fields.
pub const MULTIPART_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Timeout for each dependency probe in the health check.
pub const HEALTH_CHECK_TIMEOUT_SECS: u64 = 5;
