//! Result codes emitted by the validator.

// basic
pub const FILE_NOT_FOUND: &str = "FILE_NOT_FOUND";
pub const FILE_TOO_LARGE: &str = "FILE_TOO_LARGE";
pub const INVALID_FILE_EXTENSION: &str = "INVALID_FILE_EXTENSION";
pub const UNEXPECTED_MIME_TYPE: &str = "UNEXPECTED_MIME_TYPE";

// structure
pub const ENCODING_WARNING: &str = "ENCODING_WARNING";
pub const EMPTY_FILE: &str = "EMPTY_FILE";
pub const CSV_PARSE_ERROR: &str = "CSV_PARSE_ERROR";
pub const PARQUET_READ_ERROR: &str = "PARQUET_READ_ERROR";
pub const TOO_MANY_COLUMNS: &str = "TOO_MANY_COLUMNS";
pub const INVALID_COLUMN_NAMES: &str = "INVALID_COLUMN_NAMES";
pub const DUPLICATE_COLUMNS: &str = "DUPLICATE_COLUMNS";
pub const LARGE_DATASET: &str = "LARGE_DATASET";

// content
pub const HIGH_NULL_PERCENTAGE: &str = "HIGH_NULL_PERCENTAGE";
pub const DATETIME_COLUMN_DETECTED: &str = "DATETIME_COLUMN_DETECTED";
pub const DATETIME_PARSE_WARNING: &str = "DATETIME_PARSE_WARNING";
pub const DUPLICATE_ROWS: &str = "DUPLICATE_ROWS";
pub const CONTENT_VALIDATION_FAILED: &str = "CONTENT_VALIDATION_FAILED";
