//! Pre-flight file validation
//!
//! The checks here run before any bytes leave the client, and the upload
//! receiver reuses the size and extension checks before anything is persisted.
//! Both sides therefore agree on the error codes a rejected file carries.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

use crate::constants::{DEFAULT_ALLOWED_EXTENSIONS, DEFAULT_MAX_FILE_SIZE_BYTES};
use crate::error::AppError;
use crate::models::ValidationSeverity;

const MAX_FILENAME_LENGTH: usize = 255;

const DEFAULT_ALLOWED_MIME_TYPES: &[&str] = &[
    "text/csv",
    "application/vnd.ms-excel",
    "text/plain",
    "application/octet-stream",
    "application/x-parquet",
    "application/vnd.apache.parquet",
];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationErrorCode {
    FileTooLarge,
    EmptyFile,
    InvalidFileExtension,
    InvalidMimeType,
    InvalidFileName,
    FileNameTooLong,
}

impl ValidationErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationErrorCode::FileTooLarge => "FILE_TOO_LARGE",
            ValidationErrorCode::EmptyFile => "EMPTY_FILE",
            ValidationErrorCode::InvalidFileExtension => "INVALID_FILE_EXTENSION",
            ValidationErrorCode::InvalidMimeType => "INVALID_MIME_TYPE",
            ValidationErrorCode::InvalidFileName => "INVALID_FILE_NAME",
            ValidationErrorCode::FileNameTooLong => "FILE_NAME_TOO_LONG",
        }
    }
}

impl Display for ValidationErrorCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

/// One pre-flight finding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidationError {
    pub code: ValidationErrorCode,
    pub message: String,
    pub severity: ValidationSeverity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl ValidationError {
    fn error(code: ValidationErrorCode, field: &str, message: String) -> Self {
        Self {
            code,
            message,
            severity: ValidationSeverity::Error,
            field: Some(field.to_string()),
        }
    }

    fn warning(code: ValidationErrorCode, field: &str, message: String) -> Self {
        Self {
            code,
            message,
            severity: ValidationSeverity::Warning,
            field: Some(field.to_string()),
        }
    }

    pub fn is_blocking(&self) -> bool {
        self.severity == ValidationSeverity::Error
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        match err.code {
            ValidationErrorCode::FileTooLarge => AppError::PayloadTooLarge(err.message),
            ValidationErrorCode::InvalidFileExtension => AppError::UnsupportedFileType(err.message),
            _ => AppError::InvalidInput(err.message),
        }
    }
}

/// Returns true if any finding must stop the upload.
pub fn has_blocking_errors(errors: &[ValidationError]) -> bool {
    errors.iter().any(ValidationError::is_blocking)
}

/// Limits a file must satisfy before it is submitted.
#[derive(Debug, Clone, PartialEq)]
pub struct FileValidationPolicy {
    pub max_file_size_bytes: u64,
    /// Lower-case, without leading dot.
    pub allowed_extensions: Vec<String>,
    pub allowed_mime_types: Vec<String>,
    pub max_filename_length: usize,
}

impl Default for FileValidationPolicy {
    fn default() -> Self {
        Self {
            max_file_size_bytes: DEFAULT_MAX_FILE_SIZE_BYTES as u64,
            allowed_extensions: DEFAULT_ALLOWED_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            allowed_mime_types: DEFAULT_ALLOWED_MIME_TYPES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            max_filename_length: MAX_FILENAME_LENGTH,
        }
    }
}

impl FileValidationPolicy {
    /// Policy with the server's limits and the default MIME allowlist.
    pub fn for_server(max_file_size_bytes: usize, allowed_extensions: &[String]) -> Self {
        Self {
            max_file_size_bytes: max_file_size_bytes as u64,
            allowed_extensions: allowed_extensions.to_vec(),
            ..Self::default()
        }
    }

    /// Run every check and return all findings in a stable order.
    pub fn validate(&self, filename: &str, mime_type: &str, size: u64) -> Vec<ValidationError> {
        let mut findings = Vec::new();
        findings.extend(self.check_size(size).err());
        findings.extend(self.check_extension(filename).err());
        findings.extend(self.check_mime_type(mime_type));
        findings.extend(self.check_filename(filename));
        findings
    }

    pub fn check_size(&self, size: u64) -> Result<(), ValidationError> {
        if size == 0 {
            return Err(ValidationError::error(
                ValidationErrorCode::EmptyFile,
                "size",
                "File is empty".to_string(),
            ));
        }
        if size > self.max_file_size_bytes {
            return Err(ValidationError::error(
                ValidationErrorCode::FileTooLarge,
                "size",
                format!(
                    "File size {:.1} MB exceeds the maximum of {:.1} MB",
                    size as f64 / 1024.0 / 1024.0,
                    self.max_file_size_bytes as f64 / 1024.0 / 1024.0
                ),
            ));
        }
        Ok(())
    }

    /// Returns the normalized extension on success.
    pub fn check_extension(&self, filename: &str) -> Result<String, ValidationError> {
        let extension = filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_lowercase())
            .unwrap_or_default();
        if extension.is_empty() || !self.allowed_extensions.contains(&extension) {
            let shown = if extension.is_empty() {
                "none".to_string()
            } else {
                format!(".{}", extension)
            };
            return Err(ValidationError::error(
                ValidationErrorCode::InvalidFileExtension,
                "extension",
                format!(
                    "Unsupported file extension {}. Allowed extensions: {}",
                    shown,
                    self.allowed_extensions.join(", ")
                ),
            ));
        }
        Ok(extension)
    }

    /// An empty MIME type is accepted since many platforms do not report one.
    pub fn check_mime_type(&self, mime_type: &str) -> Option<ValidationError> {
        let normalized = mime_type
            .split(';')
            .next()
            .map(|s| s.trim().to_lowercase())
            .unwrap_or_default();
        if normalized.is_empty() || self.allowed_mime_types.contains(&normalized) {
            return None;
        }
        Some(ValidationError::error(
            ValidationErrorCode::InvalidMimeType,
            "mime_type",
            format!("Unsupported MIME type {}", normalized),
        ))
    }

    pub fn check_filename(&self, filename: &str) -> Vec<ValidationError> {
        let mut findings = Vec::new();
        if filename.trim().is_empty()
            || filename.contains('/')
            || filename.contains('\\')
            || filename.contains("..")
            || filename.chars().any(char::is_control)
        {
            findings.push(ValidationError::error(
                ValidationErrorCode::InvalidFileName,
                "name",
                "File name is empty or contains path components".to_string(),
            ));
        } else if !filename.chars().all(is_allowed_filename_char) {
            findings.push(ValidationError::warning(
                ValidationErrorCode::InvalidFileName,
                "name",
                "File name contains special characters".to_string(),
            ));
        }
        if filename.chars().count() > self.max_filename_length {
            findings.push(ValidationError::error(
                ValidationErrorCode::FileNameTooLong,
                "name",
                format!(
                    "File name exceeds {} characters",
                    self.max_filename_length
                ),
            ));
        }
        findings
    }
}

fn is_allowed_filename_char(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || matches!(c, ' ' | '.' | '_' | '(' | ')' | '-')
        || (!c.is_ascii() && c.is_alphanumeric())
}
