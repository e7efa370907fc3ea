use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// How deep the validator looks into a file. Levels are cumulative.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ValidationLevel {
    Basic,
    Structure,
    Content,
    Advanced,
}

impl Display for ValidationLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ValidationLevel::Basic => write!(f, "basic"),
            ValidationLevel::Structure => write!(f, "structure"),
            ValidationLevel::Content => write!(f, "content"),
            ValidationLevel::Advanced => write!(f, "advanced"),
        }
    }
}

impl FromStr for ValidationLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "basic" => Ok(ValidationLevel::Basic),
            "structure" => Ok(ValidationLevel::Structure),
            "content" => Ok(ValidationLevel::Content),
            "advanced" => Ok(ValidationLevel::Advanced),
            _ => Err(anyhow::anyhow!("Invalid validation level: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ValidationSeverity {
    /// Blocks the file from progressing.
    Error,
    Warning,
    Info,
}

impl Display for ValidationSeverity {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ValidationSeverity::Error => write!(f, "error"),
            ValidationSeverity::Warning => write!(f, "warning"),
            ValidationSeverity::Info => write!(f, "info"),
        }
    }
}

/// A single finding produced by the validator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub severity: ValidationSeverity,
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual: Option<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

impl ValidationResult {
    pub fn new(
        severity: ValidationSeverity,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            is_valid: severity != ValidationSeverity::Error,
            severity,
            code: code.into(),
            message: message.into(),
            field: None,
            expected: None,
            actual: None,
            suggestions: Vec::new(),
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ValidationSeverity::Error, code, message)
    }

    pub fn warning(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ValidationSeverity::Warning, code, message)
    }

    pub fn info(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ValidationSeverity::Info, code, message)
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn with_expected(mut self, expected: impl Into<String>) -> Self {
        self.expected = Some(expected.into());
        self
    }

    pub fn with_actual(mut self, actual: impl Into<String>) -> Self {
        self.actual = Some(actual.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }
}

/// Structured outcome of validating one stored file.
///
/// `results` keeps the order in which checks ran; `metadata` carries whatever
/// the validator learned about the file (encoding, delimiter, columns, ...).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub file_size: u64,
    pub file_type: String,
    pub encoding: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub results: Vec<ValidationResult>,
}

impl ValidationReport {
    /// Build a report whose validity is derived from the presence of error findings.
    pub fn from_results(
        file_size: u64,
        file_type: impl Into<String>,
        encoding: Option<String>,
        metadata: BTreeMap<String, serde_json::Value>,
        results: Vec<ValidationResult>,
    ) -> Self {
        let is_valid = !results
            .iter()
            .any(|r| r.severity == ValidationSeverity::Error);
        Self {
            is_valid,
            file_size,
            file_type: file_type.into(),
            encoding,
            metadata,
            results,
        }
    }

    pub fn errors(&self) -> impl Iterator<Item = &ValidationResult> {
        self.by_severity(ValidationSeverity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ValidationResult> {
        self.by_severity(ValidationSeverity::Warning)
    }

    pub fn infos(&self) -> impl Iterator<Item = &ValidationResult> {
        self.by_severity(ValidationSeverity::Info)
    }

    fn by_severity(&self, severity: ValidationSeverity) -> impl Iterator<Item = &ValidationResult> {
        self.results.iter().filter(move |r| r.severity == severity)
    }

    /// Human-readable summary of the blocking findings, used as a job's error message.
    pub fn failure_message(&self) -> String {
        let messages: Vec<String> = self
            .errors()
            .map(|r| format!("{}: {}", r.code, r.message))
            .collect();
        if messages.is_empty() {
            "File validation failed".to_string()
        } else {
            format!("File validation failed: {}", messages.join("; "))
        }
    }

    pub fn metadata_u64(&self, key: &str) -> Option<u64> {
        self.metadata.get(key).and_then(|v| v.as_u64())
    }

    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(|v| v.as_str())
    }
}
