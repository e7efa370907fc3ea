//! Structural and content validation of tabular files.
//!
//! Checks run level by level (`basic`, `structure`, `content`, `advanced`).
//! Error findings at the basic or structure level stop the run, so later
//! levels never look at a file that could not be parsed.

use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use dlflow_core::constants::CONTENT_VALIDATION_ROWS;
use dlflow_core::models::{
    FileType, ValidationLevel, ValidationReport, ValidationResult, ValidationSeverity,
};
use dlflow_core::Config;
use regex::Regex;
use serde_json::{json, Value};

use crate::codes;
use crate::error::ProcessingError;
use crate::tabular::csv_source::delimiter_name;
use crate::tabular::profile::{parse_datetime, ColumnProfile};
use crate::tabular::TabularFile;
use crate::traits::FileValidator;

const STRUCTURE_SAMPLE_ROWS: usize = 100;
const SNIFF_BYTES: u64 = 8 * 1024;
const PARQUET_MAGIC: &[u8] = b"PAR1";
const UTF8_ENCODINGS: &[&str] = &["utf-8", "utf-8-sig", "ascii"];

#[derive(Debug, Clone)]
pub struct ValidatorSettings {
    pub max_file_size: u64,
    /// Lower-case, without leading dot.
    pub allowed_extensions: Vec<String>,
    pub max_columns: usize,
    pub max_rows: u64,
    pub max_null_percentage: f64,
    /// Rows scanned by content checks; `advanced` scans the whole file.
    pub content_rows: usize,
    /// Column names (matched case-insensitively as substrings) expected to hold timestamps.
    pub datetime_columns: Vec<String>,
    pub column_name_pattern: String,
    pub check_duplicates: bool,
}

impl Default for ValidatorSettings {
    fn default() -> Self {
        Self {
            max_file_size: 100 * 1024 * 1024,
            allowed_extensions: vec!["csv".to_string(), "parquet".to_string()],
            max_columns: 1000,
            max_rows: 1_000_000,
            max_null_percentage: 0.5,
            content_rows: CONTENT_VALIDATION_ROWS,
            datetime_columns: ["DateTime", "tagTime", "timestamp", "time"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            column_name_pattern: r"^[a-zA-Z][a-zA-Z0-9_]*$".to_string(),
            check_duplicates: true,
        }
    }
}

impl ValidatorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_file_size: config.max_file_size_bytes as u64,
            allowed_extensions: config.allowed_extensions.clone(),
            max_columns: config.max_columns,
            max_rows: config.max_rows,
            max_null_percentage: config.max_null_percentage,
            ..Self::default()
        }
    }
}

type Findings = (Vec<ValidationResult>, BTreeMap<String, Value>);

pub struct TabularValidator {
    settings: ValidatorSettings,
    column_name_pattern: Regex,
}

impl TabularValidator {
    pub fn new(settings: ValidatorSettings) -> Result<Self, ProcessingError> {
        let column_name_pattern = Regex::new(&settings.column_name_pattern).map_err(|e| {
            ProcessingError::Config(format!("Invalid column name pattern: {}", e))
        })?;
        Ok(Self {
            settings,
            column_name_pattern,
        })
    }

    fn validate_basic(&self, path: &Path) -> Result<Findings, ProcessingError> {
        let mut results = Vec::new();
        let mut metadata = BTreeMap::new();

        let file_meta = match std::fs::metadata(path) {
            Ok(meta) if meta.is_file() => meta,
            _ => {
                results.push(ValidationResult::error(
                    codes::FILE_NOT_FOUND,
                    "File does not exist",
                ));
                return Ok((results, metadata));
            }
        };

        let file_size = file_meta.len();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();
        metadata.insert("file_size".to_string(), json!(file_size));
        metadata.insert("file_extension".to_string(), json!(format!(".{}", extension)));

        if file_size > self.settings.max_file_size {
            results.push(
                ValidationResult::error(codes::FILE_TOO_LARGE, "File size exceeds the limit")
                    .with_expected(format!("<= {:.1}MB", mb(self.settings.max_file_size)))
                    .with_actual(format!("{:.1}MB", mb(file_size)))
                    .with_suggestion("Compress the file or split it into smaller files"),
            );
        }

        let file_type = match extension.parse::<FileType>() {
            Ok(t) if self.settings.allowed_extensions.contains(&extension) => t,
            _ => {
                results.push(
                    ValidationResult::error(codes::INVALID_FILE_EXTENSION, "Unsupported file format")
                        .with_expected(format!(
                            "Supported formats: {}",
                            self.settings.allowed_extensions.join(", ")
                        ))
                        .with_actual(format!(".{}", extension))
                        .with_suggestion("Convert the file to a supported format and retry"),
                );
                return Ok((results, metadata));
            }
        };

        let mut head = Vec::new();
        File::open(path)?.take(SNIFF_BYTES).read_to_end(&mut head)?;
        let (mime_type, looks_right) = sniff_content(&head, file_type);
        metadata.insert("mime_type".to_string(), json!(mime_type));
        if !looks_right {
            results.push(
                ValidationResult::warning(
                    codes::UNEXPECTED_MIME_TYPE,
                    "File content does not look like its extension",
                )
                .with_expected(file_type.to_string())
                .with_actual(mime_type)
                .with_suggestion("Check whether the file is corrupted"),
            );
        }

        metadata.insert("file_type".to_string(), json!(file_type.to_string()));
        Ok((results, metadata))
    }

    fn validate_structure(&self, path: &Path, file_type: FileType) -> Findings {
        let mut results = Vec::new();
        let mut metadata = BTreeMap::new();

        let table = match TabularFile::open(path, file_type) {
            Ok(table) => table,
            Err(err) => {
                results.push(open_failure(file_type, &err));
                return (results, metadata);
            }
        };

        metadata.insert("compression".to_string(), json!(table.compression()));
        if let Some(layout) = table.csv_layout() {
            let encoding = layout.encoding.name();
            metadata.insert("encoding".to_string(), json!(encoding));
            metadata.insert(
                "encoding_confidence".to_string(),
                json!(layout.encoding_confidence),
            );
            metadata.insert("delimiter".to_string(), json!(delimiter_name(layout.delimiter)));
            if !UTF8_ENCODINGS.contains(&encoding) {
                results.push(
                    ValidationResult::warning(
                        codes::ENCODING_WARNING,
                        "File encoding may garble non-ASCII text",
                    )
                    .with_expected("UTF-8")
                    .with_actual(encoding)
                    .with_suggestion("Convert the file to UTF-8"),
                );
            }
        }

        let columns = table.columns().to_vec();
        metadata.insert("num_columns".to_string(), json!(columns.len()));
        metadata.insert("columns".to_string(), json!(columns));

        if columns.len() > self.settings.max_columns {
            results.push(
                ValidationResult::error(codes::TOO_MANY_COLUMNS, "Too many columns")
                    .with_expected(format!("<= {}", self.settings.max_columns))
                    .with_actual(columns.len().to_string()),
            );
        }

        if let Some(declared_rows) = table.declared_rows() {
            metadata.insert("num_rows".to_string(), json!(declared_rows));
            if declared_rows > self.settings.max_rows {
                results.push(
                    ValidationResult::warning(
                        codes::LARGE_DATASET,
                        "Large dataset, processing may take longer",
                    )
                    .with_actual(format!("{} rows", declared_rows)),
                );
            }
        }

        if file_type == FileType::Csv {
            let invalid: Vec<&str> = columns
                .iter()
                .filter(|c| !self.column_name_pattern.is_match(c))
                .map(String::as_str)
                .collect();
            if !invalid.is_empty() {
                results.push(
                    ValidationResult::warning(
                        codes::INVALID_COLUMN_NAMES,
                        "Column names do not follow the naming convention",
                    )
                    .with_field(invalid.join(", "))
                    .with_suggestion(
                        "Column names should start with a letter and contain only letters, digits and underscores",
                    ),
                );
            }

            let mut seen = HashSet::new();
            let mut duplicates: Vec<&str> = Vec::new();
            for c in &columns {
                if !seen.insert(c.as_str()) && !duplicates.contains(&c.as_str()) {
                    duplicates.push(c);
                }
            }
            if !duplicates.is_empty() {
                results.push(
                    ValidationResult::error(codes::DUPLICATE_COLUMNS, "Duplicate column names")
                        .with_field(duplicates.join(", "))
                        .with_suggestion("Rename the duplicated columns"),
                );
            }
        }

        let mut profiles = table.new_profiles();
        for row in table.take(STRUCTURE_SAMPLE_ROWS) {
            match row {
                Ok(row) => observe_row(&mut profiles, &row),
                Err(err) => {
                    results.push(open_failure(file_type, &err));
                    return (results, metadata);
                }
            }
        }
        let dtypes: BTreeMap<&str, String> = profiles
            .iter()
            .map(|p| (p.name.as_str(), p.dtype()))
            .collect();
        metadata.insert("dtypes".to_string(), json!(dtypes));

        (results, metadata)
    }

    fn validate_content(
        &self,
        path: &Path,
        file_type: FileType,
        row_limit: Option<usize>,
    ) -> Findings {
        match self.scan_content(path, file_type, row_limit) {
            Ok(findings) => findings,
            Err(err) => (
                vec![ValidationResult::error(
                    codes::CONTENT_VALIDATION_FAILED,
                    format!("Content validation failed: {}", err),
                )
                .with_suggestion("Check the data format")
                .with_suggestion("Make sure the file is complete")],
                BTreeMap::new(),
            ),
        }
    }

    fn scan_content(
        &self,
        path: &Path,
        file_type: FileType,
        row_limit: Option<usize>,
    ) -> Result<Findings, ProcessingError> {
        let mut results = Vec::new();
        let mut metadata = BTreeMap::new();

        let mut table = TabularFile::open(path, file_type)?;
        let mut profiles = table.new_profiles();
        let mut seen_rows = HashSet::new();
        let mut duplicate_count: u64 = 0;
        let mut scanned: u64 = 0;
        let limit = row_limit.unwrap_or(usize::MAX);

        for row in table.by_ref().take(limit) {
            let row = row?;
            observe_row(&mut profiles, &row);
            if self.settings.check_duplicates {
                let key = serde_json::to_string(&row).unwrap_or_default();
                if !seen_rows.insert(key) {
                    duplicate_count += 1;
                }
            }
            scanned += 1;
        }
        let exhausted = table.next().is_none();
        if exhausted && file_type == FileType::Csv {
            metadata.insert("num_rows".to_string(), json!(scanned));
        }

        let null_percentages: BTreeMap<&str, f64> = profiles
            .iter()
            .map(|p| (p.name.as_str(), p.null_fraction()))
            .collect();
        let high_null: Vec<&str> = null_percentages
            .iter()
            .filter(|(_, pct)| **pct > self.settings.max_null_percentage)
            .map(|(name, _)| *name)
            .collect();
        if !high_null.is_empty() {
            results.push(
                ValidationResult::warning(
                    codes::HIGH_NULL_PERCENTAGE,
                    "Some columns have a high share of missing values",
                )
                .with_field(high_null.join(", "))
                .with_suggestion("Check data completeness")
                .with_suggestion("Consider cleaning the data"),
            );
        }
        metadata.insert("null_percentages".to_string(), json!(null_percentages));

        let mut datetime_columns = Vec::new();
        for profile in &profiles {
            if !self.is_datetime_name(&profile.name) {
                continue;
            }
            datetime_columns.push(profile.name.clone());
            let parses = profile.dtype().starts_with("datetime")
                || profile
                    .datetime_samples()
                    .iter()
                    .all(|v| parse_datetime(v).is_some());
            if parses {
                results.push(
                    ValidationResult::info(
                        codes::DATETIME_COLUMN_DETECTED,
                        format!("Detected datetime column: {}", profile.name),
                    )
                    .with_field(profile.name.clone()),
                );
            } else {
                results.push(
                    ValidationResult::warning(
                        codes::DATETIME_PARSE_WARNING,
                        format!("Datetime column has a non-standard format: {}", profile.name),
                    )
                    .with_field(profile.name.clone())
                    .with_suggestion("Check that timestamps use a standard format"),
                );
            }
        }
        metadata.insert("datetime_columns".to_string(), json!(datetime_columns));

        if self.settings.check_duplicates {
            if duplicate_count > 0 {
                results.push(
                    ValidationResult::warning(
                        codes::DUPLICATE_ROWS,
                        format!("Found {} duplicate rows", duplicate_count),
                    )
                    .with_suggestion("Consider removing duplicate rows"),
                );
            }
            metadata.insert("duplicate_count".to_string(), json!(duplicate_count));
        }

        metadata.insert(
            "data_summary".to_string(),
            json!({
                "total_rows": scanned,
                "total_columns": profiles.len(),
                "numeric_columns": profiles.iter().filter(|p| p.is_numeric()).count(),
                "text_columns": profiles.iter().filter(|p| p.is_text()).count(),
                "datetime_columns": datetime_columns.len(),
            }),
        );

        Ok((results, metadata))
    }

    fn is_datetime_name(&self, column: &str) -> bool {
        let column = column.to_lowercase();
        self.settings
            .datetime_columns
            .iter()
            .any(|name| column.contains(&name.to_lowercase()))
    }
}

impl FileValidator for TabularValidator {
    fn validate(
        &self,
        path: &Path,
        file_type: FileType,
        level: ValidationLevel,
    ) -> Result<ValidationReport, ProcessingError> {
        let (mut results, mut metadata) = self.validate_basic(path)?;

        if !has_errors(&results) && level >= ValidationLevel::Structure {
            let (structure_results, structure_metadata) = self.validate_structure(path, file_type);
            results.extend(structure_results);
            metadata.extend(structure_metadata);

            if !has_errors(&results) && level >= ValidationLevel::Content {
                let row_limit = if level >= ValidationLevel::Advanced {
                    None
                } else {
                    Some(self.settings.content_rows)
                };
                let (content_results, content_metadata) =
                    self.validate_content(path, file_type, row_limit);
                results.extend(content_results);
                metadata.extend(content_metadata);
            }
        }

        let file_size = metadata
            .get("file_size")
            .and_then(Value::as_u64)
            .unwrap_or(0);
        let encoding = metadata
            .get("encoding")
            .and_then(Value::as_str)
            .map(str::to_string);
        let file_type_name = metadata
            .get("file_type")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();

        let report =
            ValidationReport::from_results(file_size, file_type_name, encoding, metadata, results);
        tracing::debug!(
            path = %path.display(),
            level = %level,
            is_valid = report.is_valid,
            findings = report.results.len(),
            "File validation finished"
        );
        Ok(report)
    }
}

fn has_errors(results: &[ValidationResult]) -> bool {
    results
        .iter()
        .any(|r| r.severity == ValidationSeverity::Error)
}

fn observe_row(profiles: &mut [ColumnProfile], row: &[Value]) {
    for (profile, value) in profiles.iter_mut().zip(row) {
        profile.observe(value);
    }
}

fn open_failure(file_type: FileType, err: &ProcessingError) -> ValidationResult {
    match (file_type, err) {
        (_, ProcessingError::Empty) => ValidationResult::error(codes::EMPTY_FILE, "File is empty"),
        (FileType::Csv, err) => ValidationResult::error(
            codes::CSV_PARSE_ERROR,
            format!("CSV parse error: {}", err),
        )
        .with_suggestion("Check the CSV format")
        .with_suggestion("Check delimiters and quoting"),
        (FileType::Parquet, err) => ValidationResult::error(
            codes::PARQUET_READ_ERROR,
            format!("Parquet read error: {}", err),
        )
        .with_suggestion("Check whether the file is corrupted"),
    }
}

/// Best-effort content sniff: returns a MIME type and whether it matches the declared type.
fn sniff_content(head: &[u8], file_type: FileType) -> (String, bool) {
    if head.starts_with(PARQUET_MAGIC) {
        return (
            "application/vnd.apache.parquet".to_string(),
            file_type == FileType::Parquet,
        );
    }
    let utf16 = head.starts_with(&[0xFF, 0xFE]) || head.starts_with(&[0xFE, 0xFF]);
    if utf16 || !head.contains(&0) {
        return ("text/csv".to_string(), file_type == FileType::Csv);
    }
    ("application/octet-stream".to_string(), false)
}

fn mb(bytes: u64) -> f64 {
    bytes as f64 / 1024.0 / 1024.0
}
