//! Per-column statistics gathered while streaming rows.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;

/// Tokens read as missing values in delimited text.
const NULL_TOKENS: &[&str] = &[
    "", "NA", "N/A", "n/a", "NaN", "nan", "-NaN", "-nan", "null", "NULL", "None", "<NA>", "#N/A",
];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%Y-%m-%d %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%Y%m%d%H%M%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y", "%Y%m%d"];

/// Values sampled per column when checking datetime parsing.
pub const DATETIME_SAMPLE: usize = 100;

/// Per-value overhead used by the memory estimate for text cells.
const OBJECT_OVERHEAD_BYTES: u64 = 49;

pub fn is_null_token(raw: &str) -> bool {
    NULL_TOKENS.contains(&raw.trim())
}

/// Parse `raw` as a timestamp in one of the common layouts, including the
/// compact `%Y%m%d%H` hour stamps used by `tagTime` columns.
pub fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S %:z") {
        return Some(dt.naive_utc());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt);
        }
    }
    if raw.len() == 10 && raw.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(dt) = NaiveDateTime::parse_from_str(&format!("{}0000", raw), "%Y%m%d%H%M%S") {
            return Some(dt);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(raw, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    None
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim() {
        "true" | "True" | "TRUE" => Some(true),
        "false" | "False" | "FALSE" => Some(false),
        _ => None,
    }
}

/// Running statistics for one column.
#[derive(Debug, Clone)]
pub struct ColumnProfile {
    pub name: String,
    /// Dtype fixed by the file's schema, if the format has one.
    declared: Option<String>,
    pub non_null: u64,
    pub nulls: u64,
    all_int: bool,
    all_float: bool,
    all_bool: bool,
    text_bytes: u64,
    datetime_samples: Vec<String>,
}

impl ColumnProfile {
    pub fn new(name: impl Into<String>, declared: Option<String>) -> Self {
        Self {
            name: name.into(),
            declared,
            non_null: 0,
            nulls: 0,
            all_int: true,
            all_float: true,
            all_bool: true,
            text_bytes: 0,
            datetime_samples: Vec::new(),
        }
    }

    pub fn observe(&mut self, value: &Value) {
        match value {
            Value::Null => {
                self.nulls += 1;
                return;
            }
            Value::String(s) if self.declared.is_none() && is_null_token(s) => {
                self.nulls += 1;
                return;
            }
            _ => {}
        }

        self.non_null += 1;
        match value {
            Value::Bool(_) => {
                self.all_int = false;
                self.all_float = false;
            }
            Value::Number(n) => {
                self.all_bool = false;
                if !(n.is_i64() || n.is_u64()) {
                    self.all_int = false;
                }
            }
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.parse::<i64>().is_err() {
                    self.all_int = false;
                }
                if trimmed.parse::<f64>().is_err() {
                    self.all_float = false;
                }
                if parse_bool(trimmed).is_none() {
                    self.all_bool = false;
                }
                self.text_bytes += s.len() as u64 + OBJECT_OVERHEAD_BYTES;
            }
            other => {
                self.all_int = false;
                self.all_float = false;
                self.all_bool = false;
                self.text_bytes += other.to_string().len() as u64 + OBJECT_OVERHEAD_BYTES;
            }
        }

        if self.datetime_samples.len() < DATETIME_SAMPLE {
            if let Value::String(s) = value {
                self.datetime_samples.push(s.clone());
            }
        }
    }

    pub fn total(&self) -> u64 {
        self.non_null + self.nulls
    }

    pub fn null_fraction(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            0.0
        } else {
            self.nulls as f64 / total as f64
        }
    }

    /// Pandas-style dtype name.
    pub fn dtype(&self) -> String {
        if let Some(declared) = &self.declared {
            return declared.clone();
        }
        if self.non_null == 0 {
            return "float64".to_string();
        }
        if self.all_int {
            // Integers with gaps are widened to float like a dataframe would.
            if self.nulls == 0 {
                "int64".to_string()
            } else {
                "float64".to_string()
            }
        } else if self.all_float {
            "float64".to_string()
        } else if self.all_bool && self.nulls == 0 {
            "bool".to_string()
        } else {
            "object".to_string()
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self.dtype().as_str(), "int64" | "int32" | "float64" | "float32")
    }

    pub fn is_text(&self) -> bool {
        self.dtype() == "object"
    }

    /// Values kept for datetime detection (first non-null text values).
    pub fn datetime_samples(&self) -> &[String] {
        &self.datetime_samples
    }

    /// Estimated in-memory footprint of the column.
    pub fn memory_usage(&self) -> u64 {
        match self.dtype().as_str() {
            "bool" => self.total(),
            "object" => self.text_bytes + self.nulls * 16 + self.total() * 8,
            _ => self.total() * 8,
        }
    }

    /// Convert a raw cell to the JSON value a preview row should show.
    pub fn coerce(&self, value: &Value) -> Value {
        let Value::String(s) = value else {
            return value.clone();
        };
        if self.declared.is_some() {
            return value.clone();
        }
        if is_null_token(s) {
            return Value::Null;
        }
        let trimmed = s.trim();
        match self.dtype().as_str() {
            "int64" => trimmed
                .parse::<i64>()
                .map(Value::from)
                .unwrap_or_else(|_| value.clone()),
            "float64" => trimmed
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            "bool" => parse_bool(trimmed).map(Value::Bool).unwrap_or(Value::Null),
            _ => value.clone(),
        }
    }
}

/// Index overhead added to the memory estimate of every frame.
pub const INDEX_MEMORY_BYTES: u64 = 128;
