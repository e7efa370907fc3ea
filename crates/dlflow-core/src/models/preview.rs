use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::ValidationReport;

/// Schema plus a bounded row sample of a tabular file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PreviewData {
    pub columns: Vec<String>,
    pub dtypes: BTreeMap<String, String>,
    /// `[rows, columns]` of the whole file.
    pub shape: [u64; 2],
    /// First N rows, one JSON object per row keyed by column name.
    pub head: Vec<serde_json::Map<String, serde_json::Value>>,
    pub summary: PreviewSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PreviewSummary {
    pub total_rows: u64,
    pub total_columns: u64,
    pub null_counts: BTreeMap<String, u64>,
    /// Estimated in-memory size of the dataset, in bytes.
    pub memory_usage: u64,
}

/// Row/column counts and type map served by the stats endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct FileStats {
    pub total_rows: u64,
    pub total_columns: u64,
    pub dtypes: BTreeMap<String, String>,
    #[serde(default)]
    pub null_counts: BTreeMap<String, u64>,
}

impl From<&PreviewData> for FileStats {
    fn from(preview: &PreviewData) -> Self {
        Self {
            total_rows: preview.summary.total_rows,
            total_columns: preview.summary.total_columns,
            dtypes: preview.dtypes.clone(),
            null_counts: preview.summary.null_counts.clone(),
        }
    }
}

impl FileStats {
    /// Counts and types recorded by validation, for files without a preview.
    /// Null counts are only known from a preview and stay empty.
    pub fn from_report(report: &ValidationReport) -> Option<Self> {
        Some(Self {
            total_rows: report.metadata_u64("num_rows")?,
            total_columns: report.metadata_u64("num_columns")?,
            dtypes: report
                .metadata
                .get("dtypes")
                .and_then(|v| serde_json::from_value(v.clone()).ok())
                .unwrap_or_default(),
            null_counts: BTreeMap::new(),
        })
    }
}
