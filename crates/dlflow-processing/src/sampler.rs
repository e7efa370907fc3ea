//! Preview sampling: schema, head rows and whole-file summary.

use std::collections::BTreeMap;
use std::path::Path;

use dlflow_core::models::{FileType, PreviewData, PreviewSummary};
use serde_json::{Map, Value};

use crate::error::ProcessingError;
use crate::tabular::profile::INDEX_MEMORY_BYTES;
use crate::tabular::TabularFile;
use crate::traits::PreviewSampler;

/// Streams the whole file once; keeps the first `rows` rows and profiles every row.
#[derive(Debug, Clone, Default)]
pub struct TabularSampler;

impl TabularSampler {
    pub fn new() -> Self {
        Self
    }
}

impl PreviewSampler for TabularSampler {
    #[tracing::instrument(skip(self), fields(file_type = %file_type))]
    fn sample(
        &self,
        path: &Path,
        file_type: FileType,
        rows: usize,
    ) -> Result<PreviewData, ProcessingError> {
        let mut table = TabularFile::open(path, file_type)?;
        let columns = table.columns().to_vec();
        let mut profiles = table.new_profiles();
        let mut raw_head: Vec<Vec<Value>> = Vec::with_capacity(rows);
        let mut total_rows: u64 = 0;

        for row in table.by_ref() {
            let row = row?;
            for (profile, value) in profiles.iter_mut().zip(&row) {
                profile.observe(value);
            }
            if raw_head.len() < rows {
                raw_head.push(row);
            }
            total_rows += 1;
        }

        // Cells are typed only after the whole column has been seen.
        let head = raw_head
            .iter()
            .map(|row| {
                columns
                    .iter()
                    .zip(&profiles)
                    .zip(row)
                    .map(|((name, profile), value)| (name.clone(), profile.coerce(value)))
                    .collect::<Map<String, Value>>()
            })
            .collect();

        let dtypes: BTreeMap<String, String> = profiles
            .iter()
            .map(|p| (p.name.clone(), p.dtype()))
            .collect();
        let null_counts: BTreeMap<String, u64> =
            profiles.iter().map(|p| (p.name.clone(), p.nulls)).collect();
        let memory_usage =
            profiles.iter().map(|p| p.memory_usage()).sum::<u64>() + INDEX_MEMORY_BYTES;
        let total_columns = columns.len() as u64;

        tracing::debug!(total_rows, total_columns, "Preview sampled");

        Ok(PreviewData {
            columns,
            dtypes,
            shape: [total_rows, total_columns],
            head,
            summary: PreviewSummary {
                total_rows,
                total_columns,
                null_counts,
                memory_usage,
            },
        })
    }
}
