//! Streaming access to CSV and Parquet files.
//!
//! [`TabularFile`] hides the format: it exposes the header, whatever the
//! format declares about types, and an iterator of rows as JSON values.

pub mod csv_source;
pub mod encoding;
pub mod parquet_source;
pub mod profile;

use std::path::Path;

use dlflow_core::models::FileType;
use serde_json::Value;

use crate::error::ProcessingError;
use csv_source::{CsvLayout, CsvRows};
use parquet_source::ParquetRows;
use profile::ColumnProfile;

pub enum TabularFile {
    Csv(CsvRows),
    Parquet(ParquetRows),
}

impl TabularFile {
    pub fn open(path: &Path, file_type: FileType) -> Result<Self, ProcessingError> {
        match file_type {
            FileType::Csv => Ok(TabularFile::Csv(CsvRows::open(path)?)),
            FileType::Parquet => Ok(TabularFile::Parquet(ParquetRows::open(path)?)),
        }
    }

    pub fn columns(&self) -> &[String] {
        match self {
            TabularFile::Csv(rows) => &rows.headers,
            TabularFile::Parquet(rows) => &rows.columns,
        }
    }

    pub fn csv_layout(&self) -> Option<&CsvLayout> {
        match self {
            TabularFile::Csv(rows) => Some(&rows.layout),
            TabularFile::Parquet(_) => None,
        }
    }

    /// Row count known without scanning (Parquet footer).
    pub fn declared_rows(&self) -> Option<u64> {
        match self {
            TabularFile::Csv(_) => None,
            TabularFile::Parquet(rows) => Some(rows.num_rows),
        }
    }

    pub fn compression(&self) -> &str {
        match self {
            TabularFile::Csv(_) => "none",
            TabularFile::Parquet(rows) => &rows.compression,
        }
    }

    /// One empty profile per column, typed by the schema when the format has one.
    pub fn new_profiles(&self) -> Vec<ColumnProfile> {
        match self {
            TabularFile::Csv(rows) => rows
                .headers
                .iter()
                .map(|name| ColumnProfile::new(name.clone(), None))
                .collect(),
            TabularFile::Parquet(rows) => rows
                .columns
                .iter()
                .zip(&rows.dtypes)
                .map(|(name, dtype)| ColumnProfile::new(name.clone(), Some(dtype.clone())))
                .collect(),
        }
    }
}

impl Iterator for TabularFile {
    type Item = Result<Vec<Value>, ProcessingError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            TabularFile::Csv(rows) => rows.next(),
            TabularFile::Parquet(rows) => rows.next(),
        }
    }
}
