//! Parquet reader built on the row-oriented record API.

use std::fs::File;
use std::path::Path;

use parquet::basic::{Compression, ConvertedType, LogicalType, Type as PhysicalType};
use parquet::file::reader::{FileReader, SerializedFileReader};
use parquet::record::reader::RowIter;
use parquet::record::Field;
use parquet::schema::types::Type as SchemaType;
use serde_json::Value;

use crate::error::ProcessingError;

pub struct ParquetRows {
    pub columns: Vec<String>,
    pub dtypes: Vec<String>,
    pub num_rows: u64,
    pub compression: String,
    rows: RowIter<'static>,
}

impl ParquetRows {
    pub fn open(path: &Path) -> Result<Self, ProcessingError> {
        let reader = SerializedFileReader::new(File::open(path)?)?;
        let metadata = reader.metadata();
        let num_rows = metadata.file_metadata().num_rows().max(0) as u64;

        let schema = metadata.file_metadata().schema_descr().root_schema();
        let (columns, dtypes): (Vec<String>, Vec<String>) = schema
            .get_fields()
            .iter()
            .map(|field| (field.name().to_string(), dtype_of(field)))
            .unzip();

        let compression = if metadata.num_row_groups() > 0 && metadata.row_group(0).num_columns() > 0
        {
            compression_name(metadata.row_group(0).column(0).compression()).to_string()
        } else {
            "none".to_string()
        };

        let rows = RowIter::from_file_into(Box::new(reader));

        Ok(Self {
            columns,
            dtypes,
            num_rows,
            compression,
            rows,
        })
    }
}

impl Iterator for ParquetRows {
    type Item = Result<Vec<Value>, ProcessingError>;

    fn next(&mut self) -> Option<Self::Item> {
        let row = self.rows.next()?;
        Some(
            row.map(|row| {
                row.get_column_iter()
                    .map(|(_, field)| match field {
                        Field::Null => Value::Null,
                        other => other.to_json_value(),
                    })
                    .collect()
            })
            .map_err(ProcessingError::from),
        )
    }
}

/// Map a top-level schema field to a pandas-style dtype name.
fn dtype_of(field: &SchemaType) -> String {
    if !field.is_primitive() {
        return "object".to_string();
    }
    let info = field.get_basic_info();
    let is_temporal = matches!(
        info.logical_type(),
        Some(LogicalType::Timestamp { .. }) | Some(LogicalType::Date)
    ) || matches!(
        info.converted_type(),
        ConvertedType::TIMESTAMP_MILLIS | ConvertedType::TIMESTAMP_MICROS | ConvertedType::DATE
    );
    if is_temporal {
        return "datetime64[ns]".to_string();
    }
    let dtype = match field.get_physical_type() {
        PhysicalType::BOOLEAN => "bool",
        PhysicalType::INT32 => "int32",
        PhysicalType::INT64 => "int64",
        PhysicalType::INT96 => "datetime64[ns]",
        PhysicalType::FLOAT => "float32",
        PhysicalType::DOUBLE => "float64",
        PhysicalType::BYTE_ARRAY | PhysicalType::FIXED_LEN_BYTE_ARRAY => "object",
    };
    dtype.to_string()
}

fn compression_name(compression: Compression) -> &'static str {
    match compression {
        Compression::UNCOMPRESSED => "none",
        Compression::SNAPPY => "snappy",
        Compression::GZIP(_) => "gzip",
        Compression::LZO => "lzo",
        Compression::BROTLI(_) => "brotli",
        Compression::LZ4 => "lz4",
        Compression::ZSTD(_) => "zstd",
        Compression::LZ4_RAW => "lz4_raw",
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn reads_schema_and_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sample.parquet");
        test_support::write_sample(&path, &[1, 2], &[Some("a"), None], &[0.5, 1.5]);

        let rows = ParquetRows::open(&path).unwrap();
        assert_eq!(rows.columns, vec!["id", "name", "score"]);
        assert_eq!(rows.dtypes, vec!["int64", "object", "float64"]);
        assert_eq!(rows.num_rows, 2);
        assert_eq!(rows.compression, "none");

        let rows: Vec<_> = rows.collect::<Result<_, _>>().unwrap();
        assert_eq!(rows[0][0], Value::from(1));
        assert_eq!(rows[0][1], Value::String("a".into()));
        assert_eq!(rows[1][1], Value::Null);
    }

    #[test]
    fn garbage_is_a_read_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.parquet");
        std::fs::write(&path, b"not a parquet file").unwrap();
        assert!(matches!(ParquetRows::open(&path), Err(ProcessingError::Parquet(_))));
    }
}
