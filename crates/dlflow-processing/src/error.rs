use std::time::Duration;

/// Failures of the validation and sampling routines themselves, as opposed to
/// findings about the file, which are reported inside a `ValidationReport`.
#[derive(Debug, thiserror::Error)]
pub enum ProcessingError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(String),

    #[error("Parquet error: {0}")]
    Parquet(String),

    #[error("File is empty")]
    Empty,

    #[error("Invalid processing configuration: {0}")]
    Config(String),

    #[error("{stage} timed out after {timeout:?}")]
    Timeout {
        stage: &'static str,
        timeout: Duration,
    },

    #[error("{stage} routine crashed: {message}")]
    Crashed {
        stage: &'static str,
        message: String,
    },
}

impl From<csv::Error> for ProcessingError {
    fn from(err: csv::Error) -> Self {
        ProcessingError::Csv(err.to_string())
    }
}

impl From<parquet::errors::ParquetError> for ProcessingError {
    fn from(err: parquet::errors::ParquetError) -> Self {
        ProcessingError::Parquet(err.to_string())
    }
}
