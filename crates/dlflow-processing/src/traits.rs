use dlflow_core::models::{FileType, PreviewData, ValidationLevel, ValidationReport};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::error::ProcessingError;

/// Validates a stored file. Findings about the file go into the report;
/// `Err` means the routine itself could not run.
pub trait FileValidator: Send + Sync {
    fn validate(
        &self,
        path: &Path,
        file_type: FileType,
        level: ValidationLevel,
    ) -> Result<ValidationReport, ProcessingError>;
}

/// Loads a bounded sample of a stored file plus its schema.
pub trait PreviewSampler: Send + Sync {
    fn sample(
        &self,
        path: &Path,
        file_type: FileType,
        rows: usize,
    ) -> Result<PreviewData, ProcessingError>;
}

/// Run the validator on the blocking pool under `timeout`.
///
/// On timeout the blocking thread is left to finish on its own and its
/// result is discarded.
pub async fn run_validation(
    validator: Arc<dyn FileValidator>,
    path: PathBuf,
    file_type: FileType,
    level: ValidationLevel,
    timeout: Duration,
) -> Result<ValidationReport, ProcessingError> {
    run_blocking("validation", timeout, move || {
        validator.validate(&path, file_type, level)
    })
    .await
}

/// Run the sampler on the blocking pool under `timeout`.
pub async fn run_sampling(
    sampler: Arc<dyn PreviewSampler>,
    path: PathBuf,
    file_type: FileType,
    rows: usize,
    timeout: Duration,
) -> Result<PreviewData, ProcessingError> {
    run_blocking("preview", timeout, move || sampler.sample(&path, file_type, rows)).await
}

async fn run_blocking<T, F>(
    stage: &'static str,
    timeout: Duration,
    f: F,
) -> Result<T, ProcessingError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ProcessingError> + Send + 'static,
{
    let handle = tokio::task::spawn_blocking(f);
    match tokio::time::timeout(timeout, handle).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => Err(ProcessingError::Crashed {
            stage,
            message: join_err.to_string(),
        }),
        Err(_) => Err(ProcessingError::Timeout { stage, timeout }),
    }
}
