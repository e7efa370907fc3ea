use dlflow_core::models::{FileJob, JobListFilter};
use dlflow_core::{AppError, Config, JobStoreBackend};
use std::sync::Arc;
use uuid::Uuid;

use super::{InMemoryJobRepository, JsonJobRepository};

/// Trait for job registry operations
///
/// Implementations store complete records: `put` replaces whatever was
/// stored under the job's id, so readers never see a half-updated job.
#[async_trait::async_trait]
pub trait JobRepository: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<FileJob>, AppError>;

    /// Insert or replace the record with `job.id`.
    async fn put(&self, job: FileJob) -> Result<(), AppError>;

    /// Remove a record, returning it if it existed.
    async fn delete(&self, id: Uuid) -> Result<Option<FileJob>, AppError>;

    /// Records matching `filter`, newest first.
    async fn list(&self, filter: &JobListFilter) -> Result<Vec<FileJob>, AppError>;
}

/// Create the job registry selected by `JOB_STORE`.
pub async fn create_job_repository(config: &Config) -> Result<Arc<dyn JobRepository>, AppError> {
    match config.job_store {
        JobStoreBackend::Memory => {
            tracing::info!("Initializing in-memory job repository");
            Ok(Arc::new(InMemoryJobRepository::new()))
        }
        JobStoreBackend::Json => {
            tracing::info!(
                jobs_dir = %config.jobs_dir.display(),
                "Initializing JSON-file job repository"
            );
            let repo = JsonJobRepository::new(&config.jobs_dir).await?;
            Ok(Arc::new(repo))
        }
    }
}
