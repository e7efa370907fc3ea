use dlflow_core::models::{FileJob, JobListFilter};
use dlflow_core::AppError;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::JobRepository;

/// Process-local job registry. Records are lost when the process exits,
/// while the stored bytes stay on disk.
#[derive(Default)]
pub struct InMemoryJobRepository {
    jobs: RwLock<HashMap<Uuid, FileJob>>,
}

impl InMemoryJobRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl JobRepository for InMemoryJobRepository {
    #[tracing::instrument(skip(self), fields(db.table = "jobs", db.operation = "select", db.record_id = %id))]
    async fn get(&self, id: Uuid) -> Result<Option<FileJob>, AppError> {
        Ok(self.jobs.read().await.get(&id).cloned())
    }

    #[tracing::instrument(skip(self, job), fields(db.table = "jobs", db.operation = "upsert", db.record_id = %job.id))]
    async fn put(&self, job: FileJob) -> Result<(), AppError> {
        self.jobs.write().await.insert(job.id, job);
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "jobs", db.operation = "delete", db.record_id = %id))]
    async fn delete(&self, id: Uuid) -> Result<Option<FileJob>, AppError> {
        Ok(self.jobs.write().await.remove(&id))
    }

    #[tracing::instrument(skip(self), fields(db.table = "jobs", db.operation = "select"))]
    async fn list(&self, filter: &JobListFilter) -> Result<Vec<FileJob>, AppError> {
        let jobs = self.jobs.read().await;
        Ok(filter.apply(jobs.values()))
    }
}
