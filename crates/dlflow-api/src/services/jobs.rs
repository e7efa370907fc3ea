//! Job queries and lifecycle operations behind the `/files` routes.
//!
//! Keeps handler logic thin and allows testing without HTTP.

use std::sync::Arc;

use dlflow_core::models::{
    DeleteResponse, FileJob, FileListResponse, FilePreviewResponse, FileStats, JobListFilter,
    JobStatus,
};
use dlflow_core::AppError;
use dlflow_worker::{IngestStage, IngestTask};
use uuid::Uuid;

use crate::state::AppState;

pub struct JobService {
    state: Arc<AppState>,
}

/// Path ids arrive as strings so that a malformed id reads as an unknown one.
pub fn parse_job_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| not_found(raw))
}

fn not_found(id: impl std::fmt::Display) -> AppError {
    AppError::NotFound(format!("File {} not found", id))
}

impl JobService {
    pub fn new(state: &Arc<AppState>) -> Self {
        Self {
            state: state.clone(),
        }
    }

    pub async fn get(&self, id: Uuid) -> Result<FileJob, AppError> {
        self.state
            .jobs
            .repository
            .get(id)
            .await?
            .ok_or_else(|| not_found(id))
    }

    pub async fn list(&self, filter: &JobListFilter) -> Result<FileListResponse, AppError> {
        let jobs = self.state.jobs.repository.list(filter).await?;
        Ok(FileListResponse {
            files: jobs.iter().map(FileJob::summary).collect(),
        })
    }

    /// Only a job that finished with a preview has one to serve.
    pub async fn preview(&self, id: Uuid) -> Result<FilePreviewResponse, AppError> {
        let job = self.get(id).await?;
        if job.status != JobStatus::Success {
            return Err(AppError::BadRequest(format!(
                "File is not ready for preview (status: {})",
                job.status
            )));
        }
        match (job.preview_data, job.validation_report) {
            (Some(preview), Some(validation)) => Ok(FilePreviewResponse {
                preview,
                validation,
            }),
            _ => Err(AppError::BadRequest(
                job.preview_error
                    .map(|e| format!("Preview unavailable: {}", e))
                    .unwrap_or_else(|| "Preview unavailable".to_string()),
            )),
        }
    }

    /// Counts and types from the preview, or from the validation metadata
    /// when the file validated but no preview exists.
    pub async fn stats(&self, id: Uuid) -> Result<FileStats, AppError> {
        let job = self.get(id).await?;
        if let Some(preview) = &job.preview_data {
            return Ok(FileStats::from(preview));
        }
        job.validation_report
            .as_ref()
            .and_then(FileStats::from_report)
            .ok_or_else(|| {
                AppError::BadRequest(format!(
                    "Statistics are not available yet (status: {})",
                    job.status
                ))
            })
    }

    /// Start a new pass over the stored bytes.
    ///
    /// The job's attempt is bumped under its lock, so any task still queued
    /// for the previous pass drops its result.
    #[tracing::instrument(skip(self), fields(job_id = %id))]
    pub async fn retry(&self, id: Uuid) -> Result<FileJob, AppError> {
        let _guard = self.state.jobs.locks.lock(id).await;
        let mut job = self.get(id).await?;
        if job.is_in_flight() {
            return Err(AppError::Conflict(format!(
                "File {} is still being processed (status: {})",
                id, job.status
            )));
        }
        if !self.state.upload.storage.exists(&job.stored_filename).await? {
            return Err(AppError::NotFound(format!(
                "Stored bytes for file {} are gone; upload it again",
                id
            )));
        }

        job.reset_for_retry();
        self.state.jobs.repository.put(job.clone()).await?;

        let task = IngestTask::new(job.id, job.attempt, IngestStage::Validate);
        if let Err(e) = self.state.ingest.queue.submit(task) {
            job.fail(format!("Validation could not be scheduled: {}", e));
            self.state.jobs.repository.put(job).await?;
            return Err(e.into());
        }

        tracing::info!(attempt = job.attempt, "Retrying file ingestion");
        Ok(job)
    }

    #[tracing::instrument(skip(self), fields(job_id = %id))]
    pub async fn delete(&self, id: Uuid) -> Result<DeleteResponse, AppError> {
        {
            let _guard = self.state.jobs.locks.lock(id).await;
            let job = self.get(id).await?;
            self.state
                .upload
                .storage
                .delete(&job.stored_filename)
                .await?;
            self.state.jobs.repository.delete(id).await?;
        }
        self.state.jobs.locks.forget(id);

        tracing::info!("File deleted");
        Ok(DeleteResponse {
            message: "File deleted successfully".to_string(),
            id,
        })
    }
}
