//! Upload receiver
//!
//! extract → check → resolve project → store → register → schedule validation.
//! Rejections happen before any byte is written to storage.

use std::sync::Arc;

use axum::extract::Multipart;
use dlflow_core::models::{FileJob, FileJobSummary, FileType};
use dlflow_core::AppError;
use dlflow_worker::{IngestStage, IngestTask};
use uuid::Uuid;

use crate::state::AppState;
use crate::utils::upload::{extract_upload_form, UploadForm};

pub struct UploadReceiver {
    state: Arc<AppState>,
}

impl UploadReceiver {
    pub fn new(state: &Arc<AppState>) -> Self {
        Self {
            state: state.clone(),
        }
    }

    /// Accept one upload and return as soon as the job is registered.
    /// Validation runs in the background.
    pub async fn receive(&self, multipart: Multipart) -> Result<FileJobSummary, AppError> {
        let form = extract_upload_form(multipart, &self.state.upload.policy).await?;
        self.accept(form).await
    }

    #[tracing::instrument(skip(self, form), fields(filename = %form.filename, size = form.data.len()))]
    pub async fn accept(&self, form: UploadForm) -> Result<FileJobSummary, AppError> {
        let file_type = self.check(&form)?;
        let project_id = self.resolve_project(form.project_id.as_deref()).await?;

        let id = Uuid::new_v4();
        let size = form.data.len() as u64;
        let job = FileJob::new(
            id,
            form.filename,
            file_type,
            size,
            form.content_type,
            project_id,
            form.description,
        );

        let storage = &self.state.upload.storage;
        storage.put(&job.stored_filename, form.data).await?;

        if let Err(e) = self.state.jobs.repository.put(job.clone()).await {
            if let Err(cleanup) = storage.delete(&job.stored_filename).await {
                tracing::warn!(
                    job_id = %id,
                    error = %cleanup,
                    "Failed to remove stored bytes after registry failure"
                );
            }
            return Err(e);
        }

        tracing::info!(
            job_id = %id,
            file_type = %file_type,
            size_bytes = size,
            project_id = ?project_id,
            "File uploaded"
        );

        Ok(self.schedule_validation(job).await)
    }

    /// Only size and extension gate an upload here. MIME labels and filename
    /// style vary by browser and are left to the client's pre-flight checks.
    fn check(&self, form: &UploadForm) -> Result<FileType, AppError> {
        let policy = &self.state.upload.policy;
        policy.check_size(form.data.len() as u64)?;
        policy.check_extension(&form.filename)?;

        let advisory = policy
            .check_mime_type(&form.content_type)
            .into_iter()
            .chain(policy.check_filename(&form.filename));
        for finding in advisory {
            tracing::debug!(code = %finding.code, message = %finding.message, "Upload advisory");
        }
        FileType::from_filename(&form.filename).ok_or_else(|| {
            AppError::UnsupportedFileType(format!("Unsupported file: {}", form.filename))
        })
    }

    /// A supplied project id must name an existing project; anything else is not found.
    async fn resolve_project(&self, raw: Option<&str>) -> Result<Option<Uuid>, AppError> {
        let Some(raw) = raw else {
            return Ok(None);
        };
        let not_found = || AppError::NotFound(format!("Project {} not found", raw));
        let project_id = Uuid::parse_str(raw).map_err(|_| not_found())?;
        if !self.state.jobs.projects.exists(project_id).await? {
            return Err(not_found());
        }
        Ok(Some(project_id))
    }

    /// Queue the validation stage. A full queue ends the job in `error`; the
    /// upload itself still succeeded and the job can be retried.
    async fn schedule_validation(&self, job: FileJob) -> FileJobSummary {
        let task = IngestTask::new(job.id, job.attempt, IngestStage::Validate);
        let Err(e) = self.state.ingest.queue.submit(task) else {
            return job.summary();
        };

        let _guard = self.state.jobs.locks.lock(job.id).await;
        let mut current = match self.state.jobs.repository.get(job.id).await {
            Ok(Some(current)) => current,
            _ => job,
        };
        if current.is_in_flight() {
            current.fail(format!("Validation could not be scheduled: {}", e));
            if let Err(put_err) = self.state.jobs.repository.put(current.clone()).await {
                tracing::error!(job_id = %current.id, error = %put_err, "Failed to record scheduling failure");
            }
        }
        current.summary()
    }
}
