use super::{lock_current_job, TaskHandler};
use crate::state::AppState;
use anyhow::Result;
use async_trait::async_trait;
use dlflow_processing::run_validation;
use dlflow_worker::{IngestStage, IngestTask};
use std::sync::Arc;

/// Runs the validator on a stored file and gates the preview stage on its report.
pub struct ValidationTaskHandler;

#[async_trait]
impl TaskHandler for ValidationTaskHandler {
    #[tracing::instrument(skip(self, task, state), fields(task.id = %task.id, job.id = %task.job_id, attempt = task.attempt))]
    async fn process(&self, task: &IngestTask, state: Arc<AppState>) -> Result<()> {
        let (path, file_type) = {
            let Some((_guard, mut job)) = lock_current_job(&state, task).await? else {
                return Ok(());
            };
            if !job.is_in_flight() {
                tracing::debug!(status = %job.status, "Job already settled, skipping validation");
                return Ok(());
            }
            job.begin_validation();
            let path = state.upload.storage.local_path(&job.stored_filename)?;
            let file_type = job.file_type;
            state.jobs.repository.put(job).await?;
            (path, file_type)
        };

        let processing = &state.processing;
        tracing::info!(level = %processing.validation_level, "Validating file");
        let outcome = run_validation(
            processing.validator.clone(),
            path,
            file_type,
            processing.validation_level,
            processing.validation_timeout,
        )
        .await;

        let Some((_guard, mut job)) = lock_current_job(&state, task).await? else {
            return Ok(());
        };

        match outcome {
            Ok(report) if !report.is_valid => {
                tracing::info!(
                    errors = report.errors().count(),
                    warnings = report.warnings().count(),
                    "File failed validation"
                );
                job.reject(report);
            }
            Ok(report) => {
                tracing::info!(warnings = report.warnings().count(), "File passed validation");
                job.accept(report)?;
                if let Err(e) = state.ingest.queue.submit(task.next_stage(IngestStage::Preview)) {
                    job.fail(format!("Preview could not be scheduled: {}", e));
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Validation routine failed");
                job.fail(format!("Validation failed: {}", e));
            }
        }

        state.jobs.repository.put(job).await?;
        Ok(())
    }
}
