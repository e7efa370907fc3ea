use super::{lock_current_job, TaskHandler};
use crate::state::AppState;
use anyhow::Result;
use async_trait::async_trait;
use dlflow_core::models::JobStatus;
use dlflow_core::PreviewFailurePolicy;
use dlflow_processing::run_sampling;
use dlflow_worker::IngestTask;
use std::sync::Arc;

/// Samples a validated file and settles the job.
pub struct PreviewTaskHandler;

#[async_trait]
impl TaskHandler for PreviewTaskHandler {
    #[tracing::instrument(skip(self, task, state), fields(task.id = %task.id, job.id = %task.job_id, attempt = task.attempt))]
    async fn process(&self, task: &IngestTask, state: Arc<AppState>) -> Result<()> {
        let (path, file_type) = {
            let Some((_guard, job)) = lock_current_job(&state, task).await? else {
                return Ok(());
            };
            let validated = job
                .validation_report
                .as_ref()
                .map(|r| r.is_valid)
                .unwrap_or(false);
            if job.status != JobStatus::Validating || !validated {
                tracing::debug!(status = %job.status, "Job is not awaiting a preview, skipping");
                return Ok(());
            }
            (
                state.upload.storage.local_path(&job.stored_filename)?,
                job.file_type,
            )
        };

        let processing = &state.processing;
        let outcome = run_sampling(
            processing.sampler.clone(),
            path,
            file_type,
            processing.preview_rows,
            processing.preview_timeout,
        )
        .await;

        let Some((_guard, mut job)) = lock_current_job(&state, task).await? else {
            return Ok(());
        };

        match (outcome, processing.preview_failure_policy) {
            (Ok(preview), _) => {
                tracing::info!(
                    rows = preview.summary.total_rows,
                    columns = preview.summary.total_columns,
                    "Preview generated"
                );
                job.succeed(Some(preview), None)?;
            }
            (Err(e), PreviewFailurePolicy::Soft) => {
                tracing::warn!(error = %e, "Preview generation failed, finishing without preview");
                job.succeed(None, Some(e.to_string()))?;
            }
            (Err(e), PreviewFailurePolicy::Hard) => {
                tracing::warn!(error = %e, "Preview generation failed");
                job.fail(format!("Preview generation failed: {}", e));
            }
        }

        state.jobs.repository.put(job).await?;
        Ok(())
    }
}
