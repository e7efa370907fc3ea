//! Background stage handlers.
//!
//! Each handler commits its result under the job's lock and only if the job
//! still belongs to the attempt the task was created for. Long-running work
//! happens with the lock released.

mod preview_handler;
mod validation_handler;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use dlflow_core::models::FileJob;
use dlflow_worker::IngestTask;
use tokio::sync::OwnedMutexGuard;

use crate::state::AppState;

pub use preview_handler::PreviewTaskHandler;
pub use validation_handler::ValidationTaskHandler;

#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn process(&self, task: &IngestTask, state: Arc<AppState>) -> Result<()>;
}

/// Lock the task's job and load it, or `None` if it was deleted or retried since.
pub(crate) async fn lock_current_job(
    state: &AppState,
    task: &IngestTask,
) -> Result<Option<(OwnedMutexGuard<()>, FileJob)>> {
    let guard = state.jobs.locks.lock(task.job_id).await;
    match state.jobs.repository.get(task.job_id).await? {
        None => {
            tracing::debug!(job_id = %task.job_id, stage = %task.stage, "Job deleted, dropping task");
            Ok(None)
        }
        Some(job) if job.attempt != task.attempt => {
            tracing::debug!(
                job_id = %task.job_id,
                stage = %task.stage,
                task_attempt = task.attempt,
                job_attempt = job.attempt,
                "Job was retried, dropping stale task"
            );
            Ok(None)
        }
        Some(job) => Ok(Some((guard, job))),
    }
}

/// End the task's pass in `error` unless it already settled.
pub(crate) async fn fail_job(state: &AppState, task: &IngestTask, reason: &str) -> Result<()> {
    let Some((_guard, mut job)) = lock_current_job(state, task).await? else {
        return Ok(());
    };
    if !job.is_in_flight() {
        return Ok(());
    }
    job.fail(reason);
    state.jobs.repository.put(job).await?;
    tracing::warn!(job_id = %task.job_id, stage = %task.stage, reason = %reason, "Ingestion job failed");
    Ok(())
}
