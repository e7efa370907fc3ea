//! TaskHandlerContext implementation for AppState.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use dlflow_worker::{IngestStage, IngestTask, TaskHandlerContext};

use crate::state::AppState;
use crate::task_handlers::{fail_job, PreviewTaskHandler, TaskHandler, ValidationTaskHandler};

#[async_trait]
impl TaskHandlerContext for AppState {
    async fn dispatch_task(self: Arc<Self>, task: &IngestTask) -> Result<()> {
        match task.stage {
            IngestStage::Validate => ValidationTaskHandler.process(task, self).await,
            IngestStage::Preview => PreviewTaskHandler.process(task, self).await,
        }
    }

    async fn on_task_failed(self: Arc<Self>, task: &IngestTask, reason: String) {
        if let Err(e) = fail_job(&self, task, &reason).await {
            tracing::error!(
                job_id = %task.job_id,
                error = %e,
                "Failed to record ingestion failure on job"
            );
        }
    }
}
