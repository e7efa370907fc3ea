//! Task handler context trait
//!
//! The API implements this trait for its application state. The pool calls
//! `dispatch_task` for every task it runs and `on_task_failed` when a task
//! errors or overruns its deadline.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::{Arc, Weak};

use crate::task::IngestTask;

/// Context for task dispatch.
///
/// The pool holds a weak reference so it never keeps the application state alive.
#[async_trait]
pub trait TaskHandlerContext: Send + Sync {
    /// Run the stage named by `task`.
    async fn dispatch_task(self: Arc<Self>, task: &IngestTask) -> Result<()>;

    /// Record a task that failed or timed out. Must not fail.
    async fn on_task_failed(self: Arc<Self>, task: &IngestTask, reason: String);
}

/// Placeholder context used when no real context exists. Dispatch always errors.
struct NoopContext;

#[async_trait]
impl TaskHandlerContext for NoopContext {
    async fn dispatch_task(self: Arc<Self>, _task: &IngestTask) -> Result<()> {
        Err(anyhow!("NoopContext: no handler context available"))
    }

    async fn on_task_failed(self: Arc<Self>, task: &IngestTask, reason: String) {
        tracing::warn!(task_id = %task.id, reason = %reason, "Task failed without a handler context");
    }
}

/// Returns a dangling weak reference to a no-op context.
pub fn empty_context_weak() -> Weak<dyn TaskHandlerContext> {
    let n: Arc<dyn TaskHandlerContext> = Arc::new(NoopContext);
    Arc::downgrade(&n)
}
