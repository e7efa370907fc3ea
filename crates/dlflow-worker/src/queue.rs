//! Ingestion queue: bounded channel, semaphore worker pool, per-task deadline.
//!
//! Tasks are held in memory only. [`IngestQueue::shutdown`] stops the pool from
//! taking new tasks; tasks already running finish or hit their deadline.

use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::Utc;
use dlflow_core::{AppError, Config};
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::context::TaskHandlerContext;
use crate::task::IngestTask;

#[derive(Debug, Clone)]
pub struct IngestQueueConfig {
    pub max_workers: usize,
    /// Tasks that may wait for a worker before submissions are refused.
    pub queue_capacity: usize,
    /// Watchdog over a whole task, on top of the per-stage deadlines.
    pub task_timeout: Duration,
}

impl Default for IngestQueueConfig {
    fn default() -> Self {
        Self {
            max_workers: 4,
            queue_capacity: 256,
            task_timeout: Duration::from_secs(210),
        }
    }
}

impl IngestQueueConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_workers: config.ingest_max_workers.max(1),
            queue_capacity: config.ingest_queue_capacity.max(1),
            task_timeout: Duration::from_secs(config.task_timeout_secs()),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error("Ingestion queue is full")]
    QueueFull,

    #[error("Ingestion queue is shut down")]
    ShutDown,
}

impl From<SubmitError> for AppError {
    fn from(err: SubmitError) -> Self {
        AppError::ServiceUnavailable(err.to_string())
    }
}

#[derive(Clone)]
pub struct IngestQueue {
    sender: mpsc::Sender<IngestTask>,
    shutdown: CancellationToken,
    config: IngestQueueConfig,
}

impl IngestQueue {
    /// Create the queue and spawn its worker pool. Must be called inside a tokio runtime.
    pub fn new(config: IngestQueueConfig, context: Weak<dyn TaskHandlerContext>) -> Self {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let shutdown = CancellationToken::new();

        tokio::spawn(Self::worker_pool(
            receiver,
            config.clone(),
            context,
            shutdown.clone(),
        ));

        Self {
            sender,
            shutdown,
            config,
        }
    }

    /// Creates a queue without a worker pool: submissions are accepted until the
    /// channel fills and are never run. Used by tests that drive stages by hand.
    pub fn new_no_worker(config: IngestQueueConfig) -> (Self, mpsc::Receiver<IngestTask>) {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        (
            Self {
                sender,
                shutdown: CancellationToken::new(),
                config,
            },
            receiver,
        )
    }

    pub fn config(&self) -> &IngestQueueConfig {
        &self.config
    }

    /// Enqueue without waiting. A full queue is reported to the caller instead
    /// of applying back-pressure to the request path.
    pub fn submit(&self, task: IngestTask) -> Result<(), SubmitError> {
        if self.shutdown.is_cancelled() {
            return Err(SubmitError::ShutDown);
        }
        let task_id = task.id;
        let job_id = task.job_id;
        let stage = task.stage;
        match self.sender.try_send(task) {
            Ok(()) => {
                tracing::debug!(
                    task_id = %task_id,
                    job_id = %job_id,
                    stage = %stage,
                    "Task submitted to ingestion queue"
                );
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(
                    job_id = %job_id,
                    stage = %stage,
                    capacity = self.config.queue_capacity,
                    "Ingestion queue is full, rejecting task"
                );
                Err(SubmitError::QueueFull)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(SubmitError::ShutDown),
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Signals the pool to stop taking tasks. Returns immediately.
    pub fn shutdown(&self) {
        tracing::info!("Initiating ingestion queue shutdown");
        self.shutdown.cancel();
    }

    async fn worker_pool(
        mut receiver: mpsc::Receiver<IngestTask>,
        config: IngestQueueConfig,
        context: Weak<dyn TaskHandlerContext>,
        shutdown: CancellationToken,
    ) {
        tracing::info!(
            max_workers = config.max_workers,
            queue_capacity = config.queue_capacity,
            task_timeout_secs = config.task_timeout.as_secs(),
            "Ingestion worker pool started"
        );

        let semaphore = Arc::new(Semaphore::new(config.max_workers.max(1)));

        loop {
            // Take a worker slot before taking a task so waiting tasks stay in the channel.
            let permit = tokio::select! {
                _ = shutdown.cancelled() => break,
                permit = semaphore.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let task = tokio::select! {
                _ = shutdown.cancelled() => break,
                task = receiver.recv() => match task {
                    Some(task) => task,
                    None => break,
                },
            };

            let ctx = context.clone();
            let timeout = config.task_timeout;
            tokio::spawn(async move {
                let _permit = permit;
                Self::process_task(task, ctx, timeout).await;
            });
        }

        receiver.close();
        tracing::info!("Ingestion worker pool stopped");
    }

    async fn process_task(
        task: IngestTask,
        context: Weak<dyn TaskHandlerContext>,
        timeout: Duration,
    ) {
        let Some(ctx) = context.upgrade() else {
            tracing::warn!(task_id = %task.id, job_id = %task.job_id, "Handler context dropped, skipping task");
            return;
        };

        let waited_ms = (Utc::now() - task.enqueued_at).num_milliseconds();
        tracing::debug!(
            task_id = %task.id,
            job_id = %task.job_id,
            stage = %task.stage,
            attempt = task.attempt,
            waited_ms,
            "Processing ingestion task"
        );

        match tokio::time::timeout(timeout, ctx.clone().dispatch_task(&task)).await {
            Ok(Ok(())) => {
                tracing::debug!(task_id = %task.id, stage = %task.stage, "Ingestion task completed");
            }
            Ok(Err(e)) => {
                tracing::error!(
                    task_id = %task.id,
                    job_id = %task.job_id,
                    stage = %task.stage,
                    error = %e,
                    "Ingestion task failed"
                );
                ctx.on_task_failed(&task, format!("{:#}", e)).await;
            }
            Err(_) => {
                tracing::error!(
                    task_id = %task.id,
                    job_id = %task.job_id,
                    stage = %task.stage,
                    timeout_secs = timeout.as_secs(),
                    "Ingestion task timed out"
                );
                ctx.on_task_failed(
                    &task,
                    format!("{} stage timed out after {:?}", task.stage, timeout),
                )
                .await;
            }
        }
    }
}
