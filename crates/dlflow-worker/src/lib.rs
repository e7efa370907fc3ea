//! DLFlow worker
//!
//! Bounded pool that runs ingestion stages in the background. The API owns the
//! handlers and implements [`TaskHandlerContext`]; the pool only schedules,
//! bounds concurrency and enforces deadlines.

pub mod context;
pub mod queue;
pub mod task;

pub use context::{empty_context_weak, TaskHandlerContext};
pub use queue::{IngestQueue, IngestQueueConfig, SubmitError};
pub use task::{IngestStage, IngestTask};
