//! DLFlow API Library
//!
//! HTTP surface of the ingestion pipeline: upload receiver, job queries,
//! the background validation and preview stages, and application setup.

pub mod constants;
pub mod error;
mod handlers;
pub mod services;
pub mod setup;
pub mod state;
mod task_dispatch;
pub mod task_handlers;
pub mod telemetry;
mod utils;

pub use dlflow_worker::{IngestQueue, IngestQueueConfig};
pub use error::{ErrorResponse, HttpAppError};
pub use state::AppState;
