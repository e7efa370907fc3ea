//! Application state and sub-states.
//!
//! Handlers and stage handlers reach everything through `Arc<AppState>`;
//! the sub-states group what each part of the pipeline needs.

use std::sync::Arc;
use std::time::Duration;

use dlflow_core::models::ValidationLevel;
use dlflow_core::{Config, FileValidationPolicy, PreviewFailurePolicy};
use dlflow_db::{JobLocks, JobRepository, ProjectStore};
use dlflow_processing::{FileValidator, PreviewSampler};
use dlflow_storage::Storage;
use dlflow_worker::IngestQueue;

/// Job registry plus the per-job lock registry that serialises writes to it.
#[derive(Clone)]
pub struct JobState {
    pub repository: Arc<dyn JobRepository>,
    pub locks: JobLocks,
    pub projects: Arc<dyn ProjectStore>,
}

/// Where upload bytes go and what the receiver accepts.
#[derive(Clone)]
pub struct UploadConfig {
    pub storage: Arc<dyn Storage>,
    pub policy: FileValidationPolicy,
}

/// Validation and preview routines with their deadlines and policies.
#[derive(Clone)]
pub struct ProcessingConfig {
    pub validator: Arc<dyn FileValidator>,
    pub sampler: Arc<dyn PreviewSampler>,
    pub validation_level: ValidationLevel,
    pub validation_timeout: Duration,
    pub preview_timeout: Duration,
    pub preview_rows: usize,
    pub preview_failure_policy: PreviewFailurePolicy,
}

impl ProcessingConfig {
    pub fn from_config(
        config: &Config,
        validator: Arc<dyn FileValidator>,
        sampler: Arc<dyn PreviewSampler>,
    ) -> Self {
        Self {
            validator,
            sampler,
            validation_level: config.validation_level,
            validation_timeout: Duration::from_secs(config.validation_timeout_secs),
            preview_timeout: Duration::from_secs(config.preview_timeout_secs),
            preview_rows: config.preview_rows,
            preview_failure_policy: config.preview_failure_policy,
        }
    }
}

#[derive(Clone)]
pub struct IngestState {
    pub queue: IngestQueue,
}

pub struct AppState {
    pub jobs: JobState,
    pub upload: UploadConfig,
    pub processing: ProcessingConfig,
    pub ingest: IngestState,
    pub config: Config,
    pub is_production: bool,
}
