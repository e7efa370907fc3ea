//! Service initialization and application state setup

use crate::state::{AppState, IngestState, JobState, ProcessingConfig, UploadConfig};
use anyhow::{Context, Result};
use dlflow_core::{Config, FileValidationPolicy};
use dlflow_db::{create_job_repository, JobLocks, JobRepository, JsonProjectStore, ProjectStore};
use dlflow_processing::{
    FileValidator, PreviewSampler, TabularSampler, TabularValidator, ValidatorSettings,
};
use dlflow_storage::{LocalStorage, Storage};
use dlflow_worker::{IngestQueue, IngestQueueConfig, TaskHandlerContext};
use std::sync::{Arc, Weak};

/// Collaborators the application state is assembled from. Tests swap in
/// fakes here; production builds them from the configuration.
pub struct StateComponents {
    pub storage: Arc<dyn Storage>,
    pub repository: Arc<dyn JobRepository>,
    pub projects: Arc<dyn ProjectStore>,
    pub validator: Arc<dyn FileValidator>,
    pub sampler: Arc<dyn PreviewSampler>,
}

/// Initialize all services and repositories, returning the application state
pub async fn initialize_services(config: &Config) -> Result<Arc<AppState>> {
    tracing::info!(upload_dir = %config.upload_dir.display(), "Initializing local storage");
    let storage = LocalStorage::new(&config.upload_dir)
        .await
        .context("Failed to initialize upload storage")?;

    let repository = create_job_repository(config)
        .await
        .context("Failed to initialize job repository")?;

    let validator = TabularValidator::new(ValidatorSettings::from_config(config))
        .context("Failed to initialize validator")?;

    let components = StateComponents {
        storage: Arc::new(storage),
        repository,
        projects: Arc::new(JsonProjectStore::new(&config.projects_dir)),
        validator: Arc::new(validator),
        sampler: Arc::new(TabularSampler::new()),
    };

    Ok(build_state(config, components))
}

/// Assemble `AppState` and start the ingestion workers.
///
/// The queue's workers reach the state through a weak reference, so dropping
/// the last `Arc<AppState>` stops dispatch instead of leaking a cycle.
pub fn build_state(config: &Config, components: StateComponents) -> Arc<AppState> {
    let queue_config = IngestQueueConfig::from_config(config);
    let max_workers = queue_config.max_workers;
    let queue_capacity = queue_config.queue_capacity;

    let state = Arc::new_cyclic(|weak: &Weak<AppState>| {
        let context: Weak<dyn TaskHandlerContext> = weak.clone();
        AppState {
            jobs: JobState {
                repository: components.repository,
                locks: JobLocks::new(),
                projects: components.projects,
            },
            upload: UploadConfig {
                storage: components.storage,
                policy: FileValidationPolicy::for_server(
                    config.max_file_size_bytes,
                    &config.allowed_extensions,
                ),
            },
            processing: ProcessingConfig::from_config(
                config,
                components.validator,
                components.sampler,
            ),
            ingest: IngestState {
                queue: IngestQueue::new(queue_config, context),
            },
            config: config.clone(),
            is_production: config.is_production(),
        }
    });

    tracing::info!(
        max_workers,
        queue_capacity,
        validation_level = %config.validation_level,
        preview_failure_policy = ?config.preview_failure_policy,
        "Ingestion queue initialized"
    );

    state
}
