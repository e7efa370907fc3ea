//! DLFlow persistence layer
//!
//! Job registry backends, the per-job lock registry and the read-only
//! project collection consulted for project-scoped uploads.

pub mod db;

pub use db::{
    create_job_repository, InMemoryJobRepository, JobLocks, JobRepository, JsonJobRepository,
    JsonProjectStore, ProjectStore,
};
