//! Repositories for data access
//!
//! The job registry is the single source of truth for job state. Callers
//! always read and write whole records; combined with [`JobLocks`] this keeps
//! stage transitions for one job strictly sequential.
//
// Job registry trait, factory and backends
pub mod job;
pub mod json;
pub mod memory;
//
// Per-job serialisation
pub mod locks;
//
// Project collection (external, read-only here)
pub mod project;

pub use job::{create_job_repository, JobRepository};
pub use json::JsonJobRepository;
pub use locks::JobLocks;
pub use memory::InMemoryJobRepository;
pub use project::{JsonProjectStore, ProjectStore};
