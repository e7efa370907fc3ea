//! Configuration module
//!
//! Server configuration is read from the environment (after loading `.env`),
//! falling back to defaults that match the data layout the workflow builder
//! expects: `{DATA_DIR}/uploads`, `{DATA_DIR}/projects`, and so on.

use std::env;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::PathBuf;
use std::str::FromStr;

use crate::constants::{DEFAULT_ALLOWED_EXTENSIONS, DEFAULT_PREVIEW_ROWS};
use crate::models::ValidationLevel;

const SERVER_PORT: u16 = 8000;
const MAX_FILE_SIZE_MB: usize = 100;
const INGEST_MAX_WORKERS: usize = 4;
const INGEST_QUEUE_CAPACITY: usize = 256;
const VALIDATION_TIMEOUT_SECS: u64 = 120;
const PREVIEW_TIMEOUT_SECS: u64 = 60;
const MAX_COLUMNS: usize = 1000;
const MAX_ROWS: u64 = 1_000_000;
const MAX_NULL_PERCENTAGE: f64 = 0.5;
const DEFAULT_CORS_ORIGINS: &str = "http://localhost:3000,http://localhost:5173";

/// Backend used for the job registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStoreBackend {
    /// Process-local map; records are lost on restart.
    Memory,
    /// One JSON document per job under `jobs_dir`.
    Json,
}

impl FromStr for JobStoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(JobStoreBackend::Memory),
            "json" => Ok(JobStoreBackend::Json),
            other => Err(anyhow::anyhow!("Invalid job store backend: {}", other)),
        }
    }
}

/// What happens to a job whose validation passed but whose preview failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewFailurePolicy {
    /// Job still ends in `success`; `preview_data` stays unset.
    Soft,
    /// Job ends in `error` with the sampler's message.
    Hard,
}

impl Display for PreviewFailurePolicy {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            PreviewFailurePolicy::Soft => write!(f, "soft"),
            PreviewFailurePolicy::Hard => write!(f, "hard"),
        }
    }
}

impl FromStr for PreviewFailurePolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "soft" => Ok(PreviewFailurePolicy::Soft),
            "hard" => Ok(PreviewFailurePolicy::Hard),
            other => Err(anyhow::anyhow!("Invalid preview failure policy: {}", other)),
        }
    }
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config {
    pub server_port: u16,
    pub environment: String,
    pub cors_origins: Vec<String>,
    // Data layout
    pub data_dir: PathBuf,
    pub upload_dir: PathBuf,
    pub projects_dir: PathBuf,
    pub jobs_dir: PathBuf,
    pub job_store: JobStoreBackend,
    // Upload limits
    pub max_file_size_bytes: usize,
    pub allowed_extensions: Vec<String>,
    // Ingestion pool
    pub ingest_max_workers: usize,
    pub ingest_queue_capacity: usize,
    pub validation_timeout_secs: u64,
    pub preview_timeout_secs: u64,
    // Validation / preview behaviour
    pub validation_level: ValidationLevel,
    pub preview_rows: usize,
    pub preview_failure_policy: PreviewFailurePolicy,
    pub max_columns: usize,
    pub max_rows: u64,
    pub max_null_percentage: f64,
}

impl Config {
    /// Configuration rooted at `data_dir` with every other setting at its default.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            server_port: SERVER_PORT,
            environment: "development".to_string(),
            cors_origins: DEFAULT_CORS_ORIGINS
                .split(',')
                .map(|s| s.to_string())
                .collect(),
            upload_dir: data_dir.join("uploads"),
            projects_dir: data_dir.join("projects"),
            jobs_dir: data_dir.join("uploads").join("metadata"),
            data_dir,
            job_store: JobStoreBackend::Memory,
            max_file_size_bytes: MAX_FILE_SIZE_MB * 1024 * 1024,
            allowed_extensions: DEFAULT_ALLOWED_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            ingest_max_workers: INGEST_MAX_WORKERS,
            ingest_queue_capacity: INGEST_QUEUE_CAPACITY,
            validation_timeout_secs: VALIDATION_TIMEOUT_SECS,
            preview_timeout_secs: PREVIEW_TIMEOUT_SECS,
            validation_level: ValidationLevel::Content,
            preview_rows: DEFAULT_PREVIEW_ROWS,
            preview_failure_policy: PreviewFailurePolicy::Soft,
            max_columns: MAX_COLUMNS,
            max_rows: MAX_ROWS,
            max_null_percentage: MAX_NULL_PERCENTAGE,
        }
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let data_dir = PathBuf::from(env::var("DATA_DIR").unwrap_or_else(|_| "../data".to_string()));
        let mut config = Self::with_data_dir(data_dir);

        config.environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let cors_origins_str =
            env::var("CORS_ORIGINS").unwrap_or_else(|_| DEFAULT_CORS_ORIGINS.to_string());
        if config.is_production() && cors_origins_str.trim() == "*" {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }
        config.cors_origins = cors_origins_str
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        config.server_port = env::var("PORT")
            .unwrap_or_else(|_| SERVER_PORT.to_string())
            .parse()
            .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?;

        if let Ok(dir) = env::var("UPLOAD_DIR") {
            config.upload_dir = PathBuf::from(dir);
            config.jobs_dir = config.upload_dir.join("metadata");
        }
        if let Ok(dir) = env::var("PROJECTS_DIR") {
            config.projects_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = env::var("JOBS_DIR") {
            config.jobs_dir = PathBuf::from(dir);
        }
        if let Ok(backend) = env::var("JOB_STORE") {
            config.job_store = backend.parse()?;
        }

        let max_file_size_mb = env::var("MAX_FILE_SIZE_MB")
            .unwrap_or_else(|_| MAX_FILE_SIZE_MB.to_string())
            .parse::<usize>()
            .unwrap_or(MAX_FILE_SIZE_MB);
        config.max_file_size_bytes = max_file_size_mb * 1024 * 1024;

        if let Ok(extensions) = env::var("ALLOWED_EXTENSIONS") {
            config.allowed_extensions = extensions
                .split(',')
                .map(|s| s.trim().trim_start_matches('.').to_lowercase())
                .filter(|s| !s.is_empty())
                .collect();
        }

        config.ingest_max_workers = env::var("INGEST_MAX_WORKERS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(INGEST_MAX_WORKERS);
        config.ingest_queue_capacity = env::var("INGEST_QUEUE_CAPACITY")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(INGEST_QUEUE_CAPACITY);
        config.validation_timeout_secs = env::var("VALIDATION_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(VALIDATION_TIMEOUT_SECS);
        config.preview_timeout_secs = env::var("PREVIEW_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(PREVIEW_TIMEOUT_SECS);

        if let Ok(level) = env::var("VALIDATION_LEVEL") {
            config.validation_level = level.parse()?;
        }
        config.preview_rows = env::var("PREVIEW_ROWS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_PREVIEW_ROWS);
        if let Ok(policy) = env::var("PREVIEW_FAILURE_POLICY") {
            config.preview_failure_policy = policy.parse()?;
        }
        config.max_columns = env::var("MAX_COLUMNS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(MAX_COLUMNS);
        config.max_rows = env::var("MAX_ROWS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(MAX_ROWS);
        config.max_null_percentage = env::var("MAX_NULL_PERCENTAGE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(MAX_NULL_PERCENTAGE);

        Ok(config)
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.max_file_size_bytes == 0 {
            return Err(anyhow::anyhow!("MAX_FILE_SIZE_MB must be greater than 0"));
        }
        if self.allowed_extensions.is_empty() {
            return Err(anyhow::anyhow!("ALLOWED_EXTENSIONS must not be empty"));
        }
        if let Some(ext) = self
            .allowed_extensions
            .iter()
            .find(|ext| !matches!(ext.as_str(), "csv" | "parquet"))
        {
            return Err(anyhow::anyhow!(
                "ALLOWED_EXTENSIONS contains unsupported extension '{}' (supported: csv, parquet)",
                ext
            ));
        }
        if self.ingest_max_workers == 0 {
            return Err(anyhow::anyhow!("INGEST_MAX_WORKERS must be at least 1"));
        }
        if self.ingest_queue_capacity == 0 {
            return Err(anyhow::anyhow!("INGEST_QUEUE_CAPACITY must be at least 1"));
        }
        if self.validation_timeout_secs == 0 || self.preview_timeout_secs == 0 {
            return Err(anyhow::anyhow!("Stage timeouts must be greater than 0"));
        }
        if !(0.0..=1.0).contains(&self.max_null_percentage) {
            return Err(anyhow::anyhow!(
                "MAX_NULL_PERCENTAGE must be between 0.0 and 1.0"
            ));
        }
        Ok(())
    }

    /// Upper bound for a whole ingestion task (both stages plus slack).
    pub fn task_timeout_secs(&self) -> u64 {
        self.validation_timeout_secs + self.preview_timeout_secs + 30
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_data_layout() {
        let config = Config::with_data_dir("/tmp/dlflow");
        assert_eq!(config.upload_dir, PathBuf::from("/tmp/dlflow/uploads"));
        assert_eq!(config.projects_dir, PathBuf::from("/tmp/dlflow/projects"));
        assert_eq!(config.max_file_size_bytes, 100 * 1024 * 1024);
        assert_eq!(config.allowed_extensions, vec!["csv", "parquet"]);
        assert_eq!(config.preview_failure_policy, PreviewFailurePolicy::Soft);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_unknown_extension() {
        let mut config = Config::with_data_dir("/tmp/dlflow");
        config.allowed_extensions.push("xlsx".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_workers() {
        let mut config = Config::with_data_dir("/tmp/dlflow");
        config.ingest_max_workers = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn policy_and_backend_parse() {
        assert_eq!(
            "HARD".parse::<PreviewFailurePolicy>().unwrap(),
            PreviewFailurePolicy::Hard
        );
        assert_eq!("json".parse::<JobStoreBackend>().unwrap(), JobStoreBackend::Json);
        assert!("redis".parse::<JobStoreBackend>().is_err());
    }
}
