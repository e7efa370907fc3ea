//! Test helpers: build AppState and router for integration tests.
//!
//! Run from workspace root: `cargo test -p dlflow-api`.

pub mod fixtures;

use axum_test::multipart::{MultipartForm, Part};
use axum_test::{TestResponse, TestServer};
use dlflow_api::constants;
use dlflow_api::setup::routes;
use dlflow_api::setup::services::{build_state, StateComponents};
use dlflow_api::state::AppState;
use dlflow_core::models::{
    FileType, PreviewData, ValidationLevel, ValidationReport, ValidationResult,
};
use dlflow_core::Config;
use dlflow_db::{create_job_repository, JsonProjectStore};
use dlflow_processing::{
    FileValidator, PreviewSampler, ProcessingError, TabularSampler, TabularValidator,
    ValidatorSettings,
};
use dlflow_storage::LocalStorage;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// API path prefix for tests (e.g. `/api`).
pub fn api_path(path: &str) -> String {
    format!("{}{}", constants::API_PREFIX, path)
}

/// Test application: server, state, and owned temp directory.
pub struct TestApp {
    pub server: TestServer,
    pub state: Arc<AppState>,
    pub config: Config,
    pub _temp_dir: TempDir,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    /// Upload `data` as `filename` labelled `text/csv`.
    pub async fn upload(&self, filename: &str, data: &[u8]) -> TestResponse {
        self.upload_as(filename, "text/csv", data).await
    }

    pub async fn upload_as(&self, filename: &str, mime_type: &str, data: &[u8]) -> TestResponse {
        let form = MultipartForm::new().add_part(
            "file",
            Part::bytes(data.to_vec())
                .file_name(filename)
                .mime_type(mime_type),
        );
        self.server
            .post(&api_path("/files/upload"))
            .multipart(form)
            .await
    }

    pub async fn upload_form(&self, form: MultipartForm) -> TestResponse {
        self.server
            .post(&api_path("/files/upload"))
            .multipart(form)
            .await
    }

    pub async fn get_job(&self, id: &str) -> Value {
        self.server
            .get(&api_path(&format!("/files/{}", id)))
            .await
            .json::<Value>()
    }

    /// Poll `GET /files/{id}` until the job reports `status`.
    pub async fn wait_for_status(&self, id: &str, status: &str) -> Value {
        for _ in 0..200 {
            let job = self.get_job(id).await;
            if job["status"] == status {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {} never reached {}", id, status);
    }

    /// Poll `GET /files/{id}` until the job leaves the in-flight states.
    pub async fn wait_until_settled(&self, id: &str) -> Value {
        for _ in 0..200 {
            let job = self.get_job(id).await;
            match job["status"].as_str() {
                Some("success") | Some("error") => return job,
                _ => tokio::time::sleep(Duration::from_millis(25)).await,
            }
        }
        panic!("job {} did not settle in time", id);
    }

    pub fn uploads_dir(&self) -> &Path {
        &self.config.upload_dir
    }
}

/// Routines replacing the real validator or sampler.
#[derive(Default)]
pub struct TestRoutines {
    pub validator: Option<Arc<dyn FileValidator>>,
    pub sampler: Option<Arc<dyn PreviewSampler>>,
}

/// App with the real validator and sampler over temp directories.
pub async fn setup_test_app() -> TestApp {
    setup_test_app_with(|_| {}, None).await
}

/// App whose config is adjusted by `configure`, optionally with a fake validator.
pub async fn setup_test_app_with(
    configure: impl FnOnce(&mut Config),
    validator: Option<Arc<dyn FileValidator>>,
) -> TestApp {
    setup_test_app_with_routines(
        configure,
        TestRoutines {
            validator,
            sampler: None,
        },
    )
    .await
}

/// `configure` runs before any service is built, so it may also seed the
/// data directories. The job store follows `config.job_store`.
pub async fn setup_test_app_with_routines(
    configure: impl FnOnce(&mut Config),
    routines: TestRoutines,
) -> TestApp {
    let temp_dir = TempDir::new().unwrap();
    let mut config = Config::with_data_dir(temp_dir.path());
    configure(&mut config);

    let storage = LocalStorage::new(&config.upload_dir).await.unwrap();
    let validator = routines.validator.unwrap_or_else(|| {
        Arc::new(TabularValidator::new(ValidatorSettings::from_config(&config)).unwrap())
    });
    let sampler = routines
        .sampler
        .unwrap_or_else(|| Arc::new(TabularSampler::new()));

    let components = StateComponents {
        storage: Arc::new(storage),
        repository: create_job_repository(&config).await.unwrap(),
        projects: Arc::new(JsonProjectStore::new(&config.projects_dir)),
        validator,
        sampler,
    };
    let state = build_state(&config, components);
    let router = routes::setup_routes(&config, state.clone()).unwrap();
    let server = TestServer::new(router).unwrap();

    TestApp {
        server,
        state,
        config,
        _temp_dir: temp_dir,
    }
}

/// Validator whose verdict and speed the test controls.
pub struct ScriptedValidator {
    valid: AtomicBool,
    delay_ms: AtomicU64,
}

impl ScriptedValidator {
    pub fn new(valid: bool) -> Arc<Self> {
        Arc::new(Self {
            valid: AtomicBool::new(valid),
            delay_ms: AtomicU64::new(0),
        })
    }

    pub fn set_valid(&self, valid: bool) {
        self.valid.store(valid, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }
}

impl FileValidator for ScriptedValidator {
    fn validate(
        &self,
        path: &Path,
        file_type: FileType,
        _level: ValidationLevel,
    ) -> Result<ValidationReport, ProcessingError> {
        std::thread::sleep(Duration::from_millis(self.delay_ms.load(Ordering::SeqCst)));
        let results = if self.valid.load(Ordering::SeqCst) {
            vec![]
        } else {
            vec![ValidationResult::error("CSV_PARSE_ERROR", "Row 3 has 4 fields, expected 3")]
        };
        let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        Ok(ValidationReport::from_results(
            size,
            file_type.extension(),
            Some("utf-8".to_string()),
            BTreeMap::new(),
            results,
        ))
    }
}

/// Sampler that always fails, for exercising the preview failure policy.
pub struct FailingSampler;

impl PreviewSampler for FailingSampler {
    fn sample(
        &self,
        _path: &Path,
        _file_type: FileType,
        _rows: usize,
    ) -> Result<PreviewData, ProcessingError> {
        Err(ProcessingError::Csv("sampler could not decode row 2".to_string()))
    }
}
