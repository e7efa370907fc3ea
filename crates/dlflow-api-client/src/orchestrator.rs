//! Client-side upload orchestration.
//!
//! An [`UploadOrchestrator`] checks each file against a [`FileValidationPolicy`]
//! before any request, keeps an optimistic local record per upload, and
//! publishes [`UploadEvent`]s. It retains the bytes of submitted files so a
//! retry can re-upload when the server no longer knows the id. Retained bytes
//! are capped by a byte budget, least recently used evicted first, and are
//! released once a retry shows the server still holds the file.
//!
//! Cancelling aborts the HTTP request only. Validation or preview work the
//! server already scheduled for a file keeps running.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use dlflow_core::models::{FileJob, FileJobSummary, JobStatus};
use dlflow_core::validation::{has_blocking_errors, ValidationError};
use dlflow_core::FileValidationPolicy;
use lru::LruCache;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::api::UploadRequest;
use crate::{ApiClient, ClientError};

const EVENT_CAPACITY: usize = 64;

/// Default cap on retained upload bytes.
pub const DEFAULT_BLOB_BUDGET_BYTES: u64 = 256 * 1024 * 1024;

/// A file picked on the client side, with its bytes in memory.
#[derive(Debug, Clone)]
pub struct LocalFile {
    pub name: String,
    pub mime_type: String,
    pub data: Bytes,
}

impl LocalFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    /// Read a file from disk, guessing its MIME type from the extension.
    pub async fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let data = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        let mime_type = guess_mime_type(&name).to_string();
        Ok(Self::new(name, mime_type, data))
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

fn guess_mime_type(name: &str) -> &'static str {
    match name.rsplit_once('.').map(|(_, ext)| ext.to_lowercase()) {
        Some(ext) if ext == "csv" => "text/csv",
        Some(ext) if ext == "parquet" => "application/vnd.apache.parquet",
        _ => "application/octet-stream",
    }
}

/// Local view of one upload. `server_id` is set once the server accepts it.
#[derive(Debug, Clone)]
pub struct UploadRecord {
    pub local_id: Uuid,
    pub server_id: Option<Uuid>,
    pub filename: String,
    pub size: u64,
    pub status: JobStatus,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
}

/// Notifications published to [`UploadOrchestrator::subscribe`] receivers.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadEvent {
    /// Pre-flight checks rejected the file; nothing was sent.
    Rejected {
        filename: String,
        errors: Vec<ValidationError>,
    },
    Uploaded { filename: String, id: Uuid },
    Retried { id: Uuid },
    Cancelled { filename: String },
    Failed { filename: String, message: String },
}

/// Uploaded bytes keyed by server id, bounded by total size.
struct BlobCache {
    entries: LruCache<Uuid, LocalFile>,
    total_bytes: u64,
    budget_bytes: u64,
}

impl BlobCache {
    fn new(budget_bytes: u64) -> Self {
        Self {
            entries: LruCache::unbounded(),
            total_bytes: 0,
            budget_bytes,
        }
    }

    fn insert(&mut self, id: Uuid, file: LocalFile) {
        self.remove(id);
        let size = file.size();
        if size > self.budget_bytes {
            tracing::debug!(job_id = %id, size_bytes = size, "File exceeds the retention budget, not retained");
            return;
        }
        self.total_bytes += size;
        self.entries.put(id, file);
        while self.total_bytes > self.budget_bytes {
            let Some((evicted, file)) = self.entries.pop_lru() else {
                break;
            };
            self.total_bytes -= file.size();
            tracing::debug!(job_id = %evicted, "Evicted retained upload bytes");
        }
    }

    fn get(&mut self, id: Uuid) -> Option<LocalFile> {
        self.entries.get(&id).cloned()
    }

    fn remove(&mut self, id: Uuid) -> Option<LocalFile> {
        let file = self.entries.pop(&id)?;
        self.total_bytes -= file.size();
        Some(file)
    }
}

struct OrchestratorState {
    records: Vec<UploadRecord>,
    blobs: BlobCache,
    in_flight: usize,
}

pub struct UploadOrchestrator {
    client: ApiClient,
    policy: FileValidationPolicy,
    project_id: Option<Uuid>,
    state: Mutex<OrchestratorState>,
    cancel: Mutex<CancellationToken>,
    events: broadcast::Sender<UploadEvent>,
}

impl UploadOrchestrator {
    pub fn new(client: ApiClient, policy: FileValidationPolicy) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            client,
            policy,
            project_id: None,
            state: Mutex::new(OrchestratorState {
                records: Vec::new(),
                blobs: BlobCache::new(DEFAULT_BLOB_BUDGET_BYTES),
                in_flight: 0,
            }),
            cancel: Mutex::new(CancellationToken::new()),
            events,
        }
    }

    /// Scope every upload of this orchestrator to a project.
    pub fn with_project(mut self, project_id: Uuid) -> Self {
        self.project_id = Some(project_id);
        self
    }

    /// Cap the bytes kept for re-uploads. Files larger than the cap are not kept.
    pub fn with_blob_budget(mut self, budget_bytes: u64) -> Self {
        let state = self
            .state
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        state.blobs = BlobCache::new(budget_bytes);
        self
    }

    pub fn policy(&self) -> &FileValidationPolicy {
        &self.policy
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UploadEvent> {
        self.events.subscribe()
    }

    /// Snapshot of every local record, oldest first.
    pub fn records(&self) -> Vec<UploadRecord> {
        self.lock_state().records.clone()
    }

    /// Total size of the bytes currently kept for re-uploads.
    pub fn retained_bytes(&self) -> u64 {
        self.lock_state().blobs.total_bytes
    }

    pub fn is_retained(&self, id: Uuid) -> bool {
        self.lock_state().blobs.entries.contains(&id)
    }

    /// Drop the retained bytes of a job, e.g. once the caller saw it settle.
    /// Returns whether any were kept.
    pub fn forget(&self, id: Uuid) -> bool {
        self.lock_state().blobs.remove(id).is_some()
    }

    pub fn validate_file(&self, file: &LocalFile) -> Vec<ValidationError> {
        self.policy.validate(&file.name, &file.mime_type, file.size())
    }

    /// Upload one file. Returns `None` on rejection, cancellation or failure;
    /// the reason is published as an event and kept on the local record.
    pub async fn upload_file(&self, file: LocalFile) -> Option<FileJobSummary> {
        let token = self.current_token();
        self.upload_with(file, &token).await
    }

    /// Upload files one after another. A cancellation during the batch skips
    /// every file not yet started.
    pub async fn upload_files(&self, files: Vec<LocalFile>) -> Vec<Option<FileJobSummary>> {
        let token = self.current_token();
        let mut results = Vec::with_capacity(files.len());
        for file in files {
            if token.is_cancelled() {
                results.push(None);
                continue;
            }
            results.push(self.upload_with(file, &token).await);
        }
        results
    }

    /// Abort the in-flight request, if any. Returns whether one was aborted.
    pub fn cancel_upload(&self) -> bool {
        if self.lock_state().in_flight == 0 {
            return false;
        }
        let token = self.lock_cancel();
        token.cancel();
        tracing::info!("Upload cancelled by caller");
        true
    }

    /// Ask the server to start a new pass over a file. When the server no
    /// longer knows the id, the retained bytes are uploaded again and the new
    /// job is returned.
    pub async fn retry_upload(&self, id: Uuid) -> Option<FileJob> {
        match self.client.retry_file(id).await {
            Ok(job) => {
                self.update_record(id, |record| {
                    record.status = job.status;
                    record.error = None;
                });
                self.forget(id);
                let _ = self.events.send(UploadEvent::Retried { id });
                Some(job)
            }
            Err(e) if e.is_not_found() => self.reupload(id).await,
            Err(e) => {
                let filename = self.filename_of(id);
                self.publish_failure(&filename, &e);
                None
            }
        }
    }

    async fn reupload(&self, id: Uuid) -> Option<FileJob> {
        let blob = self.lock_state().blobs.get(id);
        let Some(file) = blob else {
            let filename = self.filename_of(id);
            let _ = self.events.send(UploadEvent::Failed {
                filename,
                message: "The original file is no longer available; select it again".to_string(),
            });
            return None;
        };

        tracing::info!(job_id = %id, filename = %file.name, "Server lost the file, uploading again");
        let summary = self.upload_file(file).await?;
        if summary.id != id {
            self.forget(id);
        }
        match self.client.get_file(summary.id).await {
            Ok(job) => Some(job),
            Err(e) => {
                tracing::warn!(job_id = %summary.id, error = %e, "Re-uploaded job could not be fetched");
                None
            }
        }
    }

    async fn upload_with(&self, file: LocalFile, token: &CancellationToken) -> Option<FileJobSummary> {
        let errors = self.validate_file(&file);
        if has_blocking_errors(&errors) {
            tracing::debug!(filename = %file.name, errors = errors.len(), "File rejected before upload");
            let _ = self.events.send(UploadEvent::Rejected {
                filename: file.name.clone(),
                errors,
            });
            return None;
        }

        let local_id = Uuid::new_v4();
        {
            let mut state = self.lock_state();
            state.records.push(UploadRecord {
                local_id,
                server_id: None,
                filename: file.name.clone(),
                size: file.size(),
                status: JobStatus::Uploading,
                error: None,
                started_at: Utc::now(),
            });
            state.in_flight += 1;
        }

        let request = UploadRequest {
            filename: file.name.clone(),
            mime_type: file.mime_type.clone(),
            data: file.data.clone(),
            project_id: self.project_id,
            description: None,
        };
        let outcome = tokio::select! {
            _ = token.cancelled() => Err(ClientError::Cancelled),
            result = self.client.upload_file(request) => result,
        };

        let mut state = self.lock_state();
        state.in_flight = state.in_flight.saturating_sub(1);
        let record = state.records.iter_mut().find(|r| r.local_id == local_id);
        match outcome {
            Ok(summary) => {
                if let Some(record) = record {
                    record.server_id = Some(summary.id);
                    record.status = summary.status;
                }
                state.blobs.insert(summary.id, file.clone());
                drop(state);
                tracing::info!(job_id = %summary.id, filename = %file.name, "File uploaded");
                let _ = self.events.send(UploadEvent::Uploaded {
                    filename: file.name,
                    id: summary.id,
                });
                Some(summary)
            }
            Err(ClientError::Cancelled) => {
                if let Some(record) = record {
                    record.status = JobStatus::Error;
                    record.error = Some("Upload cancelled".to_string());
                }
                drop(state);
                let _ = self.events.send(UploadEvent::Cancelled { filename: file.name });
                None
            }
            Err(e) => {
                if let Some(record) = record {
                    record.status = JobStatus::Error;
                    record.error = Some(e.to_string());
                }
                drop(state);
                self.publish_failure(&file.name, &e);
                None
            }
        }
    }

    /// The shared token, replaced by a fresh one once it has fired.
    fn current_token(&self) -> CancellationToken {
        let mut token = self.lock_cancel();
        if token.is_cancelled() {
            *token = CancellationToken::new();
        }
        token.clone()
    }

    fn update_record(&self, id: Uuid, update: impl FnOnce(&mut UploadRecord)) {
        let mut state = self.lock_state();
        if let Some(record) = state.records.iter_mut().find(|r| r.server_id == Some(id)) {
            update(record);
        }
    }

    fn filename_of(&self, id: Uuid) -> String {
        self.lock_state()
            .records
            .iter()
            .find(|r| r.server_id == Some(id))
            .map(|r| r.filename.clone())
            .unwrap_or_else(|| id.to_string())
    }

    fn publish_failure(&self, filename: &str, error: &ClientError) {
        tracing::warn!(filename = %filename, error = %error, "Upload request failed");
        let _ = self.events.send(UploadEvent::Failed {
            filename: filename.to_string(),
            message: error.to_string(),
        });
    }

    fn lock_state(&self) -> MutexGuard<'_, OrchestratorState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_cancel(&self) -> MutexGuard<'_, CancellationToken> {
        self.cancel.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
