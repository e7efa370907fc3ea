use dlflow_core::models::{FileJob, JobListFilter};
use dlflow_core::AppError;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::{OnceCell, RwLock};
use uuid::Uuid;

use super::JobRepository;

const INTERRUPTED_MESSAGE: &str = "Processing was interrupted by a restart; retry the file";

/// Job registry persisted as one `{id}.json` document per job.
///
/// Documents are written to a temporary file and renamed into place. The
/// directory is scanned once, on first access; after that the in-memory
/// index is authoritative and every change is written through.
///
/// No task survives a restart, so a record found `uploading` or `validating`
/// on load is failed and written back; it can then be retried.
pub struct JsonJobRepository {
    dir: PathBuf,
    jobs: RwLock<HashMap<Uuid, FileJob>>,
    loaded: OnceCell<()>,
}

impl JsonJobRepository {
    pub async fn new(dir: impl Into<PathBuf>) -> Result<Self, AppError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await.map_err(|e| {
            AppError::Storage(format!(
                "Failed to create jobs directory {}: {}",
                dir.display(),
                e
            ))
        })?;
        Ok(Self {
            dir,
            jobs: RwLock::new(HashMap::new()),
            loaded: OnceCell::new(),
        })
    }

    fn path_for(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    async fn ensure_loaded(&self) -> Result<(), AppError> {
        self.loaded
            .get_or_try_init(|| async {
                let mut loaded = load_dir(&self.dir).await?;
                let mut interrupted = 0usize;
                for job in loaded.values_mut().filter(|j| j.is_in_flight()) {
                    job.fail(INTERRUPTED_MESSAGE);
                    self.write_document(job).await?;
                    interrupted += 1;
                }
                if interrupted > 0 {
                    tracing::warn!(count = interrupted, "Failed job records interrupted by restart");
                }
                tracing::info!(count = loaded.len(), dir = %self.dir.display(), "Loaded job records");
                self.jobs.write().await.extend(loaded);
                Ok::<(), AppError>(())
            })
            .await?;
        Ok(())
    }

    async fn write_document(&self, job: &FileJob) -> Result<(), AppError> {
        let path = self.path_for(job.id);
        let tmp_path = self.dir.join(format!(".{}.json.tmp", job.id));
        let body = serde_json::to_vec_pretty(job)
            .map_err(|e| AppError::Internal(format!("Failed to serialize job {}: {}", job.id, e)))?;

        fs::write(&tmp_path, &body).await.map_err(|e| {
            AppError::Storage(format!("Failed to write {}: {}", tmp_path.display(), e))
        })?;
        fs::rename(&tmp_path, &path).await.map_err(|e| {
            AppError::Storage(format!("Failed to move {} into place: {}", path.display(), e))
        })?;
        Ok(())
    }
}

async fn load_dir(dir: &Path) -> Result<HashMap<Uuid, FileJob>, AppError> {
    let mut jobs = HashMap::new();
    let mut entries = fs::read_dir(dir).await.map_err(|e| {
        AppError::Storage(format!("Failed to read jobs directory {}: {}", dir.display(), e))
    })?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_document = path.extension().and_then(|e| e.to_str()) == Some("json")
            && !path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with('.'));
        if !is_document {
            continue;
        }

        let body = match fs::read(&path).await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable job record");
                continue;
            }
        };
        match serde_json::from_slice::<FileJob>(&body) {
            Ok(job) => {
                jobs.insert(job.id, job);
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Skipping malformed job record");
            }
        }
    }

    Ok(jobs)
}

#[async_trait::async_trait]
impl JobRepository for JsonJobRepository {
    #[tracing::instrument(skip(self), fields(db.table = "jobs", db.operation = "select", db.record_id = %id))]
    async fn get(&self, id: Uuid) -> Result<Option<FileJob>, AppError> {
        self.ensure_loaded().await?;
        Ok(self.jobs.read().await.get(&id).cloned())
    }

    #[tracing::instrument(skip(self, job), fields(db.table = "jobs", db.operation = "upsert", db.record_id = %job.id))]
    async fn put(&self, job: FileJob) -> Result<(), AppError> {
        self.ensure_loaded().await?;
        // Holding the write lock across the file write keeps disk and index in the same order.
        let mut jobs = self.jobs.write().await;
        self.write_document(&job).await?;
        jobs.insert(job.id, job);
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "jobs", db.operation = "delete", db.record_id = %id))]
    async fn delete(&self, id: Uuid) -> Result<Option<FileJob>, AppError> {
        self.ensure_loaded().await?;
        let mut jobs = self.jobs.write().await;
        let removed = jobs.remove(&id);
        if removed.is_some() {
            let path = self.path_for(id);
            if let Err(e) = fs::remove_file(&path).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    return Err(AppError::Storage(format!(
                        "Failed to delete {}: {}",
                        path.display(),
                        e
                    )));
                }
            }
        }
        Ok(removed)
    }

    #[tracing::instrument(skip(self), fields(db.table = "jobs", db.operation = "select"))]
    async fn list(&self, filter: &JobListFilter) -> Result<Vec<FileJob>, AppError> {
        self.ensure_loaded().await?;
        let jobs = self.jobs.read().await;
        Ok(filter.apply(jobs.values()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dlflow_core::models::{FileType, JobStatus};
    use tempfile::tempdir;

    fn job() -> FileJob {
        FileJob::new(
            Uuid::new_v4(),
            "readings.parquet",
            FileType::Parquet,
            4096,
            "application/octet-stream",
            None,
            Some("sensor dump".to_string()),
        )
    }

    #[tokio::test]
    async fn test_records_survive_reopen() {
        let dir = tempdir().unwrap();
        let job = job();

        {
            let repo = JsonJobRepository::new(dir.path()).await.unwrap();
            repo.put(job.clone()).await.unwrap();
        }

        let reopened = JsonJobRepository::new(dir.path()).await.unwrap();
        let loaded = reopened.get(job.id).await.unwrap().unwrap();
        assert_eq!(loaded, job);
        assert_eq!(reopened.list(&JobListFilter::default()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_in_flight_records_fail_on_reopen() {
        let dir = tempdir().unwrap();
        let mut job = job();
        job.begin_validation();

        {
            let repo = JsonJobRepository::new(dir.path()).await.unwrap();
            repo.put(job.clone()).await.unwrap();
        }

        let reopened = JsonJobRepository::new(dir.path()).await.unwrap();
        let loaded = reopened.get(job.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, JobStatus::Error);
        assert!(!loaded.is_in_flight());
        assert_eq!(loaded.error.as_deref(), Some(INTERRUPTED_MESSAGE));
        assert_eq!(loaded.attempt, job.attempt);

        let body = std::fs::read(dir.path().join(format!("{}.json", job.id))).unwrap();
        let on_disk: FileJob = serde_json::from_slice(&body).unwrap();
        assert_eq!(on_disk.status, JobStatus::Error);
    }

    #[tokio::test]
    async fn test_delete_removes_document() {
        let dir = tempdir().unwrap();
        let repo = JsonJobRepository::new(dir.path()).await.unwrap();
        let job = job();
        repo.put(job.clone()).await.unwrap();
        assert!(dir.path().join(format!("{}.json", job.id)).exists());

        assert!(repo.delete(job.id).await.unwrap().is_some());
        assert!(!dir.path().join(format!("{}.json", job.id)).exists());
    }

    #[tokio::test]
    async fn test_malformed_documents_are_skipped() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("broken.json"), b"{not json").unwrap();

        let repo = JsonJobRepository::new(dir.path()).await.unwrap();
        assert!(repo.list(&JobListFilter::default()).await.unwrap().is_empty());
    }
}
