use dlflow_core::AppError;
use std::path::PathBuf;
use tokio::fs;
use uuid::Uuid;

/// Read access to the project collection, used only to check that a
/// project-scoped upload names an existing project.
#[async_trait::async_trait]
pub trait ProjectStore: Send + Sync {
    async fn exists(&self, project_id: Uuid) -> Result<bool, AppError>;
}

/// Projects stored as `{PROJECTS_DIR}/{id}.json`.
#[derive(Clone, Debug)]
pub struct JsonProjectStore {
    dir: PathBuf,
}

impl JsonProjectStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait::async_trait]
impl ProjectStore for JsonProjectStore {
    #[tracing::instrument(skip(self), fields(db.table = "projects", db.operation = "select"))]
    async fn exists(&self, project_id: Uuid) -> Result<bool, AppError> {
        let path = self.dir.join(format!("{}.json", project_id));
        Ok(fs::try_exists(&path).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_exists_checks_project_file() {
        let dir = tempdir().unwrap();
        let store = JsonProjectStore::new(dir.path());
        let id = Uuid::new_v4();

        assert!(!store.exists(id).await.unwrap());
        std::fs::write(dir.path().join(format!("{}.json", id)), br#"{"name":"demo"}"#).unwrap();
        assert!(store.exists(id).await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_directory_means_no_projects() {
        let dir = tempdir().unwrap();
        let store = JsonProjectStore::new(dir.path().join("absent"));
        assert!(!store.exists(Uuid::new_v4()).await.unwrap());
    }
}
