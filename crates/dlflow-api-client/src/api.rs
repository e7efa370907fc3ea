//! Domain methods for the ingestion API client.
//!
//! Job, report, preview and response types come from `dlflow_core::models`.

use crate::{ApiClient, ClientError, ClientResult};
use bytes::Bytes;
use dlflow_core::models::{
    DeleteResponse, FileJob, FileJobSummary, FileListResponse, FilePreviewResponse, FileStats,
    FileType, JobStatus,
};
use reqwest::Method;
use uuid::Uuid;

/// Listing filters; unset fields are not sent.
#[derive(Debug, Clone, Default)]
pub struct FileListQuery {
    pub project_id: Option<Uuid>,
    pub status: Option<JobStatus>,
    pub file_type: Option<FileType>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl FileListQuery {
    fn pairs(&self) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        if let Some(p) = self.project_id {
            query.push(("project_id", p.to_string()));
        }
        if let Some(s) = self.status {
            query.push(("status", s.to_string()));
        }
        if let Some(t) = self.file_type {
            query.push(("file_type", t.to_string()));
        }
        if let Some(l) = self.limit {
            query.push(("limit", l.to_string()));
        }
        if let Some(o) = self.offset {
            query.push(("offset", o.to_string()));
        }
        query
    }
}

/// One multipart upload.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub filename: String,
    pub mime_type: String,
    pub data: Bytes,
    pub project_id: Option<Uuid>,
    pub description: Option<String>,
}

impl ApiClient {
    /// `POST /files/upload`. Returns once the server has registered the job.
    pub async fn upload_file(&self, upload: UploadRequest) -> ClientResult<FileJobSummary> {
        let length = upload.data.len() as u64;
        let mut part =
            reqwest::multipart::Part::stream_with_length(reqwest::Body::from(upload.data), length)
                .file_name(upload.filename);
        if !upload.mime_type.is_empty() {
            part = part.mime_str(&upload.mime_type).map_err(|e| {
                ClientError::Config(format!("Invalid MIME type {}: {}", upload.mime_type, e))
            })?;
        }
        let mut form = reqwest::multipart::Form::new().part("file", part);
        if let Some(project_id) = upload.project_id {
            form = form.text("project_id", project_id.to_string());
        }
        if let Some(description) = upload.description {
            form = form.text("description", description);
        }

        self.send(self.request(Method::POST, "/files/upload").multipart(form))
            .await
    }

    pub async fn list_files(&self, query: &FileListQuery) -> ClientResult<FileListResponse> {
        self.send(self.request(Method::GET, "/files").query(&query.pairs()))
            .await
    }

    pub async fn get_file(&self, id: Uuid) -> ClientResult<FileJob> {
        self.send(self.request(Method::GET, &format!("/files/{}", id)))
            .await
    }

    pub async fn get_preview(&self, id: Uuid) -> ClientResult<FilePreviewResponse> {
        self.send(self.request(Method::GET, &format!("/files/{}/preview", id)))
            .await
    }

    pub async fn get_stats(&self, id: Uuid) -> ClientResult<FileStats> {
        self.send(self.request(Method::GET, &format!("/files/{}/stats", id)))
            .await
    }

    /// `POST /files/{id}/retry`. The returned job has re-entered `validating`.
    pub async fn retry_file(&self, id: Uuid) -> ClientResult<FileJob> {
        self.send(self.request(Method::POST, &format!("/files/{}/retry", id)))
            .await
    }

    pub async fn delete_file(&self, id: Uuid) -> ClientResult<DeleteResponse> {
        self.send(self.request(Method::DELETE, &format!("/files/{}", id)))
            .await
    }
}
