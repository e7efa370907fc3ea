use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{FileJobSummary, PreviewData, ValidationReport};

/// `GET /files` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileListResponse {
    pub files: Vec<FileJobSummary>,
}

/// `GET /files/{id}/preview` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilePreviewResponse {
    pub preview: PreviewData,
    pub validation: ValidationReport,
}

/// `DELETE /files/{id}` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub message: String,
    pub id: Uuid,
}
