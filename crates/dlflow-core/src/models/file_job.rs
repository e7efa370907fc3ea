use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use uuid::Uuid;

use super::{PreviewData, ValidationReport};
use crate::constants::{PROGRESS_COMPLETE, PROGRESS_VALIDATING};
use crate::error::AppError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Csv,
    Parquet,
}

impl FileType {
    pub fn extension(&self) -> &'static str {
        match self {
            FileType::Csv => "csv",
            FileType::Parquet => "parquet",
        }
    }

    /// Resolve a file type from a filename's extension (case-insensitive).
    pub fn from_filename(filename: &str) -> Option<Self> {
        let (_, ext) = filename.rsplit_once('.')?;
        ext.parse().ok()
    }
}

impl Display for FileType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.extension())
    }
}

impl FromStr for FileType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim_start_matches('.').to_lowercase().as_str() {
            "csv" => Ok(FileType::Csv),
            "parquet" => Ok(FileType::Parquet),
            _ => Err(anyhow::anyhow!("Invalid file type: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Uploading,
    Validating,
    Success,
    Error,
}

impl Display for JobStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            JobStatus::Uploading => write!(f, "uploading"),
            JobStatus::Validating => write!(f, "validating"),
            JobStatus::Success => write!(f, "success"),
            JobStatus::Error => write!(f, "error"),
        }
    }
}

impl FromStr for JobStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "uploading" => Ok(JobStatus::Uploading),
            "validating" => Ok(JobStatus::Validating),
            "success" => Ok(JobStatus::Success),
            "error" => Ok(JobStatus::Error),
            _ => Err(anyhow::anyhow!("Invalid job status: {}", s)),
        }
    }
}

/// Server-side record tracking one uploaded file through upload, validation and preview.
///
/// Every state change goes through the methods below so that the progress
/// and status rules hold no matter which stage performs the update.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileJob {
    pub id: Uuid,
    pub original_filename: String,
    pub stored_filename: String,
    pub file_type: FileType,
    #[serde(rename = "file_size")]
    pub size_bytes: u64,
    pub mime_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: JobStatus,
    pub progress: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_report: Option<ValidationReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_data: Option<PreviewData>,
    /// Why the preview is missing on a job that otherwise succeeded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_error: Option<String>,
    /// Processing pass this record belongs to; bumped on every retry.
    pub attempt: u32,
    #[serde(rename = "upload_time")]
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Lightweight view returned by the upload and list endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileJobSummary {
    pub id: Uuid,
    pub original_filename: String,
    pub file_type: FileType,
    pub file_size: u64,
    pub upload_time: DateTime<Utc>,
    pub status: JobStatus,
    pub progress: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<Uuid>,
}

impl FileJob {
    pub fn new(
        id: Uuid,
        original_filename: impl Into<String>,
        file_type: FileType,
        size_bytes: u64,
        mime_type: impl Into<String>,
        project_id: Option<Uuid>,
        description: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            original_filename: original_filename.into(),
            stored_filename: Self::stored_filename_for(id, file_type),
            file_type,
            size_bytes,
            mime_type: mime_type.into(),
            project_id,
            description,
            status: JobStatus::Uploading,
            progress: 0,
            error: None,
            validation_report: None,
            preview_data: None,
            preview_error: None,
            attempt: 1,
            created_at: now,
            updated_at: now,
        }
    }

    /// Name of the stored bytes: `{id}.{ext}`.
    pub fn stored_filename_for(id: Uuid, file_type: FileType) -> String {
        format!("{}.{}", id, file_type.extension())
    }

    /// Whether a processing pass for this job may still be running.
    pub fn is_in_flight(&self) -> bool {
        matches!(self.status, JobStatus::Uploading | JobStatus::Validating)
    }

    pub fn begin_validation(&mut self) {
        self.status = JobStatus::Validating;
        self.progress = self.progress.max(PROGRESS_VALIDATING);
        self.touch();
    }

    /// Terminal failure of the current pass.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.status = JobStatus::Error;
        self.error = Some(message.into());
        self.progress = 0;
        self.preview_data = None;
        self.touch();
    }

    /// Record a report that marks the file invalid; the pipeline halts here.
    pub fn reject(&mut self, report: ValidationReport) {
        let message = report.failure_message();
        self.validation_report = Some(report);
        self.fail(message);
    }

    /// Record a passing report; the job stays in `validating` until the preview stage settles it.
    pub fn accept(&mut self, report: ValidationReport) -> Result<(), AppError> {
        if !report.is_valid {
            return Err(AppError::Internal(format!(
                "Job {} cannot accept an invalid validation report",
                self.id
            )));
        }
        self.validation_report = Some(report);
        self.touch();
        Ok(())
    }

    /// Finish the pass as `success`. `preview` is `None` when the preview stage failed
    /// and the soft policy applies, in which case `preview_error` says why.
    pub fn succeed(
        &mut self,
        preview: Option<PreviewData>,
        preview_error: Option<String>,
    ) -> Result<(), AppError> {
        let valid = self
            .validation_report
            .as_ref()
            .map(|r| r.is_valid)
            .unwrap_or(false);
        if !valid {
            return Err(AppError::Internal(format!(
                "Job {} cannot succeed without a passing validation report",
                self.id
            )));
        }
        self.status = JobStatus::Success;
        self.progress = PROGRESS_COMPLETE;
        self.error = None;
        self.preview_data = preview;
        self.preview_error = preview_error;
        self.touch();
        Ok(())
    }

    /// Clear every derived field and re-enter validation under a new attempt number.
    pub fn reset_for_retry(&mut self) {
        self.attempt += 1;
        self.error = None;
        self.validation_report = None;
        self.preview_data = None;
        self.preview_error = None;
        self.status = JobStatus::Validating;
        self.progress = PROGRESS_VALIDATING;
        self.touch();
    }

    pub fn summary(&self) -> FileJobSummary {
        FileJobSummary {
            id: self.id,
            original_filename: self.original_filename.clone(),
            file_type: self.file_type,
            file_size: self.size_bytes,
            upload_time: self.created_at,
            status: self.status,
            progress: self.progress,
            project_id: self.project_id,
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Filters accepted by job listing, newest first.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobListFilter {
    pub project_id: Option<Uuid>,
    pub status: Option<JobStatus>,
    pub file_type: Option<FileType>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl JobListFilter {
    pub const DEFAULT_LIMIT: usize = 100;

    pub fn matches(&self, job: &FileJob) -> bool {
        self.project_id.map_or(true, |p| job.project_id == Some(p))
            && self.status.map_or(true, |s| job.status == s)
            && self.file_type.map_or(true, |t| job.file_type == t)
    }

    /// Filter, sort newest first, then page.
    pub fn apply<'a>(&self, jobs: impl IntoIterator<Item = &'a FileJob>) -> Vec<FileJob> {
        let mut matching: Vec<&FileJob> = jobs.into_iter().filter(|j| self.matches(j)).collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matching
            .into_iter()
            .skip(self.offset.unwrap_or(0))
            .take(self.limit.unwrap_or(Self::DEFAULT_LIMIT))
            .cloned()
            .collect()
    }
}
