//! Multipart extraction for the upload endpoint.

use axum::extract::multipart::{Field, MultipartError};
use axum::extract::Multipart;
use axum::http::StatusCode;
use bytes::{Bytes, BytesMut};
use dlflow_core::{AppError, FileValidationPolicy};

use crate::constants::UPLOAD_FILE_FIELD;

/// Fields of an upload form.
#[derive(Debug)]
pub struct UploadForm {
    pub filename: String,
    pub content_type: String,
    pub data: Bytes,
    pub project_id: Option<String>,
    pub description: Option<String>,
}

pub fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge("Request body exceeds the upload limit".to_string())
    } else {
        AppError::InvalidInput(format!("Failed to read multipart: {}", err.body_text()))
    }
}

/// Read the upload form. The extension is checked as soon as the file part's
/// header arrives and the size while its body streams in, so a rejected file
/// is never buffered in full.
pub async fn extract_upload_form(
    mut multipart: Multipart,
    policy: &FileValidationPolicy,
) -> Result<UploadForm, AppError> {
    let mut file: Option<(String, String, Bytes)> = None;
    let mut project_id = None;
    let mut description = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(str::to_string).unwrap_or_default();
        match name.as_str() {
            UPLOAD_FILE_FIELD => {
                if file.is_some() {
                    return Err(AppError::InvalidInput(
                        "Multiple file fields are not allowed; send exactly one field named 'file'"
                            .to_string(),
                    ));
                }
                let filename = field
                    .file_name()
                    .map(str::to_string)
                    .unwrap_or_else(|| "unknown".to_string());
                let content_type = field
                    .content_type()
                    .map(str::to_string)
                    .unwrap_or_default();
                policy.check_extension(&filename)?;
                let data = read_capped(field, policy).await?;
                file = Some((filename, content_type, data));
            }
            "project_id" => project_id = non_empty(field.text().await.map_err(multipart_error)?),
            "description" => description = non_empty(field.text().await.map_err(multipart_error)?),
            other => {
                tracing::debug!(field = %other, "Ignoring unknown multipart field");
            }
        }
    }

    let (filename, content_type, data) =
        file.ok_or_else(|| AppError::InvalidInput("No file provided".to_string()))?;

    Ok(UploadForm {
        filename,
        content_type,
        data,
        project_id,
        description,
    })
}

async fn read_capped(mut field: Field<'_>, policy: &FileValidationPolicy) -> Result<Bytes, AppError> {
    let mut buf = BytesMut::new();
    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        let total = (buf.len() + chunk.len()) as u64;
        if total > policy.max_file_size_bytes {
            policy.check_size(total)?;
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf.freeze())
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
