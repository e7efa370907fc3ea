use crate::error::HttpAppError;
use crate::services::UploadReceiver;
use crate::state::AppState;
use axum::{
    extract::{Multipart, State},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

/// `POST /api/files/upload`
///
/// Responds as soon as the bytes are stored and the job is registered; the
/// returned summary reads `status: "uploading"` while validation is queued.
#[tracing::instrument(skip(state, multipart), fields(operation = "upload_file"))]
pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<impl IntoResponse, HttpAppError> {
    let summary = UploadReceiver::new(&state).receive(multipart).await?;
    Ok(Json(summary))
}
