use crate::error::HttpAppError;
use crate::services::jobs::{parse_job_id, JobService};
use crate::state::AppState;
use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    response::IntoResponse,
    Json,
};
use dlflow_core::models::JobListFilter;
use std::sync::Arc;

pub async fn list_files(
    State(state): State<Arc<AppState>>,
    filter: Result<Query<JobListFilter>, QueryRejection>,
) -> Result<impl IntoResponse, HttpAppError> {
    let Query(filter) = filter?;
    let response = JobService::new(&state).list(&filter).await?;
    Ok(Json(response))
}

#[tracing::instrument(skip(state), fields(operation = "get_file"))]
pub async fn get_file(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, HttpAppError> {
    let job = JobService::new(&state).get(parse_job_id(&id)?).await?;
    Ok(Json(job))
}

pub async fn get_file_preview(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, HttpAppError> {
    let preview = JobService::new(&state).preview(parse_job_id(&id)?).await?;
    Ok(Json(preview))
}

pub async fn get_file_stats(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, HttpAppError> {
    let stats = JobService::new(&state).stats(parse_job_id(&id)?).await?;
    Ok(Json(stats))
}

#[tracing::instrument(skip(state), fields(operation = "retry_file"))]
pub async fn retry_file(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, HttpAppError> {
    let job = JobService::new(&state).retry(parse_job_id(&id)?).await?;
    Ok(Json(job))
}

#[tracing::instrument(skip(state), fields(operation = "delete_file"))]
pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, HttpAppError> {
    let response = JobService::new(&state).delete(parse_job_id(&id)?).await?;
    Ok(Json(response))
}
