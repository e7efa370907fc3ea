//! Health check handler and response type.

use crate::constants::HEALTH_CHECK_TIMEOUT_SECS;
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use dlflow_core::models::JobListFilter;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Run an async check with timeout; returns "healthy", "timeout", or "{prefix}: {error}".
async fn run_check<F, E>(timeout: Duration, f: F, error_prefix: &str) -> String
where
    F: Future<Output = Result<(), E>>,
    E: Display,
{
    match tokio::time::timeout(timeout, f).await {
        Ok(Ok(())) => "healthy".to_string(),
        Ok(Err(e)) => format!("{}: {}", error_prefix, e),
        Err(_) => "timeout".to_string(),
    }
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct HealthCheckResponse {
    pub status: String,
    pub storage: String,
    pub job_store: String,
    pub ingest_queue: String,
}

/// `GET /health`: storage root, job store and ingestion queue.
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let timeout = Duration::from_secs(HEALTH_CHECK_TIMEOUT_SECS);

    let storage = run_check(
        timeout,
        async { state.upload.storage.exists(".health").await.map(|_| ()) },
        "unhealthy",
    )
    .await;

    let probe = JobListFilter {
        limit: Some(1),
        ..Default::default()
    };
    let job_store = run_check(
        timeout,
        async { state.jobs.repository.list(&probe).await.map(|_| ()) },
        "unhealthy",
    )
    .await;

    let ingest_queue = if state.ingest.queue.is_shutdown() {
        "shut down".to_string()
    } else {
        "healthy".to_string()
    };

    let healthy = [&storage, &job_store, &ingest_queue]
        .iter()
        .all(|s| s.as_str() == "healthy");
    if !healthy {
        tracing::warn!(
            storage = %storage,
            job_store = %job_store,
            ingest_queue = %ingest_queue,
            "Health check failed"
        );
    }

    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status_code,
        Json(HealthCheckResponse {
            status: if healthy { "healthy" } else { "unhealthy" }.to_string(),
            storage,
            job_store,
            ingest_queue,
        }),
    )
}
