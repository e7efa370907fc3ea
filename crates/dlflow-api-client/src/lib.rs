//! HTTP client for the DLFlow ingestion API.
//!
//! [`ApiClient`] wraps the REST surface. On top of it, [`UploadOrchestrator`]
//! runs pre-flight checks and tracks local upload records, and
//! [`PreviewLoader`] reveals a file's preview in stages with a race guard and
//! a per-file cache. Each orchestrator or loader value owns its own state.

pub mod api;
pub mod error;
pub mod orchestrator;
pub mod preview;

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use std::time::Duration;

pub use api::{FileListQuery, UploadRequest};
pub use dlflow_core::models::{DeleteResponse, FileListResponse, FilePreviewResponse};
pub use error::{ClientError, ClientResult};
pub use orchestrator::{
    LocalFile, UploadEvent, UploadOrchestrator, UploadRecord, DEFAULT_BLOB_BUDGET_BYTES,
};
pub use preview::{
    FormatInfo, LoadStatus, PreviewLoader, PreviewLoaderConfig, PreviewPhase, PreviewResult,
    PreviewStage, PreviewState,
};

use error::ServerErrorBody;

/// API path prefix served by the ingestion server.
pub const API_PREFIX: &str = dlflow_core::constants::API_PREFIX;

const DEFAULT_BASE_URL: &str = "http://localhost:8000";
const REQUEST_TIMEOUT_SECS: u64 = 60;

/// HTTP client for the ingestion API.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> ClientResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| ClientError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Create client from environment: `DLFLOW_API_URL` (default `http://localhost:8000`).
    pub fn from_env() -> ClientResult<Self> {
        let base_url =
            std::env::var("DLFLOW_API_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Self::new(base_url)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn build_url(&self, path: &str) -> String {
        format!("{}{}{}", self.base_url, API_PREFIX, path)
    }

    pub(crate) fn request(&self, method: reqwest::Method, path: &str) -> RequestBuilder {
        self.client.request(method, self.build_url(path))
    }

    /// Send a request and decode a JSON body, turning non-success statuses
    /// into [`ClientError::Server`].
    pub(crate) async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> ClientResult<T> {
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let (message, code) = match serde_json::from_str::<ServerErrorBody>(&text) {
                Ok(body) => (body.error, body.code),
                Err(_) if text.is_empty() => (status.to_string(), None),
                Err(_) => (text, None),
            };
            tracing::debug!(status = status.as_u16(), code = ?code, "API request failed");
            return Err(ClientError::Server {
                status: status.as_u16(),
                code,
                message,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))
    }
}
