//! Client error type.

use serde::Deserialize;
use thiserror::Error;

/// Failures of a client call. Pre-flight findings are not errors here; they
/// are returned as `ValidationError` lists before any request is made.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport failure or timeout; the request may not have reached the server.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("Server error {status}: {message}")]
    Server {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Request cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Server { status, .. } => Some(*status),
            ClientError::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Machine-readable code from the server's error body, if any.
    pub fn code(&self) -> Option<&str> {
        match self {
            ClientError::Server { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}

/// Subset of the server's error body the client reads.
#[derive(Debug, Deserialize)]
pub(crate) struct ServerErrorBody {
    pub error: String,
    #[serde(default)]
    pub code: Option<String>,
}

pub type ClientResult<T> = Result<T, ClientError>;
