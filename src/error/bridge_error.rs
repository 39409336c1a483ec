//! Top-level error type for direct client and context calls.

use thiserror::Error;

use super::job::JobFetchError;
use super::stream::StreamError;
use crate::traits::HttpError;

/// Errors returned to callers of [`BackendClient`](crate::backend::BackendClient)
/// and [`BridgeContext`](crate::context::BridgeContext).
#[derive(Debug, Error)]
pub enum BridgeError {
    /// HTTP transport or status failure.
    #[error(transparent)]
    Http(#[from] HttpError),

    /// Stream could not be established or ended abnormally.
    #[error(transparent)]
    Stream(#[from] StreamError),

    /// Evaluation job call failed.
    #[error(transparent)]
    Job(#[from] JobFetchError),

    /// Response body could not be decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Request rejected locally before it was sent.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Result alias for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;

impl BridgeError {
    pub fn is_retryable(&self) -> bool {
        match self {
            BridgeError::Http(err) => err.is_retryable(),
            BridgeError::Stream(err) => err.is_retryable(),
            BridgeError::Job(err) => err.is_retryable(),
            BridgeError::Json(_) | BridgeError::InvalidRequest(_) => false,
        }
    }
}
