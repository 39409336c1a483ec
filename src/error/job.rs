//! Evaluation job fetch errors.

use thiserror::Error;

use crate::traits::HttpError;

/// A single remote call made on behalf of a tracked job failed.
///
/// This describes our view of the job, not the job itself: a transport
/// failure says nothing about whether the remote job is still running.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum JobFetchError {
    /// The request never produced a response.
    #[error("transport error for job {job_id}: {message}")]
    Transport { job_id: String, message: String },

    /// The service answered with a non-2xx status.
    #[error("job {job_id} request failed ({status}): {message}")]
    Status {
        job_id: String,
        status: u16,
        message: String,
    },

    /// The response body did not match the expected shape.
    #[error("invalid response for job {job_id}: {message}")]
    Decode { job_id: String, message: String },
}

impl JobFetchError {
    /// Build from an HTTP-layer error for the given job.
    pub fn from_http(job_id: &str, err: HttpError) -> Self {
        match err {
            HttpError::ServerError { status, message } => JobFetchError::Status {
                job_id: job_id.to_string(),
                status,
                message,
            },
            other => JobFetchError::Transport {
                job_id: job_id.to_string(),
                message: other.to_string(),
            },
        }
    }

    /// The job this failure belongs to.
    pub fn job_id(&self) -> &str {
        match self {
            JobFetchError::Transport { job_id, .. }
            | JobFetchError::Status { job_id, .. }
            | JobFetchError::Decode { job_id, .. } => job_id,
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            JobFetchError::Transport { .. } => true,
            JobFetchError::Status { status, .. } => *status >= 500 || *status == 429,
            JobFetchError::Decode { .. } => false,
        }
    }
}
