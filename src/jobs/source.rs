use async_trait::async_trait;

use crate::error::JobFetchError;
use crate::models::{EvaluationResults, JobStatusReport};

/// Remote side of a tracked job.
///
/// The registry polls `fetch_status` and calls `fetch_results` once when a
/// job completes. Implemented by [`BackendClient`](crate::backend::BackendClient)
/// against the evaluation service.
#[async_trait]
pub trait JobSource: Send + Sync {
    async fn fetch_status(&self, job_id: &str) -> Result<JobStatusReport, JobFetchError>;

    async fn fetch_results(&self, job_id: &str) -> Result<EvaluationResults, JobFetchError>;
}
