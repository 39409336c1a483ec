use crate::models::{EvaluationJob, EvaluationResults};

/// Notification broadcast by the registry as tracked jobs change.
#[derive(Debug, Clone)]
pub enum JobUpdate {
    /// A status report was applied to the job record.
    Status(EvaluationJob),
    /// The job completed and its results were fetched.
    Completed {
        job_id: String,
        results: Box<EvaluationResults>,
    },
    /// The job itself reported failure.
    Failed {
        job_id: String,
        error: Option<String>,
    },
    /// The job completed but fetching its results failed.
    ResultsUnavailable { job_id: String, error: String },
    /// Polling ended because the status could not be fetched or the caller
    /// stopped it. The remote job may still be running.
    PollingStopped { job_id: String, reason: String },
}

impl JobUpdate {
    pub fn job_id(&self) -> &str {
        match self {
            JobUpdate::Status(job) => &job.job_id,
            JobUpdate::Completed { job_id, .. }
            | JobUpdate::Failed { job_id, .. }
            | JobUpdate::ResultsUnavailable { job_id, .. }
            | JobUpdate::PollingStopped { job_id, .. } => job_id,
        }
    }

    /// Whether this is the last update the current polling handle sends
    /// for its job.
    pub fn is_final(&self) -> bool {
        !matches!(self, JobUpdate::Status(_))
    }
}
