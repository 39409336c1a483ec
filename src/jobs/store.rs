use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::models::{
    EvaluationJob, EvaluationRequest, EvaluationResults, JobStatusReport, SubmittedJob,
};

/// Result of folding one status report into the store
#[derive(Debug, Clone, PartialEq)]
pub struct StoreOutcome {
    /// Record after the report was considered
    pub job: EvaluationJob,
    /// `false` when the report was rejected as a backward or post-terminal
    /// transition
    pub applied: bool,
}

#[derive(Default)]
struct StoreInner {
    jobs: HashMap<String, EvaluationJob>,
    results: HashMap<String, EvaluationResults>,
}

/// Shared record of every tracked job and any fetched results.
///
/// Status writes are monotonic: a report that would move a job backwards,
/// or out of `completed`/`failed`, is logged and dropped.
#[derive(Default)]
pub struct JobStore {
    inner: Mutex<StoreInner>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Fold a status report into the job's record, creating it on first sight.
    pub fn apply_report(&self, report: &JobStatusReport) -> StoreOutcome {
        let mut inner = self.lock();
        match inner.jobs.get_mut(&report.job_id) {
            Some(job) => {
                let from = job.status;
                let applied = job.apply(report);
                if !applied {
                    tracing::warn!(
                        "Ignoring status {} for job {} (already {})",
                        report.status,
                        report.job_id,
                        from
                    );
                }
                StoreOutcome {
                    job: job.clone(),
                    applied,
                }
            }
            None => {
                let job = EvaluationJob::from_report(report, Utc::now());
                inner.jobs.insert(job.job_id.clone(), job.clone());
                StoreOutcome { job, applied: true }
            }
        }
    }

    /// Record a freshly accepted submission.
    pub fn record_submission(
        &self,
        submitted: &SubmittedJob,
        request: &EvaluationRequest,
    ) -> EvaluationJob {
        let mut report = JobStatusReport::new(submitted.job_id.clone(), submitted.status);
        report.dataset_id = Some(request.dataset_id.clone());
        report.retrieval_method = Some(request.retrieval_method.as_str().to_string());
        report.k_values = Some(request.k_values.clone());
        report.created_at = submitted.created_at;
        self.apply_report(&report).job
    }

    pub fn get(&self, job_id: &str) -> Option<EvaluationJob> {
        self.lock().jobs.get(job_id).cloned()
    }

    /// Every tracked job, oldest first.
    pub fn jobs(&self) -> Vec<EvaluationJob> {
        let mut jobs: Vec<_> = self.lock().jobs.values().cloned().collect();
        jobs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.job_id.cmp(&b.job_id)));
        jobs
    }

    pub fn store_results(&self, results: EvaluationResults) {
        self.lock().results.insert(results.job_id.clone(), results);
    }

    pub fn results(&self, job_id: &str) -> Option<EvaluationResults> {
        self.lock().results.get(job_id).cloned()
    }

    /// Hand fetched results to the caller, removing them from the store.
    pub fn take_results(&self, job_id: &str) -> Option<EvaluationResults> {
        self.lock().results.remove(job_id)
    }

    /// Forget a job and its results.
    pub fn remove(&self, job_id: &str) -> Option<EvaluationJob> {
        let mut inner = self.lock();
        inner.results.remove(job_id);
        inner.jobs.remove(job_id)
    }

    pub fn len(&self) -> usize {
        self.lock().jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for JobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobStore").field("jobs", &self.len()).finish()
    }
}
