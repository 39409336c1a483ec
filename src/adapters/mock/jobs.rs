//! Scripted job source for testing the poller without an evaluation service.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::JobFetchError;
use crate::jobs::JobSource;
use crate::models::{
    AggregateMetrics, EvaluationResults, JobStatus, JobStatusReport, MetricsAtK,
};

/// A call made against the mock, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceCall {
    Status(String),
    Results(String),
}

#[derive(Default)]
struct MockJobState {
    /// Scripted status replies; the last one repeats
    statuses: HashMap<String, VecDeque<Result<JobStatusReport, JobFetchError>>>,
    results: HashMap<String, Result<EvaluationResults, JobFetchError>>,
    calls: Vec<SourceCall>,
    delay: Option<Duration>,
}

/// Job source returning scripted replies and recording every call.
#[derive(Clone, Default)]
pub struct MockJobSource {
    state: Arc<Mutex<MockJobState>>,
}

impl MockJobSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script successive statuses for a job.
    pub fn script_statuses(&self, job_id: &str, statuses: &[JobStatus]) {
        let replies = statuses
            .iter()
            .map(|status| Ok(JobStatusReport::new(job_id, *status)))
            .collect();
        self.state
            .lock()
            .unwrap()
            .statuses
            .insert(job_id.to_string(), replies);
    }

    /// Append one raw reply (report or error) to a job's script.
    pub fn push_status(&self, job_id: &str, reply: Result<JobStatusReport, JobFetchError>) {
        self.state
            .lock()
            .unwrap()
            .statuses
            .entry(job_id.to_string())
            .or_default()
            .push_back(reply);
    }

    pub fn set_results(&self, job_id: &str, reply: Result<EvaluationResults, JobFetchError>) {
        self.state
            .lock()
            .unwrap()
            .results
            .insert(job_id.to_string(), reply);
    }

    /// Delay every reply, to exercise calls in flight.
    pub fn set_delay(&self, delay: Duration) {
        self.state.lock().unwrap().delay = Some(delay);
    }

    pub fn calls(&self) -> Vec<SourceCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn status_calls(&self, job_id: &str) -> usize {
        self.count(|call| matches!(call, SourceCall::Status(id) if id == job_id))
    }

    pub fn results_calls(&self, job_id: &str) -> usize {
        self.count(|call| matches!(call, SourceCall::Results(id) if id == job_id))
    }

    fn count(&self, pred: impl Fn(&SourceCall) -> bool) -> usize {
        self.state.lock().unwrap().calls.iter().filter(|c| pred(c)).count()
    }

    fn record(&self, call: SourceCall) -> Option<Duration> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call);
        state.delay
    }
}

#[async_trait]
impl JobSource for MockJobSource {
    async fn fetch_status(&self, job_id: &str) -> Result<JobStatusReport, JobFetchError> {
        if let Some(delay) = self.record(SourceCall::Status(job_id.to_string())) {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.state.lock().unwrap();
        let reply = state.statuses.get_mut(job_id).and_then(|queue| {
            if queue.len() > 1 {
                queue.pop_front()
            } else {
                queue.front().cloned()
            }
        });
        reply.unwrap_or_else(|| {
            Err(JobFetchError::Transport {
                job_id: job_id.to_string(),
                message: "no status scripted".to_string(),
            })
        })
    }

    async fn fetch_results(&self, job_id: &str) -> Result<EvaluationResults, JobFetchError> {
        if let Some(delay) = self.record(SourceCall::Results(job_id.to_string())) {
            tokio::time::sleep(delay).await;
        }
        let state = self.state.lock().unwrap();
        state
            .results
            .get(job_id)
            .cloned()
            .unwrap_or_else(|| Ok(sample_results(job_id)))
    }
}

/// Minimal results payload for a job.
pub fn sample_results(job_id: &str) -> EvaluationResults {
    let at_k = |v: f64| MetricsAtK {
        values: BTreeMap::from([(1, v), (3, v)]),
    };
    EvaluationResults {
        job_id: job_id.to_string(),
        dataset_id: "dataset-1".to_string(),
        dataset_name: "Sample".to_string(),
        retrieval_method: "basic".to_string(),
        k_values: vec![1, 3],
        aggregate_metrics: AggregateMetrics {
            ndcg: at_k(0.8),
            map: at_k(0.7),
            mrr: at_k(0.9),
            total_queries: 1,
        },
        per_query_metrics: Vec::new(),
        created_at: Utc::now(),
        completed_at: Utc::now(),
        duration_seconds: Some(1.5),
    }
}
