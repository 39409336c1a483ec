use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{deserialize_id, deserialize_optional_timestamp, deserialize_timestamp};

/// k values evaluated when the caller does not choose any
pub const DEFAULT_K_VALUES: [u32; 4] = [1, 3, 5, 10];

/// Most k values a single evaluation accepts
pub const MAX_K_VALUES: usize = 20;

/// Retrieval strategy under evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RetrievalMethod {
    #[default]
    Basic,
    MultiQuery,
    Hybrid,
}

impl RetrievalMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetrievalMethod::Basic => "basic",
            RetrievalMethod::MultiQuery => "multi-query",
            RetrievalMethod::Hybrid => "hybrid",
        }
    }
}

impl std::str::FromStr for RetrievalMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "basic" => Ok(RetrievalMethod::Basic),
            "multi-query" => Ok(RetrievalMethod::MultiQuery),
            "hybrid" => Ok(RetrievalMethod::Hybrid),
            other => Err(format!(
                "unknown retrieval method '{}' (expected basic, multi-query or hybrid)",
                other
            )),
        }
    }
}

/// Request body for starting an evaluation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRequest {
    pub dataset_id: String,
    #[serde(default)]
    pub retrieval_method: RetrievalMethod,
    pub k_values: Vec<u32>,
}

impl EvaluationRequest {
    pub fn new(dataset_id: impl Into<String>) -> Self {
        Self {
            dataset_id: dataset_id.into(),
            retrieval_method: RetrievalMethod::default(),
            k_values: DEFAULT_K_VALUES.to_vec(),
        }
    }

    pub fn with_method(mut self, method: RetrievalMethod) -> Self {
        self.retrieval_method = method;
        self
    }

    pub fn with_k_values(mut self, k_values: Vec<u32>) -> Self {
        self.k_values = k_values;
        self
    }

    /// Check the request and normalize `k_values` to a sorted, deduplicated list.
    pub fn validate(&mut self) -> Result<(), String> {
        if self.dataset_id.trim().is_empty() {
            return Err("dataset_id must not be empty".to_string());
        }
        if self.k_values.is_empty() {
            return Err("At least one k value required".to_string());
        }
        if self.k_values.iter().any(|&k| k == 0) {
            return Err("k values must be positive integers".to_string());
        }
        if self.k_values.len() > MAX_K_VALUES {
            return Err(format!("Maximum {} k values allowed", MAX_K_VALUES));
        }
        self.k_values.sort_unstable();
        self.k_values.dedup();
        Ok(())
    }
}

/// Lifecycle of a remote evaluation job.
///
/// `queued -> running -> {completed | failed}`. Terminal states accept no
/// further transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    fn rank(&self) -> u8 {
        match self {
            JobStatus::Queued => 0,
            JobStatus::Running => 1,
            JobStatus::Completed | JobStatus::Failed => 2,
        }
    }

    /// Whether a record in `self` may move to `next`.
    ///
    /// Repeating a non-terminal state is allowed so progress can be refreshed;
    /// skipping `running` is allowed because fast jobs may never be seen in it.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        next.rank() >= self.rank()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Acknowledgement returned when an evaluation is accepted
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SubmittedJob {
    #[serde(deserialize_with = "deserialize_id")]
    pub job_id: String,
    pub status: JobStatus,
    #[serde(default, deserialize_with = "deserialize_optional_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

/// One status poll result.
///
/// Only `job_id` and `status` are required; everything else the status
/// endpoint may or may not include.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct JobStatusReport {
    #[serde(deserialize_with = "deserialize_id")]
    pub job_id: String,
    pub status: JobStatus,
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub dataset_id: Option<String>,
    #[serde(default)]
    pub retrieval_method: Option<String>,
    #[serde(default)]
    pub k_values: Option<Vec<u32>>,
    #[serde(default, deserialize_with = "deserialize_optional_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "deserialize_optional_timestamp")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "deserialize_optional_timestamp")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl JobStatusReport {
    pub fn new(job_id: impl Into<String>, status: JobStatus) -> Self {
        Self {
            job_id: job_id.into(),
            status,
            progress: None,
            error: None,
            dataset_id: None,
            retrieval_method: None,
            k_values: None,
            created_at: None,
            started_at: None,
            completed_at: None,
        }
    }

    pub fn with_progress(mut self, progress: f64) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Locally tracked view of an evaluation job
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationJob {
    pub job_id: String,
    pub dataset_id: String,
    pub retrieval_method: String,
    pub k_values: Vec<u32>,
    pub status: JobStatus,
    /// Percent complete, 0..=100
    pub progress: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl EvaluationJob {
    /// Build a record from the first status seen for a job.
    ///
    /// `created_at` falls back to `observed_at` when the report omits it.
    pub fn from_report(report: &JobStatusReport, observed_at: DateTime<Utc>) -> Self {
        Self {
            job_id: report.job_id.clone(),
            dataset_id: report.dataset_id.clone().unwrap_or_default(),
            retrieval_method: report
                .retrieval_method
                .clone()
                .unwrap_or_else(|| RetrievalMethod::default().as_str().to_string()),
            k_values: report.k_values.clone().unwrap_or_default(),
            status: report.status,
            progress: report.progress.map(clamp_progress),
            created_at: report.created_at.unwrap_or(observed_at),
            started_at: report.started_at,
            completed_at: report.completed_at,
            error: report.error.clone(),
        }
    }

    /// Fold a later report into this record.
    ///
    /// Returns `false`, leaving the record untouched, when the report's
    /// status would move the job backwards or out of a terminal state.
    pub fn apply(&mut self, report: &JobStatusReport) -> bool {
        if !self.status.can_transition_to(report.status) {
            return false;
        }
        self.status = report.status;
        if let Some(progress) = report.progress {
            self.progress = Some(clamp_progress(progress));
        }
        if report.error.is_some() {
            self.error = report.error.clone();
        }
        if let Some(dataset_id) = &report.dataset_id {
            self.dataset_id = dataset_id.clone();
        }
        if let Some(method) = &report.retrieval_method {
            self.retrieval_method = method.clone();
        }
        if let Some(k_values) = &report.k_values {
            self.k_values = k_values.clone();
        }
        self.started_at = report.started_at.or(self.started_at);
        self.completed_at = report.completed_at.or(self.completed_at);
        true
    }
}

fn clamp_progress(progress: f64) -> f64 {
    if progress.is_nan() {
        0.0
    } else {
        progress.clamp(0.0, 100.0)
    }
}

/// Metric value per k
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MetricsAtK {
    pub values: BTreeMap<u32, f64>,
}

impl MetricsAtK {
    pub fn get(&self, k: u32) -> Option<f64> {
        self.values.get(&k).copied()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateMetrics {
    pub ndcg: MetricsAtK,
    pub map: MetricsAtK,
    pub mrr: MetricsAtK,
    pub total_queries: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerQueryMetrics {
    pub query: String,
    pub ndcg: BTreeMap<u32, f64>,
    pub map: BTreeMap<u32, f64>,
    pub mrr: BTreeMap<u32, f64>,
    #[serde(default)]
    pub retrieved_docs: Vec<String>,
    #[serde(default)]
    pub expected_docs: Vec<String>,
}

/// Final output of a completed evaluation job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResults {
    #[serde(deserialize_with = "deserialize_id")]
    pub job_id: String,
    pub dataset_id: String,
    #[serde(default)]
    pub dataset_name: String,
    pub retrieval_method: String,
    pub k_values: Vec<u32>,
    pub aggregate_metrics: AggregateMetrics,
    #[serde(default)]
    pub per_query_metrics: Vec<PerQueryMetrics>,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub completed_at: DateTime<Utc>,
    #[serde(default)]
    pub duration_seconds: Option<f64>,
}
