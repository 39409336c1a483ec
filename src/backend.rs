//! Client for the chat and evaluation services.
//!
//! All network access goes through the [`HttpClient`] seam so the same code
//! runs against `reqwest` in production and the mock in tests.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::adapters::ReqwestHttpClient;
use crate::config::BridgeConfig;
use crate::error::{BridgeError, BridgeResult, JobFetchError, StreamError};
use crate::jobs::JobSource;
use crate::models::{
    ChatRequest, EvaluationRequest, EvaluationResults, JobStatusReport, SubmittedJob,
};
use crate::stream::StreamPipe;
use crate::traits::{ByteStream, Headers, HttpClient, HttpError};

/// Chat streaming route on the agent service
pub const CHAT_STREAM_PATH: &str = "/api/v1/chat/stream";
/// Evaluation routes on the tester service
pub const EVALUATIONS_PATH: &str = "/evaluations";
pub const HEALTH_PATH: &str = "/health";

/// Reachability of both services
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthStatus {
    pub agent: bool,
    pub tester: bool,
}

impl HealthStatus {
    pub fn all_healthy(&self) -> bool {
        self.agent && self.tester
    }
}

/// Typed calls against the chat (agent) and evaluation (tester) services.
#[derive(Clone)]
pub struct BackendClient {
    http: Arc<dyn HttpClient>,
    agent_url: String,
    tester_url: String,
}

impl BackendClient {
    pub fn new(
        http: Arc<dyn HttpClient>,
        agent_url: impl Into<String>,
        tester_url: impl Into<String>,
    ) -> Self {
        Self {
            http,
            agent_url: agent_url.into().trim_end_matches('/').to_string(),
            tester_url: tester_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Production client using reqwest, bounded by the configured request timeout.
    pub fn from_config(config: &BridgeConfig) -> Self {
        let http = ReqwestHttpClient::new().with_request_timeout(config.request_timeout);
        Self::new(Arc::new(http), &config.agent_url, &config.tester_url)
    }

    pub fn agent_url(&self) -> &str {
        &self.agent_url
    }

    pub fn tester_url(&self) -> &str {
        &self.tester_url
    }

    fn json_headers() -> Headers {
        let mut headers = Headers::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        headers.insert("Accept".to_string(), "application/json".to_string());
        headers
    }

    fn job_url(&self, job_id: &str) -> String {
        format!(
            "{}{}/{}",
            self.tester_url,
            EVALUATIONS_PATH,
            urlencoding::encode(job_id)
        )
    }

    /// Open the raw chat event stream.
    pub async fn open_chat_stream(&self, request: &ChatRequest) -> BridgeResult<ByteStream> {
        let url = format!("{}{}", self.agent_url, CHAT_STREAM_PATH);
        let body = serde_json::to_string(request)?;

        let mut headers = Headers::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        headers.insert("Accept".to_string(), "text/event-stream".to_string());

        tracing::debug!("Opening chat stream at {}", url);
        let upstream = self.http.post_stream(&url, &body, &headers).await?;
        Ok(upstream)
    }

    /// Open a chat turn as a canonical event stream.
    ///
    /// Never fails: if the stream cannot be opened, the returned pipe yields a
    /// single `errorEvent` describing why. `idle_timeout` also bounds the wait
    /// for the response headers.
    pub async fn stream_chat(
        &self,
        request: &ChatRequest,
        idle_timeout: Option<Duration>,
    ) -> StreamPipe {
        let opened = match idle_timeout {
            Some(limit) => {
                match tokio::time::timeout(limit, self.open_chat_stream(request)).await {
                    Ok(opened) => opened,
                    Err(_) => {
                        tracing::warn!("Chat stream did not open within {:?}", limit);
                        return StreamPipe::failed(StreamError::IdleTimeout {
                            duration_secs: limit.as_secs(),
                        });
                    }
                }
            }
            None => self.open_chat_stream(request).await,
        };

        match opened {
            Ok(upstream) => StreamPipe::new(upstream).with_idle_timeout(idle_timeout),
            Err(err) => {
                tracing::warn!("Could not open chat stream: {}", err);
                StreamPipe::failed(StreamError::Connect {
                    message: open_failure_message(&err),
                })
            }
        }
    }

    /// Validate and submit an evaluation. Returns the accepted job.
    pub async fn submit_evaluation(
        &self,
        request: &mut EvaluationRequest,
    ) -> BridgeResult<SubmittedJob> {
        request.validate().map_err(BridgeError::InvalidRequest)?;

        let url = format!("{}{}", self.tester_url, EVALUATIONS_PATH);
        let body = serde_json::to_string(&*request)?;
        let response = self
            .http
            .post(&url, &body, &Self::json_headers())
            .await?
            .error_for_status()?;

        let submitted: SubmittedJob = response.json()?;
        tracing::info!(
            "Submitted evaluation {} for dataset {} ({})",
            submitted.job_id,
            request.dataset_id,
            request.retrieval_method.as_str()
        );
        Ok(submitted)
    }

    pub async fn fetch_job_status(&self, job_id: &str) -> Result<JobStatusReport, JobFetchError> {
        let response = self
            .http
            .get(&self.job_url(job_id), &Self::json_headers())
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| JobFetchError::from_http(job_id, e))?;

        response.json().map_err(|e| JobFetchError::Decode {
            job_id: job_id.to_string(),
            message: e.to_string(),
        })
    }

    pub async fn fetch_job_results(
        &self,
        job_id: &str,
    ) -> Result<EvaluationResults, JobFetchError> {
        let url = format!("{}/results", self.job_url(job_id));
        let response = self
            .http
            .get(&url, &Self::json_headers())
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| JobFetchError::from_http(job_id, e))?;

        response.json().map_err(|e| JobFetchError::Decode {
            job_id: job_id.to_string(),
            message: e.to_string(),
        })
    }

    /// Probe `GET /health` on both services. Any 2xx counts as healthy.
    pub async fn health_check(&self) -> HealthStatus {
        let (agent, tester) = tokio::join!(
            self.probe(&self.agent_url),
            self.probe(&self.tester_url)
        );
        HealthStatus { agent, tester }
    }

    async fn probe(&self, base_url: &str) -> bool {
        let url = format!("{}{}", base_url, HEALTH_PATH);
        match self.http.get(&url, &Headers::new()).await {
            Ok(response) => response.is_success(),
            Err(err) => {
                tracing::debug!("Health check {} failed: {}", url, err);
                false
            }
        }
    }
}

impl std::fmt::Debug for BackendClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendClient")
            .field("agent_url", &self.agent_url)
            .field("tester_url", &self.tester_url)
            .finish()
    }
}

#[async_trait]
impl JobSource for BackendClient {
    async fn fetch_status(&self, job_id: &str) -> Result<JobStatusReport, JobFetchError> {
        self.fetch_job_status(job_id).await
    }

    async fn fetch_results(&self, job_id: &str) -> Result<EvaluationResults, JobFetchError> {
        self.fetch_job_results(job_id).await
    }
}

fn open_failure_message(err: &BridgeError) -> String {
    match err {
        BridgeError::Http(HttpError::ServerError { status, message }) if message.is_empty() => {
            format!("server returned {}", status)
        }
        BridgeError::Http(HttpError::ServerError { status, message }) => {
            format!("server returned {}: {}", status, message)
        }
        other => other.to_string(),
    }
}
