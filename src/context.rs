//! Explicit owner of everything a bridge session needs.
//!
//! A [`BridgeContext`] holds the configuration, the backend client and the
//! job registry. Dropping it (or calling [`BridgeContext::shutdown`]) stops
//! every polling task it started.

use std::sync::Arc;
use tokio::sync::broadcast;

use crate::backend::{BackendClient, HealthStatus};
use crate::config::BridgeConfig;
use crate::error::BridgeResult;
use crate::jobs::{JobRegistry, JobSource, JobUpdate};
use crate::models::{ChatRequest, EvaluationJob, EvaluationRequest};
use crate::stream::StreamPipe;
use crate::traits::HttpClient;

pub struct BridgeContext {
    config: BridgeConfig,
    backend: BackendClient,
    registry: JobRegistry,
}

impl BridgeContext {
    /// Context talking to the configured services over reqwest.
    pub fn new(config: BridgeConfig) -> Self {
        let backend = BackendClient::from_config(&config);
        Self::with_backend(config, backend)
    }

    /// Context using a caller-supplied HTTP client.
    pub fn with_http_client(config: BridgeConfig, http: Arc<dyn HttpClient>) -> Self {
        let backend = BackendClient::new(http, &config.agent_url, &config.tester_url);
        Self::with_backend(config, backend)
    }

    fn with_backend(config: BridgeConfig, backend: BackendClient) -> Self {
        let source: Arc<dyn JobSource> = Arc::new(backend.clone());
        Self {
            config,
            backend,
            registry: JobRegistry::new(source),
        }
    }

    /// Context whose jobs are polled through `source` instead of the backend.
    pub fn with_job_source(
        config: BridgeConfig,
        http: Arc<dyn HttpClient>,
        source: Arc<dyn JobSource>,
    ) -> Self {
        let backend = BackendClient::new(http, &config.agent_url, &config.tester_url);
        Self {
            config,
            backend,
            registry: JobRegistry::new(source),
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn backend(&self) -> &BackendClient {
        &self.backend
    }

    pub fn jobs(&self) -> &JobRegistry {
        &self.registry
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobUpdate> {
        self.registry.subscribe()
    }

    /// Start a chat turn using the configured idle timeout.
    pub async fn chat(&self, request: &ChatRequest) -> StreamPipe {
        self.backend
            .stream_chat(request, self.config.idle_timeout)
            .await
    }

    /// Submit an evaluation, record it and start polling it.
    pub async fn submit_and_track(
        &self,
        mut request: EvaluationRequest,
    ) -> BridgeResult<EvaluationJob> {
        let submitted = self.backend.submit_evaluation(&mut request).await?;
        let job = self.registry.store().record_submission(&submitted, &request);
        self.registry
            .start_polling(&job.job_id, self.config.poll_interval);
        Ok(job)
    }

    /// Start polling an existing job at the configured interval.
    /// Returns `false` if it was already being polled.
    pub fn track(&self, job_id: &str) -> bool {
        self.registry.start_polling(job_id, self.config.poll_interval)
    }

    /// Poll `job_id` until its handle ends and return the final update.
    /// Stopping the job (or shutting down) ends the wait with `PollingStopped`.
    ///
    /// Returns `None` only if the registry's update channel closes.
    pub async fn track_until_settled(&self, job_id: &str) -> Option<JobUpdate> {
        let mut updates = self.registry.subscribe();
        self.track(job_id);

        loop {
            match updates.recv().await {
                Ok(update) if update.job_id() == job_id && update.is_final() => {
                    return Some(update)
                }
                Ok(JobUpdate::Status(job)) if job.job_id == job_id => {
                    tracing::info!(
                        "Job {} is {} ({:.0}%)",
                        job_id,
                        job.status,
                        job.progress.unwrap_or(0.0)
                    );
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!("Skipped {} job updates", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    pub async fn health_check(&self) -> HealthStatus {
        self.backend.health_check().await
    }

    /// Stop every polling task started through this context.
    pub fn shutdown(&self) {
        self.registry.stop_all_polling();
    }
}

impl std::fmt::Debug for BridgeContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeContext")
            .field("config", &self.config)
            .field("backend", &self.backend)
            .field("registry", &self.registry)
            .finish()
    }
}
