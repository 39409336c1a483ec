//! Bridge configuration.
//!
//! Built with `with_*` methods or read from `RAGBRIDGE_*` environment
//! variables. Invalid values fall back to the default with a warning.

use std::time::Duration;

use crate::jobs::DEFAULT_POLL_INTERVAL;

/// Chat (agent) service used when nothing else is configured
pub const DEFAULT_AGENT_URL: &str = "http://localhost:8000";
/// Evaluation (tester) service used when nothing else is configured
pub const DEFAULT_TESTER_URL: &str = "http://localhost:8001";
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub const ENV_AGENT_URL: &str = "RAGBRIDGE_AGENT_URL";
pub const ENV_TESTER_URL: &str = "RAGBRIDGE_TESTER_URL";
pub const ENV_POLL_INTERVAL_MS: &str = "RAGBRIDGE_POLL_INTERVAL_MS";
pub const ENV_IDLE_TIMEOUT_SECS: &str = "RAGBRIDGE_IDLE_TIMEOUT_SECS";

/// Endpoints and timing for a [`BridgeContext`](crate::context::BridgeContext).
///
/// # Example
///
/// ```
/// use ragbridge::config::BridgeConfig;
/// use std::time::Duration;
///
/// let config = BridgeConfig::default()
///     .with_agent_url("http://rag.internal:8000")
///     .with_poll_interval(Duration::from_millis(500))
///     .with_idle_timeout(None);
/// assert!(config.idle_timeout.is_none());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeConfig {
    /// Base URL of the chat service
    pub agent_url: String,
    /// Base URL of the evaluation service
    pub tester_url: String,
    /// Time between job status fetches
    pub poll_interval: Duration,
    /// Longest wait for the next stream chunk; `None` waits forever
    pub idle_timeout: Option<Duration>,
    /// Bound on non-streaming requests
    pub request_timeout: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            agent_url: DEFAULT_AGENT_URL.to_string(),
            tester_url: DEFAULT_TESTER_URL.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            idle_timeout: Some(DEFAULT_IDLE_TIMEOUT),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl BridgeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_agent_url(mut self, url: impl Into<String>) -> Self {
        self.agent_url = trim_base_url(url.into());
        self
    }

    pub fn with_tester_url(mut self, url: impl Into<String>) -> Self {
        self.tester_url = trim_base_url(url.into());
        self
    }

    /// Set the poll interval. Zero is raised to one millisecond.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(Duration::from_millis(1));
        self
    }

    pub fn with_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Read overrides from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read overrides through `lookup`, starting from the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(url) = non_empty(lookup(ENV_AGENT_URL)) {
            config = config.with_agent_url(url);
        }
        if let Some(url) = non_empty(lookup(ENV_TESTER_URL)) {
            config = config.with_tester_url(url);
        }
        if let Some(raw) = non_empty(lookup(ENV_POLL_INTERVAL_MS)) {
            match raw.trim().parse::<u64>() {
                Ok(ms) => config = config.with_poll_interval(Duration::from_millis(ms)),
                Err(_) => tracing::warn!(
                    "Ignoring invalid {}={:?}, using {:?}",
                    ENV_POLL_INTERVAL_MS,
                    raw,
                    config.poll_interval
                ),
            }
        }
        if let Some(raw) = non_empty(lookup(ENV_IDLE_TIMEOUT_SECS)) {
            match raw.trim().parse::<u64>() {
                Ok(0) => config.idle_timeout = None,
                Ok(secs) => config.idle_timeout = Some(Duration::from_secs(secs)),
                Err(_) => tracing::warn!(
                    "Ignoring invalid {}={:?}, using {:?}",
                    ENV_IDLE_TIMEOUT_SECS,
                    raw,
                    config.idle_timeout
                ),
            }
        }

        config
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn trim_base_url(url: String) -> String {
    url.trim().trim_end_matches('/').to_string()
}
