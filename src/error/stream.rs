//! Stream-terminal error types.
//!
//! Every variant here ends the current stream. The pipe renders it into a
//! single `errorEvent` via [`StreamError::user_message`].

use thiserror::Error;

/// Errors that terminate a canonical event stream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    /// Reading the upstream body failed.
    #[error("Stream connection lost: {message}")]
    Network { message: String },

    /// The request opening the stream was rejected or never connected.
    #[error("Failed to open stream: {message}")]
    Connect { message: String },

    /// No bytes arrived within the configured idle window.
    #[error("Stream idle for {duration_secs} seconds")]
    IdleTimeout { duration_secs: u64 },

    /// Upstream closed without sending `done` or `error`.
    #[error("Stream closed before completion")]
    PrematureClose,

    /// The consumer cancelled the stream.
    #[error("Stream cancelled")]
    Cancelled,
}

impl StreamError {
    /// Check if reissuing the request could reasonably succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StreamError::Network { .. }
                | StreamError::Connect { .. }
                | StreamError::IdleTimeout { .. }
                | StreamError::PrematureClose
        )
    }

    /// Message carried by the `errorEvent` the consumer sees.
    pub fn user_message(&self) -> String {
        match self {
            StreamError::Network { message } => {
                format!("Connection to the server was lost: {}", message)
            }
            StreamError::Connect { message } => {
                format!("Could not start the response stream: {}", message)
            }
            StreamError::IdleTimeout { duration_secs } => format!(
                "No response from server for {} seconds. The connection may have been lost.",
                duration_secs
            ),
            StreamError::PrematureClose => {
                "The server closed the response stream before it finished.".to_string()
            }
            StreamError::Cancelled => "The response stream was cancelled.".to_string(),
        }
    }

    /// Short error code for logging.
    pub fn error_code(&self) -> &'static str {
        match self {
            StreamError::Network { .. } => "E_STREAM_CONN",
            StreamError::Connect { .. } => "E_STREAM_OPEN",
            StreamError::IdleTimeout { .. } => "E_STREAM_TIMEOUT",
            StreamError::PrematureClose => "E_STREAM_CLOSED",
            StreamError::Cancelled => "E_STREAM_CANCELLED",
        }
    }
}
