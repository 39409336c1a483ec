//! Backend event types and definitions
//!
//! Contains the closed [`BackendEvent`] union the parser produces, plus the
//! line classification and parse error types.

use thiserror::Error;

/// One retrieved document chunk attached to an answer.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRecord {
    pub content: String,
    /// Path or URI of the originating document, when the backend knows it
    pub source_path: Option<String>,
    pub page: Option<i64>,
    pub chunk_index: Option<i64>,
    pub relevance_score: f64,
}

/// Token counts reported on `done`, when the backend supplies them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReportedUsage {
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
    pub total_tokens: Option<u64>,
}

impl ReportedUsage {
    pub fn is_empty(&self) -> bool {
        self.prompt_tokens.is_none()
            && self.completion_tokens.is_none()
            && self.total_tokens.is_none()
    }
}

/// Typed events from the chat backend stream
#[derive(Debug, Clone, PartialEq)]
pub enum BackendEvent {
    /// Generated text fragment
    Token { content: String },
    /// Query classification result
    Classification {
        classification: String,
        is_relevant: Option<bool>,
    },
    /// Retrieved sources backing the answer
    Sources { sources: Vec<SourceRecord> },
    /// Generation finished
    Done { usage: ReportedUsage },
    /// Backend reported a failure
    Error { message: String },
    /// Tag outside the known set; kept so protocol additions never break the stream
    Unknown { tag: Option<String>, raw: String },
}

impl BackendEvent {
    /// Returns the event type name as a string for debugging purposes.
    pub fn event_type_name(&self) -> &'static str {
        match self {
            BackendEvent::Token { .. } => "token",
            BackendEvent::Classification { .. } => "classification",
            BackendEvent::Sources { .. } => "sources",
            BackendEvent::Done { .. } => "done",
            BackendEvent::Error { .. } => "error",
            BackendEvent::Unknown { .. } => "unknown",
        }
    }
}

/// Represents a classified stream line
#[derive(Debug, Clone, PartialEq)]
pub enum SseLine {
    /// Event name declaration (e.g., "event: token")
    Event(String),
    /// Data payload with the `data:` marker stripped
    Data(String),
    /// Empty line - event boundary
    Empty,
    /// Comment or keep-alive line (starts with ':')
    Comment(String),
    /// Any other field (`id:`, `retry:`, garbage)
    Other(String),
}

/// Errors for a single `data:` frame. Never fatal to the stream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SseParseError {
    /// Payload is not valid JSON
    #[error("Invalid JSON for event '{event_type}': {detail}")]
    InvalidJson { event_type: String, detail: String },
    /// Payload is JSON but lacks fields its tag requires
    #[error("Invalid payload for event '{event_type}': {detail}")]
    InvalidPayload { event_type: String, detail: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_name() {
        assert_eq!(
            BackendEvent::Token {
                content: String::new()
            }
            .event_type_name(),
            "token"
        );
        assert_eq!(
            BackendEvent::Done {
                usage: ReportedUsage::default()
            }
            .event_type_name(),
            "done"
        );
        assert_eq!(
            BackendEvent::Unknown {
                tag: Some("start".to_string()),
                raw: "{}".to_string()
            }
            .event_type_name(),
            "unknown"
        );
    }

    #[test]
    fn test_parse_error_display() {
        let err = SseParseError::InvalidJson {
            event_type: "token".to_string(),
            detail: "expected value".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid JSON for event 'token': expected value"
        );

        let err = SseParseError::InvalidPayload {
            event_type: "sources".to_string(),
            detail: "missing field `sources`".to_string(),
        };
        assert!(err.to_string().contains("Invalid payload"));
    }

    #[test]
    fn test_reported_usage_empty() {
        assert!(ReportedUsage::default().is_empty());
        let usage = ReportedUsage {
            total_tokens: Some(3),
            ..Default::default()
        };
        assert!(!usage.is_empty());
    }
}
