//! Canonical output events.
//!
//! The only event types a consumer depends on. They do not change when the
//! backend's own taxonomy does; [`Normalizer`] is the single place that maps
//! one onto the other.

mod normalizer;

pub use normalizer::{Classification, Normalizer};

use serde::{Deserialize, Serialize};

/// Stable output event, serialized with a camelCase `type` tag.
///
/// ```text
/// {"type":"textDelta","text":"Hi"}
/// {"type":"dataAnnotation","sources":[...],"num_sources":2}
/// {"type":"finish","reason":"stop","usage":{"promptTokens":0,"completionTokens":0,"totalTokens":0}}
/// {"type":"errorEvent","message":"..."}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum CanonicalEvent {
    /// Text to append to the message being generated
    TextDelta { text: String },
    /// Sources backing the answer
    DataAnnotation {
        sources: Vec<AnnotatedSource>,
        num_sources: usize,
    },
    /// Generation completed normally
    Finish { reason: FinishReason, usage: Usage },
    /// Stream ended with an error
    ErrorEvent { message: String },
}

impl CanonicalEvent {
    /// Whether this event ends the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CanonicalEvent::Finish { .. } | CanonicalEvent::ErrorEvent { .. }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FinishReason {
    Stop,
}

/// Token usage reported on finish. Zero when the backend does not report it.
///
/// `total_tokens` is the sum of the two components, or 0 when either is
/// missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

/// A source as presented to the UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedSource {
    pub title: String,
    pub url: String,
    pub content: String,
    pub relevance_score: f64,
    pub page: Option<i64>,
    pub chunk_index: Option<i64>,
}
