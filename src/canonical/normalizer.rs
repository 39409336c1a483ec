//! Backend to canonical event translation.

use uuid::Uuid;

use super::{AnnotatedSource, CanonicalEvent, FinishReason, Usage};
use crate::sse::{BackendEvent, ReportedUsage, SourceRecord};

/// Last classification the backend reported for this turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub label: String,
    pub is_relevant: Option<bool>,
}

/// Stateful translator for one logical conversation turn.
///
/// Each backend event maps to at most one canonical event. After `finish`
/// or `errorEvent` has been produced the normalizer is spent: every further
/// input is dropped. Use a fresh instance per turn.
#[derive(Debug)]
pub struct Normalizer {
    accumulated_text: String,
    message_id: String,
    classification: Option<Classification>,
    sources_seen: usize,
    finished: bool,
}

impl Normalizer {
    pub fn new() -> Self {
        let id = Uuid::new_v4().simple().to_string();
        Self {
            accumulated_text: String::new(),
            message_id: format!("msg_{}", &id[..12]),
            classification: None,
            sources_seen: 0,
            finished: false,
        }
    }

    /// Translate one backend event.
    pub fn push(&mut self, event: BackendEvent) -> Option<CanonicalEvent> {
        if self.finished {
            tracing::trace!(
                "Dropping {} event after stream end",
                event.event_type_name()
            );
            return None;
        }

        match event {
            BackendEvent::Token { content } => {
                self.accumulated_text.push_str(&content);
                Some(CanonicalEvent::TextDelta { text: content })
            }
            BackendEvent::Classification {
                classification,
                is_relevant,
            } => {
                self.classification = Some(Classification {
                    label: classification,
                    is_relevant,
                });
                None
            }
            BackendEvent::Sources { sources } => {
                self.sources_seen += sources.len();
                let num_sources = sources.len();
                Some(CanonicalEvent::DataAnnotation {
                    sources: sources.into_iter().map(annotate).collect(),
                    num_sources,
                })
            }
            BackendEvent::Done { usage } => {
                self.finished = true;
                Some(CanonicalEvent::Finish {
                    reason: FinishReason::Stop,
                    usage: usage_from_report(usage),
                })
            }
            BackendEvent::Error { message } => {
                self.finished = true;
                Some(CanonicalEvent::ErrorEvent { message })
            }
            BackendEvent::Unknown { .. } => None,
        }
    }

    /// End the turn with an error raised outside the backend's own events.
    ///
    /// Returns `None` if the turn already ended, so a consumer never sees two
    /// terminal events.
    pub fn fail(&mut self, message: impl Into<String>) -> Option<CanonicalEvent> {
        if self.finished {
            return None;
        }
        self.finished = true;
        Some(CanonicalEvent::ErrorEvent {
            message: message.into(),
        })
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// All token text received so far, in arrival order.
    pub fn accumulated_text(&self) -> &str {
        &self.accumulated_text
    }

    /// Identifier generated for the message this turn produces.
    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    pub fn classification(&self) -> Option<&Classification> {
        self.classification.as_ref()
    }

    /// Total number of source records annotated this turn.
    pub fn sources_seen(&self) -> usize {
        self.sources_seen
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}

fn annotate(source: SourceRecord) -> AnnotatedSource {
    AnnotatedSource {
        title: source
            .source_path
            .clone()
            .unwrap_or_else(|| "Document".to_string()),
        url: source.source_path.unwrap_or_else(|| "#".to_string()),
        content: source.content,
        relevance_score: source.relevance_score,
        page: source.page,
        chunk_index: source.chunk_index,
    }
}

/// Only counts the backend actually sent are carried over; the rest stay 0.
///
/// `totalTokens` is kept only alongside both components, so it always equals
/// their sum. A bare `total_tokens` is a word count on some backends.
fn usage_from_report(report: ReportedUsage) -> Usage {
    let prompt_tokens = report.prompt_tokens.unwrap_or(0);
    let completion_tokens = report.completion_tokens.unwrap_or(0);
    let total_tokens = match (report.prompt_tokens, report.completion_tokens) {
        (Some(_), Some(_)) => prompt_tokens + completion_tokens,
        _ => {
            if let Some(total) = report.total_tokens {
                tracing::debug!("Ignoring total_tokens={} without its components", total);
            }
            0
        }
    };
    Usage {
        prompt_tokens,
        completion_tokens,
        total_tokens,
    }
}
