//! Line classification and payload parsing
//!
//! Contains the stateful [`EventParser`] that turns decoded lines into
//! [`BackendEvent`]s, and the stateless parsing functions behind it.

mod content;
mod sources;
mod terminal;

use crate::sse::events::{BackendEvent, SseLine, SseParseError};

use content::{parse_classification_event, parse_token_event};
use sources::parse_sources_event;
use terminal::{parse_done_event, parse_error_event};

/// Classify a single decoded line
pub fn parse_sse_line(line: &str) -> SseLine {
    if line.is_empty() {
        return SseLine::Empty;
    }

    if let Some(stripped) = line.strip_prefix(':') {
        return SseLine::Comment(stripped.trim().to_string());
    }

    if let Some(rest) = line.strip_prefix("data:") {
        return SseLine::Data(rest.trim().to_string());
    }

    if let Some(rest) = line.strip_prefix("event:") {
        return SseLine::Event(rest.trim().to_string());
    }

    SseLine::Other(line.to_string())
}

/// Parse a `data:` payload into a typed event.
///
/// The JSON `type` field selects the variant; `fallback_tag` (the preceding
/// `event:` name) is used only when `type` is absent. Tags outside the known
/// set yield [`BackendEvent::Unknown`] instead of an error.
pub fn parse_backend_event(
    data: &str,
    fallback_tag: Option<&str>,
) -> Result<BackendEvent, SseParseError> {
    let value: serde_json::Value =
        serde_json::from_str(data).map_err(|e| SseParseError::InvalidJson {
            event_type: fallback_tag.unwrap_or("data").to_string(),
            detail: e.to_string(),
        })?;

    let tag = value
        .get("type")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .or_else(|| fallback_tag.map(str::to_string));

    match tag.as_deref() {
        Some("token") => parse_token_event(value),
        Some("classification") => parse_classification_event(value),
        Some("sources") => parse_sources_event(value),
        Some("done") => parse_done_event(value),
        Some("error") => parse_error_event(value),
        _ => Ok(BackendEvent::Unknown {
            tag,
            raw: data.to_string(),
        }),
    }
}

/// Deserialize a payload struct, tagging failures with the event name.
pub(super) fn decode_payload<T: serde::de::DeserializeOwned>(
    event_type: &str,
    value: serde_json::Value,
) -> Result<T, SseParseError> {
    serde_json::from_value(value).map_err(|e| SseParseError::InvalidPayload {
        event_type: event_type.to_string(),
        detail: e.to_string(),
    })
}

/// Stateful line parser.
///
/// Yields at most one event per line. Blank, comment and unrecognized lines
/// yield nothing; a malformed `data:` line is logged and skipped without
/// affecting the lines around it.
#[derive(Debug, Default)]
pub struct EventParser {
    /// Name from the last `event:` line, cleared at the next blank line
    event_name: Option<String>,
    /// Frames dropped because they failed to parse
    dropped: usize,
}

impl EventParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one line, returning the event it carries, if any.
    pub fn feed_line(&mut self, line: &str) -> Option<BackendEvent> {
        match parse_sse_line(line) {
            SseLine::Data(data) => {
                match parse_backend_event(&data, self.event_name.as_deref()) {
                    Ok(event) => {
                        if let BackendEvent::Unknown { tag, .. } = &event {
                            tracing::debug!("Unrecognized stream event tag: {:?}", tag);
                        }
                        Some(event)
                    }
                    Err(e) => {
                        self.dropped += 1;
                        tracing::warn!("Dropping malformed stream frame: {}", e);
                        None
                    }
                }
            }
            SseLine::Event(name) => {
                self.event_name = Some(name);
                None
            }
            SseLine::Empty => {
                self.event_name = None;
                None
            }
            SseLine::Comment(_) => None,
            SseLine::Other(line) => {
                tracing::trace!("Ignoring stream line: {}", line);
                None
            }
        }
    }

    /// Number of malformed frames skipped so far.
    pub fn dropped_frames(&self) -> usize {
        self.dropped
    }

    pub fn reset(&mut self) {
        self.event_name = None;
        self.dropped = 0;
    }
}
