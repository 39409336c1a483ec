//! Done and error event parsers

use super::decode_payload;
use crate::sse::events::{BackendEvent, ReportedUsage, SseParseError};
use crate::sse::payloads::{DonePayload, ErrorPayload};

/// `done` carries no required fields; token counts pass through when present.
pub(super) fn parse_done_event(value: serde_json::Value) -> Result<BackendEvent, SseParseError> {
    let payload: DonePayload = decode_payload("done", value)?;
    Ok(BackendEvent::Done {
        usage: ReportedUsage {
            prompt_tokens: payload.prompt_tokens,
            completion_tokens: payload.completion_tokens,
            total_tokens: payload.total_tokens,
        },
    })
}

pub(super) fn parse_error_event(value: serde_json::Value) -> Result<BackendEvent, SseParseError> {
    let payload: ErrorPayload = decode_payload("error", value)?;
    Ok(BackendEvent::Error {
        message: payload.error,
    })
}

#[cfg(test)]
mod tests {
    use crate::sse::events::{BackendEvent, ReportedUsage};
    use crate::sse::parser::parse_backend_event;

    #[test]
    fn test_parse_bare_done() {
        let event = parse_backend_event(r#"{"type":"done"}"#, None).unwrap();
        assert_eq!(
            event,
            BackendEvent::Done {
                usage: ReportedUsage::default()
            }
        );
    }

    #[test]
    fn test_parse_done_with_usage() {
        let event = parse_backend_event(
            r#"{"type":"done","prompt_tokens":12,"completion_tokens":30,"total_tokens":42}"#,
            None,
        )
        .unwrap();
        assert_eq!(
            event,
            BackendEvent::Done {
                usage: ReportedUsage {
                    prompt_tokens: Some(12),
                    completion_tokens: Some(30),
                    total_tokens: Some(42),
                }
            }
        );
    }

    #[test]
    fn test_parse_error_event() {
        let event = parse_backend_event(r#"{"type":"error","error":"model offline"}"#, None);
        assert_eq!(
            event.unwrap(),
            BackendEvent::Error {
                message: "model offline".to_string()
            }
        );
    }

    #[test]
    fn test_error_without_message_is_rejected() {
        assert!(parse_backend_event(r#"{"type":"error"}"#, None).is_err());
    }
}
