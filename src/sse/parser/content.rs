//! Token and classification event parsers

use super::decode_payload;
use crate::sse::events::{BackendEvent, SseParseError};
use crate::sse::payloads::{ClassificationPayload, TokenPayload};

pub(super) fn parse_token_event(value: serde_json::Value) -> Result<BackendEvent, SseParseError> {
    let payload: TokenPayload = decode_payload("token", value)?;
    Ok(BackendEvent::Token {
        content: payload.content,
    })
}

pub(super) fn parse_classification_event(
    value: serde_json::Value,
) -> Result<BackendEvent, SseParseError> {
    let payload: ClassificationPayload = decode_payload("classification", value)?;
    Ok(BackendEvent::Classification {
        classification: payload.classification,
        is_relevant: payload.is_relevant,
    })
}
