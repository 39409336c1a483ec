//! Sources event parser

use super::decode_payload;
use crate::sse::events::{BackendEvent, SourceRecord, SseParseError};
use crate::sse::payloads::SourcesPayload;

pub(super) fn parse_sources_event(value: serde_json::Value) -> Result<BackendEvent, SseParseError> {
    let payload: SourcesPayload = decode_payload("sources", value)?;

    let sources = payload
        .sources
        .into_iter()
        .map(|s| SourceRecord {
            content: s.content,
            source_path: s.metadata.source.filter(|p| !p.is_empty()),
            page: s.metadata.page,
            chunk_index: s.metadata.chunk_index,
            relevance_score: s.relevance_score,
        })
        .collect();

    Ok(BackendEvent::Sources { sources })
}
