//! Event-stream decoding for the chat backend
//!
//! Bytes arrive in arbitrary chunks and go through two stages:
//! - [`LineDecoder`] reassembles terminator-delimited lines across chunk
//!   boundaries (including split multi-byte characters and split `\r\n`)
//! - [`EventParser`] classifies each line and turns `data:` payloads into
//!   typed [`BackendEvent`]s
//!
//! Wire format:
//! - `data: <json>` - payload with a `type` discriminator
//! - `event: <name>` - optional name, used as the tag when the JSON has none
//! - Empty line - event boundary
//! - Lines starting with `:` - comments / keep-alives (ignored)
//!
//! # Module structure
//! - `decoder` - byte chunk to line reassembly
//! - `events` - BackendEvent, SourceRecord, SseLine, SseParseError
//! - `payloads` - internal payload deserialization structs
//! - `parser` - line classification and payload parsing

mod decoder;
mod events;
mod parser;
mod payloads;

pub use decoder::LineDecoder;
pub use events::{BackendEvent, ReportedUsage, SourceRecord, SseLine, SseParseError};
pub use parser::{parse_backend_event, parse_sse_line, EventParser};
