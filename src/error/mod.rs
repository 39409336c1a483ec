//! Error types for the bridge.
//!
//! Errors are split by where they surface:
//!
//! | Type | Raised by | Policy |
//! |------|-----------|--------|
//! | [`SseParseError`](crate::sse::SseParseError) | single `data:` frame | dropped and logged, stream continues |
//! | [`StreamError`] | upstream read, stall, early close | surfaced once as `errorEvent`, reader released |
//! | [`JobFetchError`] | one polling tick | polling for that job stops, job state untouched |
//! | [`BridgeError`] | direct client / context calls | returned to the caller |
//!
//! A duplicate `start_polling` is not an error at all; the registry ignores it.

mod bridge_error;
mod job;
mod stream;

pub use bridge_error::{BridgeError, BridgeResult};
pub use job::JobFetchError;
pub use stream::StreamError;
