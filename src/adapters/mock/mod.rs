//! Mock implementations for testing.
//!
//! Enables unit testing of the stream pipe, the backend client and the job
//! poller without network access.

pub mod http;
pub mod jobs;

pub use http::{MockChunk, MockHttpClient, MockResponse, RecordedRequest};
pub use jobs::{sample_results, MockJobSource, SourceCall};
