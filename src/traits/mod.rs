//! Trait seams for dependency injection.
//!
//! - [`HttpClient`] - HTTP operations (GET, POST, streaming POST)
//!
//! The job poller's seam, [`JobSource`](crate::jobs::JobSource), lives next to
//! the registry that drives it.

pub mod http;

pub use http::{ByteStream, Headers, HttpClient, HttpError, Response};
