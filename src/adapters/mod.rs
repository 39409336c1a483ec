//! Concrete implementations of trait abstractions.
//!
//! - [`ReqwestHttpClient`] - HTTP client using reqwest
//!
//! The [`mock`] submodule provides test doubles:
//! - [`mock::MockHttpClient`] - Scripted HTTP responses and byte streams
//! - [`mock::MockJobSource`] - Scripted job status and results replies

pub mod mock;
pub mod reqwest_http;

pub use mock::{MockHttpClient, MockJobSource};
pub use reqwest_http::ReqwestHttpClient;
