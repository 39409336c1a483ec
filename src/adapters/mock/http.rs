//! Mock HTTP client for testing.
//!
//! Returns predefined responses or scripted byte streams, records every
//! request, and tracks how many chunks each stream has handed out and
//! whether it has been released.

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use crate::traits::{ByteStream, Headers, HttpClient, HttpError, Response};

/// A recorded HTTP request for verification in tests.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// HTTP method (GET or POST)
    pub method: String,
    pub url: String,
    pub headers: Headers,
    /// Request body (for POST requests)
    pub body: Option<String>,
}

/// One scripted item of a streamed body.
#[derive(Debug, Clone)]
pub enum MockChunk {
    Data(Bytes),
    Fail(HttpError),
}

impl From<&str> for MockChunk {
    fn from(s: &str) -> Self {
        MockChunk::Data(Bytes::copy_from_slice(s.as_bytes()))
    }
}

impl From<&[u8]> for MockChunk {
    fn from(b: &[u8]) -> Self {
        MockChunk::Data(Bytes::copy_from_slice(b))
    }
}

/// Configuration for a mock response.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Return a successful response
    Success(Response),
    /// Return an error
    Error(HttpError),
    /// Stream the chunks, then close
    Stream(Vec<MockChunk>),
    /// Stream the chunks, then never yield again
    StreamThenStall(Vec<MockChunk>),
    /// Never answer the request
    Hang,
}

#[derive(Debug, Default)]
struct StreamCounters {
    delivered: AtomicUsize,
    open: AtomicUsize,
}

/// Mock HTTP client for testing.
///
/// # Example
///
/// ```ignore
/// use ragbridge::adapters::mock::{MockHttpClient, MockResponse};
///
/// let client = MockHttpClient::new();
/// client.set_response(
///     "http://agent/api/v1/chat/stream",
///     MockResponse::Stream(vec!["data: {\"type\":\"done\"}\n".into()]),
/// );
/// ```
#[derive(Debug, Clone)]
pub struct MockHttpClient {
    /// Configured responses by URL (exact first, then prefix)
    responses: Arc<Mutex<HashMap<String, MockResponse>>>,
    default_response: Arc<Mutex<Option<MockResponse>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    counters: Arc<StreamCounters>,
}

impl MockHttpClient {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(HashMap::new())),
            default_response: Arc::new(Mutex::new(None)),
            requests: Arc::new(Mutex::new(Vec::new())),
            counters: Arc::new(StreamCounters::default()),
        }
    }

    /// Set a response for a specific URL.
    pub fn set_response(&self, url: &str, response: MockResponse) {
        let mut responses = self.responses.lock().unwrap();
        responses.insert(url.to_string(), response);
    }

    /// Set a default response for URLs without specific matches.
    pub fn set_default_response(&self, response: MockResponse) {
        let mut default = self.default_response.lock().unwrap();
        *default = Some(response);
    }

    pub fn get_requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn clear_requests(&self) {
        self.requests.lock().unwrap().clear();
    }

    /// Total chunks (data or failure) handed out across all streams.
    pub fn chunks_delivered(&self) -> usize {
        self.counters.delivered.load(Ordering::SeqCst)
    }

    /// Streams created and not yet dropped.
    pub fn open_streams(&self) -> usize {
        self.counters.open.load(Ordering::SeqCst)
    }

    fn record_request(&self, method: &str, url: &str, headers: &Headers, body: Option<String>) {
        let mut requests = self.requests.lock().unwrap();
        requests.push(RecordedRequest {
            method: method.to_string(),
            url: url.to_string(),
            headers: headers.clone(),
            body,
        });
    }

    fn get_response(&self, url: &str) -> Option<MockResponse> {
        let responses = self.responses.lock().unwrap();

        if let Some(response) = responses.get(url) {
            return Some(response.clone());
        }

        // Longest prefix wins so "/evaluations/j1/results" beats "/evaluations/j1"
        let mut best: Option<(&String, &MockResponse)> = None;
        for (pattern, response) in responses.iter() {
            if url.starts_with(pattern.as_str())
                && best.map_or(true, |(p, _)| pattern.len() > p.len())
            {
                best = Some((pattern, response));
            }
        }
        if let Some((_, response)) = best {
            return Some(response.clone());
        }

        self.default_response.lock().unwrap().clone()
    }

    fn plain_response(&self, url: &str) -> Result<Response, HttpError> {
        match self.get_response(url) {
            Some(MockResponse::Success(response)) => Ok(response),
            Some(MockResponse::Error(err)) => Err(err),
            Some(MockResponse::Stream(_)) | Some(MockResponse::StreamThenStall(_)) => Err(
                HttpError::Other("Stream response on non-stream request".to_string()),
            ),
            Some(MockResponse::Hang) => Err(HttpError::Timeout(url.to_string())),
            None => Err(HttpError::Other(format!("No mock response for URL: {}", url))),
        }
    }
}

impl Default for MockHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Scripted body stream that reports deliveries and its own release.
struct ScriptedStream {
    chunks: std::vec::IntoIter<MockChunk>,
    stall_at_end: bool,
    counters: Arc<StreamCounters>,
}

impl ScriptedStream {
    fn new(chunks: Vec<MockChunk>, stall_at_end: bool, counters: Arc<StreamCounters>) -> Self {
        counters.open.fetch_add(1, Ordering::SeqCst);
        Self {
            chunks: chunks.into_iter(),
            stall_at_end,
            counters,
        }
    }
}

impl Stream for ScriptedStream {
    type Item = Result<Bytes, HttpError>;

    fn poll_next(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match self.chunks.next() {
            Some(chunk) => {
                self.counters.delivered.fetch_add(1, Ordering::SeqCst);
                Poll::Ready(Some(match chunk {
                    MockChunk::Data(bytes) => Ok(bytes),
                    MockChunk::Fail(err) => Err(err),
                }))
            }
            // Never woken again; only an outer timeout or cancel gets past this.
            None if self.stall_at_end => Poll::Pending,
            None => Poll::Ready(None),
        }
    }
}

impl Drop for ScriptedStream {
    fn drop(&mut self) {
        self.counters.open.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl HttpClient for MockHttpClient {
    async fn get(&self, url: &str, headers: &Headers) -> Result<Response, HttpError> {
        self.record_request("GET", url, headers, None);
        self.plain_response(url)
    }

    async fn post(&self, url: &str, body: &str, headers: &Headers) -> Result<Response, HttpError> {
        self.record_request("POST", url, headers, Some(body.to_string()));
        self.plain_response(url)
    }

    async fn post_stream(
        &self,
        url: &str,
        body: &str,
        headers: &Headers,
    ) -> Result<ByteStream, HttpError> {
        self.record_request("POST", url, headers, Some(body.to_string()));

        let (chunks, stall) = match self.get_response(url) {
            Some(MockResponse::Stream(chunks)) => (chunks, false),
            Some(MockResponse::StreamThenStall(chunks)) => (chunks, true),
            Some(MockResponse::Success(response)) if !response.is_success() => {
                return Err(HttpError::ServerError {
                    status: response.status,
                    message: response.text_lossy(),
                })
            }
            Some(MockResponse::Success(_)) => {
                return Err(HttpError::Other(
                    "Non-stream response on stream request".to_string(),
                ))
            }
            Some(MockResponse::Error(err)) => return Err(err),
            Some(MockResponse::Hang) => std::future::pending().await,
            None => return Err(HttpError::Other(format!("No mock response for URL: {}", url))),
        };

        Ok(Box::pin(ScriptedStream::new(
            chunks,
            stall,
            self.counters.clone(),
        )))
    }
}
