//! Pull-based canonical event stream.
//!
//! [`StreamPipe`] composes [`LineDecoder`] -> [`EventParser`] -> [`Normalizer`]
//! behind a single `next()` call. It reads one upstream chunk only when every
//! line from the previous chunk has been consumed, so a slow consumer holds at
//! most one chunk in memory.
//!
//! A consumer sees either a sequence ending in `finish`, or one ending in a
//! single `errorEvent`. The only silent end is a cancellation the consumer
//! asked for itself.

use bytes::Bytes;
use futures::Stream;
use futures_util::StreamExt;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::canonical::{CanonicalEvent, Normalizer};
use crate::error::StreamError;
use crate::sse::{EventParser, LineDecoder};
use crate::traits::{ByteStream, HttpError};

/// Cancels a [`StreamPipe`] from another task.
///
/// Cancellation interrupts a pending read, releases the upstream reader and
/// makes `next()` return `None`.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

enum ReadOutcome {
    Chunk(Bytes),
    Failed(HttpError),
    Eof,
    Idle(Duration),
    Cancelled,
}

/// Single-consumer canonical event producer over one upstream byte stream.
pub struct StreamPipe {
    /// `None` once the stream is closed, cancelled or finished
    upstream: Option<ByteStream>,
    decoder: LineDecoder,
    parser: EventParser,
    normalizer: Normalizer,
    /// Lines decoded from the last chunk and not yet parsed
    lines: VecDeque<String>,
    idle_timeout: Option<Duration>,
    /// Error to report on the first `next()` of a pipe that never opened
    pending_error: Option<StreamError>,
    cancel_tx: Arc<watch::Sender<bool>>,
    cancel_rx: watch::Receiver<bool>,
}

impl StreamPipe {
    pub fn new(upstream: ByteStream) -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            upstream: Some(upstream),
            decoder: LineDecoder::new(),
            parser: EventParser::new(),
            normalizer: Normalizer::new(),
            lines: VecDeque::new(),
            idle_timeout: None,
            pending_error: None,
            cancel_tx: Arc::new(tx),
            cancel_rx: rx,
        }
    }

    /// A pipe whose only output is one `errorEvent` for `error`.
    ///
    /// Lets callers that failed to open the upstream hand the consumer the
    /// same shape of stream as a connection that broke mid-way.
    pub fn failed(error: StreamError) -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            upstream: None,
            decoder: LineDecoder::new(),
            parser: EventParser::new(),
            normalizer: Normalizer::new(),
            lines: VecDeque::new(),
            idle_timeout: None,
            pending_error: Some(error),
            cancel_tx: Arc::new(tx),
            cancel_rx: rx,
        }
    }

    /// Convert a read stall longer than `timeout` into an `errorEvent`.
    /// `None` waits indefinitely.
    pub fn with_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            tx: self.cancel_tx.clone(),
        }
    }

    /// Cancel from the consuming side. The upstream reader is dropped before
    /// this returns.
    pub fn cancel(&mut self) {
        self.cancel_tx.send_replace(true);
        self.release();
    }

    /// Whether the upstream reader has been released.
    pub fn is_closed(&self) -> bool {
        self.upstream.is_none() && self.pending_error.is_none()
    }

    /// Per-turn state: accumulated text, message id, classification.
    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    /// Pull the next canonical event. `None` means the stream is over.
    pub async fn next(&mut self) -> Option<CanonicalEvent> {
        loop {
            if *self.cancel_rx.borrow() {
                self.release();
                return None;
            }

            if let Some(error) = self.pending_error.take() {
                return self.terminate(error);
            }

            while let Some(line) = self.lines.pop_front() {
                let Some(event) = self.parser.feed_line(&line) else {
                    continue;
                };
                if let Some(out) = self.normalizer.push(event) {
                    if self.normalizer.is_finished() {
                        self.release();
                    }
                    return Some(out);
                }
            }

            if self.upstream.is_none() {
                return None;
            }

            match self.read_chunk().await {
                ReadOutcome::Chunk(bytes) => {
                    let lines = self.decoder.push(&bytes);
                    self.lines.extend(lines);
                }
                ReadOutcome::Failed(err) => {
                    return self.terminate(StreamError::Network {
                        message: err.to_string(),
                    });
                }
                ReadOutcome::Eof => {
                    self.decoder.finish();
                    return self.terminate(StreamError::PrematureClose);
                }
                ReadOutcome::Idle(limit) => {
                    return self.terminate(StreamError::IdleTimeout {
                        duration_secs: limit.as_secs(),
                    });
                }
                ReadOutcome::Cancelled => {
                    tracing::debug!("Stream cancelled while awaiting upstream");
                    self.release();
                    return None;
                }
            }
        }
    }

    /// Adapt into a `futures::Stream`. Dropping the stream releases the reader.
    pub fn into_stream(self) -> impl Stream<Item = CanonicalEvent> + Send {
        futures::stream::unfold(self, |mut pipe| async move {
            pipe.next().await.map(|event| (event, pipe))
        })
    }

    /// Await exactly one upstream chunk, racing cancellation and the idle limit.
    async fn read_chunk(&mut self) -> ReadOutcome {
        let idle = self.idle_timeout;
        let cancel_rx = &mut self.cancel_rx;
        let Some(upstream) = self.upstream.as_mut() else {
            return ReadOutcome::Eof;
        };

        let read = async move {
            let item = match idle {
                Some(limit) => match tokio::time::timeout(limit, upstream.next()).await {
                    Ok(item) => item,
                    Err(_) => return ReadOutcome::Idle(limit),
                },
                None => upstream.next().await,
            };
            match item {
                Some(Ok(bytes)) => ReadOutcome::Chunk(bytes),
                Some(Err(err)) => ReadOutcome::Failed(err),
                None => ReadOutcome::Eof,
            }
        };

        tokio::select! {
            biased;
            _ = wait_cancelled(cancel_rx) => ReadOutcome::Cancelled,
            outcome = read => outcome,
        }
    }

    fn terminate(&mut self, error: StreamError) -> Option<CanonicalEvent> {
        tracing::warn!("[{}] {}", error.error_code(), error);
        self.release();
        self.normalizer.fail(error.user_message())
    }

    fn release(&mut self) {
        if self.upstream.take().is_some() {
            tracing::debug!("Released upstream reader");
        }
        self.lines.clear();
    }
}

impl std::fmt::Debug for StreamPipe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamPipe")
            .field("open", &self.upstream.is_some())
            .field("buffered_lines", &self.lines.len())
            .field("idle_timeout", &self.idle_timeout)
            .field("finished", &self.normalizer.is_finished())
            .finish()
    }
}

async fn wait_cancelled(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            // Sender gone: nobody can cancel any more
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock::{MockChunk, MockHttpClient, MockResponse};
    use crate::canonical::{FinishReason, Usage};
    use crate::traits::{Headers, HttpClient};

    const URL: &str = "http://agent/api/v1/chat/stream";

    async fn pipe_over(client: &MockHttpClient, chunks: Vec<MockChunk>) -> StreamPipe {
        client.set_response(URL, MockResponse::Stream(chunks));
        let upstream = client.post_stream(URL, "{}", &Headers::new()).await.unwrap();
        StreamPipe::new(upstream)
    }

    async fn drain(pipe: &mut StreamPipe) -> Vec<CanonicalEvent> {
        let mut out = Vec::new();
        while let Some(event) = pipe.next().await {
            out.push(event);
        }
        out
    }

    fn text(s: &str) -> CanonicalEvent {
        CanonicalEvent::TextDelta {
            text: s.to_string(),
        }
    }

    fn stop() -> CanonicalEvent {
        CanonicalEvent::Finish {
            reason: FinishReason::Stop,
            usage: Usage::default(),
        }
    }

    #[tokio::test]
    async fn test_two_chunks_every_split() {
        let wire: &[u8] = b"data: {\"type\":\"token\",\"content\":\"Hi\"}\n\ndata: {\"type\":\"done\"}\n\n";

        for cut in 0..=wire.len() {
            let client = MockHttpClient::new();
            let mut pipe = pipe_over(&client, vec![wire[..cut].into(), wire[cut..].into()]).await;
            assert_eq!(drain(&mut pipe).await, vec![text("Hi"), stop()], "cut at {}", cut);
            assert_eq!(client.open_streams(), 0);
        }
    }

    #[tokio::test]
    async fn test_malformed_frame_does_not_break_stream() {
        let client = MockHttpClient::new();
        let mut pipe = pipe_over(
            &client,
            vec![
                "data: {\"type\":\"token\",\"content\":\"a\"}\n\n".into(),
                "data: {\"type\":\"token\",\n\n".into(),
                "data: {\"type\":\"token\",\"content\":\"b\"}\n\ndata: {\"type\":\"done\"}\n\n".into(),
            ],
        )
        .await;

        assert_eq!(drain(&mut pipe).await, vec![text("a"), text("b"), stop()]);
        assert_eq!(pipe.normalizer().accumulated_text(), "ab");
    }

    #[tokio::test]
    async fn test_reads_one_chunk_at_a_time() {
        let client = MockHttpClient::new();
        let mut pipe = pipe_over(
            &client,
            vec![
                "data: {\"type\":\"token\",\"content\":\"a\"}\n".into(),
                "data: {\"type\":\"token\",\"content\":\"b\"}\n".into(),
                "data: {\"type\":\"done\"}\n".into(),
            ],
        )
        .await;

        assert_eq!(client.chunks_delivered(), 0);
        assert_eq!(pipe.next().await, Some(text("a")));
        assert_eq!(client.chunks_delivered(), 1);
        assert_eq!(pipe.next().await, Some(text("b")));
        assert_eq!(client.chunks_delivered(), 2);
    }

    #[tokio::test]
    async fn test_finish_releases_reader_and_ignores_trailing_data() {
        let client = MockHttpClient::new();
        let mut pipe = pipe_over(
            &client,
            vec![
                "data: {\"type\":\"done\"}\ndata: {\"type\":\"token\",\"content\":\"x\"}\n".into(),
                "data: {\"type\":\"token\",\"content\":\"y\"}\n".into(),
            ],
        )
        .await;

        assert_eq!(pipe.next().await, Some(stop()));
        assert!(pipe.is_closed());
        assert_eq!(client.open_streams(), 0);
        assert_eq!(pipe.next().await, None);
        assert_eq!(client.chunks_delivered(), 1);
    }

    #[tokio::test]
    async fn test_network_failure_yields_one_error() {
        let client = MockHttpClient::new();
        let mut pipe = pipe_over(
            &client,
            vec![
                "data: {\"type\":\"token\",\"content\":\"partial\"}\n".into(),
                MockChunk::Fail(HttpError::Io("connection reset".to_string())),
            ],
        )
        .await;

        let events = drain(&mut pipe).await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], text("partial"));
        match &events[1] {
            CanonicalEvent::ErrorEvent { message } => assert!(message.contains("connection reset")),
            other => panic!("Expected ErrorEvent, got {:?}", other),
        }
        assert_eq!(client.open_streams(), 0);
    }

    #[tokio::test]
    async fn test_backend_error_event_terminates() {
        let client = MockHttpClient::new();
        let mut pipe = pipe_over(
            &client,
            vec!["data: {\"type\":\"error\",\"error\":\"model offline\"}\n\ndata: {\"type\":\"done\"}\n".into()],
        )
        .await;

        assert_eq!(
            drain(&mut pipe).await,
            vec![CanonicalEvent::ErrorEvent {
                message: "model offline".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn test_close_without_done_is_reported() {
        let client = MockHttpClient::new();
        let mut pipe = pipe_over(
            &client,
            vec!["data: {\"type\":\"token\",\"content\":\"a\"}\n\ndata: {\"type\":\"done\"}".into()],
        )
        .await;

        let events = drain(&mut pipe).await;
        assert_eq!(events[0], text("a"));
        // The unterminated done line is discarded, so the close is premature
        assert!(matches!(events[1], CanonicalEvent::ErrorEvent { .. }));
        assert_eq!(events.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_timeout_becomes_error() {
        let client = MockHttpClient::new();
        client.set_response(
            URL,
            MockResponse::StreamThenStall(vec!["data: {\"type\":\"token\",\"content\":\"a\"}\n".into()]),
        );
        let upstream = client.post_stream(URL, "{}", &Headers::new()).await.unwrap();
        let mut pipe = StreamPipe::new(upstream).with_idle_timeout(Some(Duration::from_secs(30)));

        assert_eq!(pipe.next().await, Some(text("a")));
        match pipe.next().await {
            Some(CanonicalEvent::ErrorEvent { message }) => assert!(message.contains("30 seconds")),
            other => panic!("Expected idle ErrorEvent, got {:?}", other),
        }
        assert_eq!(pipe.next().await, None);
        assert_eq!(client.open_streams(), 0);
    }

    #[tokio::test]
    async fn test_cancel_handle_interrupts_pending_read() {
        let client = MockHttpClient::new();
        client.set_response(URL, MockResponse::StreamThenStall(vec![]));
        let upstream = client.post_stream(URL, "{}", &Headers::new()).await.unwrap();
        let mut pipe = StreamPipe::new(upstream);

        let handle = pipe.cancel_handle();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            handle.cancel();
        });

        assert_eq!(pipe.next().await, None);
        assert!(pipe.is_closed());
        assert_eq!(client.open_streams(), 0);
    }

    #[tokio::test]
    async fn test_cancel_releases_synchronously() {
        let client = MockHttpClient::new();
        let mut pipe = pipe_over(
            &client,
            vec!["data: {\"type\":\"token\",\"content\":\"a\"}\n".into()],
        )
        .await;

        assert_eq!(client.open_streams(), 1);
        pipe.cancel();
        assert_eq!(client.open_streams(), 0);
        assert_eq!(pipe.next().await, None);
    }

    #[tokio::test]
    async fn test_failed_pipe_yields_single_error() {
        let mut pipe = StreamPipe::failed(StreamError::Connect {
            message: "refused".to_string(),
        });
        assert!(!pipe.is_closed());
        match pipe.next().await {
            Some(CanonicalEvent::ErrorEvent { message }) => assert!(message.contains("refused")),
            other => panic!("Expected ErrorEvent, got {:?}", other),
        }
        assert_eq!(pipe.next().await, None);
        assert!(pipe.is_closed());
    }

    #[tokio::test]
    async fn test_into_stream() {
        let client = MockHttpClient::new();
        let pipe = pipe_over(
            &client,
            vec!["data: {\"type\":\"token\",\"content\":\"Hi\"}\n\ndata: {\"type\":\"done\"}\n\n".into()],
        )
        .await;

        let events: Vec<_> = pipe.into_stream().collect().await;
        assert_eq!(events, vec![text("Hi"), stop()]);
    }
}
