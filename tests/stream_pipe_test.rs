//! Stream pipe behavior through the public API with scripted byte streams.

use std::time::Duration;

use futures_util::StreamExt;
use ragbridge::adapters::mock::{MockChunk, MockHttpClient, MockResponse};
use ragbridge::canonical::{CanonicalEvent, FinishReason, Usage};
use ragbridge::stream::StreamPipe;
use ragbridge::traits::{Headers, HttpClient, HttpError};

const URL: &str = "http://agent/api/v1/chat/stream";

async fn open(client: &MockHttpClient, response: MockResponse) -> StreamPipe {
    client.set_response(URL, response);
    let upstream = client
        .post_stream(URL, "{}", &Headers::new())
        .await
        .expect("mock stream should open");
    StreamPipe::new(upstream)
}

async fn collect(pipe: StreamPipe) -> Vec<CanonicalEvent> {
    pipe.into_stream().collect().await
}

fn delta(text: &str) -> CanonicalEvent {
    CanonicalEvent::TextDelta {
        text: text.to_string(),
    }
}

#[tokio::test]
async fn test_three_way_splits_give_identical_output() {
    let wire: &[u8] = b"event: token\r\ndata: {\"content\": \"caf\xc3\xa9 \"}\r\n\r\n\
event: token\r\ndata: {\"content\": \"au lait\"}\r\n\r\n\
event: done\r\ndata: {\"prompt_tokens\": 4, \"completion_tokens\": 3, \"total_tokens\": 7}\r\n\r\n";

    let expected = vec![
        delta("café "),
        delta("au lait"),
        CanonicalEvent::Finish {
            reason: FinishReason::Stop,
            usage: Usage {
                prompt_tokens: 4,
                completion_tokens: 3,
                total_tokens: 7,
            },
        },
    ];

    // Every pair of cut points, stepping to keep the test quick
    for a in (0..wire.len()).step_by(3) {
        for b in (a..=wire.len()).step_by(7) {
            let client = MockHttpClient::new();
            let chunks: Vec<MockChunk> = vec![
                wire[..a].into(),
                wire[a..b].into(),
                wire[b..].into(),
            ];
            let pipe = open(&client, MockResponse::Stream(chunks)).await;
            assert_eq!(collect(pipe).await, expected, "cuts at {} and {}", a, b);
        }
    }
}

#[tokio::test]
async fn test_sources_annotation_defaults() {
    let client = MockHttpClient::new();
    let pipe = open(
        &client,
        MockResponse::Stream(vec![
            "data: {\"type\":\"sources\",\"sources\":[{\"content\":\"x\",\"relevance_score\":0.4}]}\n".into(),
            "data: {\"type\":\"done\"}\n".into(),
        ]),
    )
    .await;

    let events = collect(pipe).await;
    match &events[0] {
        CanonicalEvent::DataAnnotation {
            sources,
            num_sources,
        } => {
            assert_eq!(*num_sources, 1);
            assert_eq!(sources[0].title, "Document");
            assert_eq!(sources[0].url, "#");
        }
        other => panic!("Expected DataAnnotation, got {:?}", other),
    }
}

#[tokio::test]
async fn test_only_one_terminal_event() {
    let client = MockHttpClient::new();
    let pipe = open(
        &client,
        MockResponse::Stream(vec![
            "data: {\"type\":\"done\"}\n\ndata: {\"type\":\"done\"}\n\ndata: {\"type\":\"error\",\"error\":\"x\"}\n\n".into(),
        ]),
    )
    .await;

    let events = collect(pipe).await;
    assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
    assert_eq!(events.len(), 1);
}

#[tokio::test]
async fn test_mid_stream_failure() {
    let client = MockHttpClient::new();
    let pipe = open(
        &client,
        MockResponse::Stream(vec![
            "data: {\"type\":\"token\",\"content\":\"a\"}\n".into(),
            MockChunk::Fail(HttpError::Io("reset by peer".to_string())),
            "data: {\"type\":\"token\",\"content\":\"never\"}\n".into(),
        ]),
    )
    .await;

    let events = collect(pipe).await;
    assert_eq!(events.len(), 2);
    assert!(matches!(events[1], CanonicalEvent::ErrorEvent { .. }));
    assert_eq!(client.open_streams(), 0);
    assert_eq!(client.chunks_delivered(), 2);
}

#[tokio::test]
async fn test_dropping_stream_releases_reader() {
    let client = MockHttpClient::new();
    let pipe = open(
        &client,
        MockResponse::StreamThenStall(vec!["data: {\"type\":\"token\",\"content\":\"a\"}\n".into()]),
    )
    .await;

    let mut stream = Box::pin(pipe.into_stream());
    assert_eq!(stream.next().await, Some(delta("a")));
    assert_eq!(client.open_streams(), 1);
    drop(stream);
    assert_eq!(client.open_streams(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_idle_timeout_disabled_waits_for_cancel() {
    let client = MockHttpClient::new();
    let mut pipe = open(&client, MockResponse::StreamThenStall(vec![])).await;
    let handle = pipe.cancel_handle();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        handle.cancel();
    });

    assert_eq!(pipe.next().await, None);
    assert_eq!(client.open_streams(), 0);
}
