//! Throughput benchmarks for the chat stream decoding path.
//!
//! Measures decoder + parser (+ normalizer) over a recorded-style stream cut
//! into chunks of different sizes.
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ragbridge::canonical::Normalizer;
use ragbridge::sse::{EventParser, LineDecoder};

/// Build a stream of `tokens` token events, a sources event and a done event.
fn generate_stream(tokens: usize) -> Vec<u8> {
    let mut wire = String::new();
    wire.push_str("event: classification\ndata: {\"classification\": \"question\", \"is_relevant\": true}\n\n");
    for i in 0..tokens {
        wire.push_str(&format!(
            "event: token\ndata: {{\"content\": \"word{} \"}}\n\n",
            i
        ));
    }
    wire.push_str(
        "event: sources\ndata: {\"sources\": [{\"content\": \"RAG combines retrieval with generation.\", \
         \"metadata\": {\"source\": \"docs/rag.pdf\", \"page\": 3, \"chunk_index\": 7}, \
         \"relevance_score\": 0.91}], \"num_sources\": 1}\n\n",
    );
    wire.push_str("event: done\ndata: {\"total_tokens\": 512, \"processing_time_ms\": 830}\n\n");
    wire.into_bytes()
}

/// Benchmark line decoding and event parsing at several chunk sizes
fn bench_decode_and_parse(c: &mut Criterion) {
    let wire = generate_stream(500);
    let mut group = c.benchmark_group("decode_and_parse");
    group.throughput(Throughput::Bytes(wire.len() as u64));

    for chunk_size in [16, 256, 4096].iter() {
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}_byte_chunks", chunk_size)),
            &wire,
            |b, wire| {
                b.iter(|| {
                    let mut decoder = LineDecoder::new();
                    let mut parser = EventParser::new();
                    let mut events = 0usize;
                    for chunk in wire.chunks(*chunk_size) {
                        for line in decoder.push(black_box(chunk)) {
                            if parser.feed_line(&line).is_some() {
                                events += 1;
                            }
                        }
                    }
                    black_box(events)
                });
            },
        );
    }

    group.finish();
}

/// Benchmark the full path to canonical events
fn bench_normalize(c: &mut Criterion) {
    let mut group = c.benchmark_group("normalize");

    for tokens in [10, 100, 1000].iter() {
        let wire = generate_stream(*tokens);
        group.throughput(Throughput::Elements(*tokens as u64));

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}_tokens", tokens)),
            &wire,
            |b, wire| {
                b.iter(|| {
                    let mut decoder = LineDecoder::new();
                    let mut parser = EventParser::new();
                    let mut normalizer = Normalizer::new();
                    for line in decoder.push(black_box(wire)) {
                        if let Some(event) = parser.feed_line(&line) {
                            black_box(normalizer.push(event));
                        }
                    }
                    black_box(normalizer.accumulated_text().len())
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_decode_and_parse, bench_normalize);

criterion_main!(benches);
