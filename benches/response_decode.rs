//! Response decoding benchmarks
//!
//! Measures the per-response work on the client side:
//! - Response head parsing (whole and byte-at-a-time)
//! - Chunked body decoding
//! - JSON decoding of typical replies
//!
//! Run with: cargo bench --bench response_decode

use connectivity::http::chunked::ChunkedDecoder;
use connectivity::http::ResponseParser;
use connectivity::{JsonCodec, SerdeJson};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde::Deserialize;

const HEAD: &[u8] = b"HTTP/1.1 200 OK\r\n\
    Date: Sat, 17 Oct 2026 09:12:44 GMT\r\n\
    Server: gateway/1.4\r\n\
    Content-Type: application/json; charset=utf-8\r\n\
    Content-Length: 512\r\n\
    Cache-Control: no-store\r\n\
    Connection: close\r\n\
    \r\n";

#[derive(Deserialize)]
#[allow(dead_code)]
struct Measure {
    device: String,
    temperature: f64,
    tags: Vec<String>,
}

fn chunked_body(size: usize, chunk: usize) -> Vec<u8> {
    let payload = vec![b'x'; size];
    let mut out = Vec::with_capacity(size + size / chunk * 8 + 5);
    for piece in payload.chunks(chunk) {
        out.extend_from_slice(format!("{:x}\r\n", piece.len()).as_bytes());
        out.extend_from_slice(piece);
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(b"0\r\n\r\n");
    out
}

// ========== Head Parsing ==========

fn bench_parse_head(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_head");
    group.throughput(Throughput::Bytes(HEAD.len() as u64));

    group.bench_function("single_read", |b| {
        b.iter(|| {
            let mut parser = ResponseParser::new();
            let head = parser.parse(black_box(HEAD)).unwrap().unwrap();
            black_box(head.content_length().unwrap());
        });
    });

    group.bench_function("byte_at_a_time", |b| {
        b.iter(|| {
            let mut parser = ResponseParser::new();
            let mut head = None;
            for byte in HEAD.chunks(1) {
                if let Some(parsed) = parser.parse(black_box(byte)).unwrap() {
                    head = Some(parsed);
                }
            }
            black_box(head.unwrap());
        });
    });

    group.finish();
}

// ========== Chunked Bodies ==========

fn bench_chunked_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("chunked_decode");

    for &(size, chunk) in &[(4 * 1024, 256), (64 * 1024, 4096), (1024 * 1024, 16 * 1024)] {
        let encoded = chunked_body(size, chunk);
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(
            BenchmarkId::new("body", format!("{}k/{}", size / 1024, chunk)),
            &encoded,
            |b, encoded| {
                let mut output = vec![0u8; 8192];
                b.iter(|| {
                    let mut decoder = ChunkedDecoder::new();
                    let mut pos = 0;
                    let mut total = 0;
                    while !decoder.is_complete() {
                        let (consumed, decoded, _) =
                            decoder.decode(&encoded[pos..], &mut output).unwrap();
                        pos += consumed;
                        total += decoded;
                    }
                    black_box(total);
                });
            },
        );
    }

    group.finish();
}

// ========== JSON Replies ==========

fn bench_json_reply(c: &mut Criterion) {
    let codec = SerdeJson::new();
    let single = r#"{"device":"dev-7","temperature":21.5,"tags":["indoor","floor-2"]}"#;
    let batch = format!("[{}]", vec![single; 100].join(","));

    let mut group = c.benchmark_group("json_reply");

    group.bench_function("single", |b| {
        b.iter(|| {
            let measure: Measure = codec.deserialize(black_box(single)).unwrap();
            black_box(measure);
        });
    });

    group.throughput(Throughput::Bytes(batch.len() as u64));
    group.bench_function("batch_100", |b| {
        b.iter(|| {
            let measures: Vec<Measure> = codec.deserialize(black_box(&batch)).unwrap();
            black_box(measures);
        });
    });

    group.finish();
}

criterion_group!(benches, bench_parse_head, bench_chunked_decode, bench_json_reply);
criterion_main!(benches);
