//! Benchmarks for the caller-side cost of a log call.

use std::{
    hint::black_box,
    io,
    sync::Arc,
    time::Duration,
};

use criterion::{Criterion, criterion_group, criterion_main};
use loggly_tls::{
    Connector, Endpoint, JsonFormatter, LogglyTransport, Metadata, SharedFormatter, Severity,
    StreamIo,
    transport::{MessageEncoder, StructuredData},
};
use serde_json::json;

fn encoder() -> MessageEncoder {
    MessageEncoder::new(
        "bench-host",
        "bench",
        1,
        StructuredData::new("TOKEN", &["bench", "criterion"]),
        SharedFormatter::new(JsonFormatter::default()),
    )
}

fn metadata() -> Metadata {
    json!({"user": "ann", "request_id": 1234, "path": "/api/v1/items"})
        .as_object()
        .cloned()
        .unwrap_or_default()
}

/// Accepts every connection and discards what is written.
struct Discard;

struct DiscardStream;

impl io::Read for DiscardStream {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(io::ErrorKind::WouldBlock.into())
    }
}

impl io::Write for DiscardStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl StreamIo for DiscardStream {
    fn set_read_timeout(&self, _timeout: Option<Duration>) -> io::Result<()> {
        Ok(())
    }

    fn set_write_timeout(&self, _timeout: Option<Duration>) -> io::Result<()> {
        Ok(())
    }
}

impl Connector for Discard {
    fn connect(&self, _endpoint: &Endpoint, _timeout: Duration) -> io::Result<Box<dyn StreamIo>> {
        Ok(Box::new(DiscardStream))
    }
}

fn bench_encode(c: &mut Criterion) {
    let encoder = encoder();
    let metadata = metadata();
    c.bench_function("encode_without_metadata", |b| {
        b.iter(|| encoder.encode(Severity::Info, black_box("request served"), &Metadata::new()))
    });
    c.bench_function("encode_with_metadata", |b| {
        b.iter(|| encoder.encode(Severity::Warning, black_box("slow request"), &metadata))
    });
}

fn bench_log_call(c: &mut Criterion) {
    let transport = LogglyTransport::builder("TOKEN")
        .with_connector(Arc::new(Discard))
        .with_capacity(1 << 16)
        .build()
        .expect("transport starts");
    let message = json!("request served");
    transport.flush();
    let metadata = metadata();
    c.bench_function("log_to_connected_stream", |b| {
        b.iter(|| transport.log("info", black_box(&message), Some(metadata.clone())))
    });
}

criterion_group!(benches, bench_encode, bench_log_call);
criterion_main!(benches);
