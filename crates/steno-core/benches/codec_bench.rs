//! Criterion benchmarks for the steno packet codec.
//!
//! The poll loop encodes one read command and decodes one response every
//! 100 ms, so these numbers only need to stay far below that; they exist to
//! catch accidental quadratic behaviour on full 64 KiB payloads.
//!
//! Run with:
//! ```bash
//! cargo bench --package steno-core --bench codec_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use steno_core::protocol::codec::{
    decode_response_header, encode_command, response_payload, split_chords,
};
use steno_core::protocol::packet::{
    field, CommandPacket, HEADER_SIZE, MAX_PAYLOAD_SIZE, STROKE_RECORD_SIZE,
};

// ── Frame fixtures ────────────────────────────────────────────────────────────

/// Builds a response frame carrying `strokes` stroke records.
fn make_response(strokes: usize) -> Vec<u8> {
    let payload_len = (strokes * STROKE_RECORD_SIZE).min(MAX_PAYLOAD_SIZE);
    let mut frame = vec![0u8; HEADER_SIZE + payload_len];
    frame[field::SYNC].copy_from_slice(b"SG");
    frame[field::SEQUENCE].copy_from_slice(&1u32.to_le_bytes());
    frame[field::PAYLOAD_LEN].copy_from_slice(&(payload_len as u32).to_le_bytes());
    for (i, record) in frame[HEADER_SIZE..].chunks_mut(STROKE_RECORD_SIZE).enumerate() {
        record[0] = 0x08 | (i as u8 & 0x07);
        record[3] = 0x01;
    }
    frame
}

// ── Benchmark groups ──────────────────────────────────────────────────────────

/// Benchmarks `encode_command` for the read-bytes command.
fn bench_encode(c: &mut Criterion) {
    let packet = CommandPacket::read_bytes(42, 4096, 512);
    c.bench_function("encode_command/read_bytes", |b| {
        b.iter(|| encode_command(black_box(&packet)).expect("encode must succeed"))
    });
}

/// Benchmarks header decode plus chord extraction for growing payloads.
fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_response");
    for strokes in [1usize, 64, MAX_PAYLOAD_SIZE / STROKE_RECORD_SIZE] {
        let frame = make_response(strokes);
        group.throughput(Throughput::Bytes(frame.len() as u64));
        group.bench_with_input(BenchmarkId::new("strokes", strokes), &frame, |b, frame| {
            b.iter(|| {
                let header = decode_response_header(black_box(frame)).expect("header");
                let payload = response_payload(&header, frame).expect("payload");
                split_chords(payload).expect("chords")
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode);
criterion_main!(benches);
