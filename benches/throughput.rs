//! Throughput benchmarks

use asterm_core::{Frame, TerminatorMatcher, TerminatorSet};
use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use std::hint::black_box;

fn console_output(len: usize) -> Vec<u8> {
    b"  JT1     JT2     JT3\r\n  0.000   90.000  -45.000\r\n\x05"
        .iter()
        .copied()
        .cycle()
        .take(len)
        .collect()
}

fn matcher_benchmark(c: &mut Criterion) {
    let data = console_output(64 * 1024);

    let mut group = c.benchmark_group("matcher");
    group.throughput(Throughput::Bytes(data.len() as u64));

    group.bench_function("single_byte", |b| {
        let set = TerminatorSet::single(b">").unwrap();
        b.iter(|| {
            let mut matcher = TerminatorMatcher::new(&set);
            let found = black_box(&data).iter().any(|&byte| matcher.feed(byte).is_some());
            black_box(found)
        })
    });

    group.bench_function("load_signals", |b| {
        let set = TerminatorSet::new([
            b"\x05\x02C\x17".as_slice(),
            b"Are you sure ? (Yes:1, No:0) \r\n".as_slice(),
        ])
        .unwrap();
        b.iter(|| {
            let mut matcher = TerminatorMatcher::new(&set);
            let found = black_box(&data).iter().find_map(|&byte| matcher.feed(byte));
            black_box(found)
        })
    });

    group.finish();
}

fn frame_benchmark(c: &mut Criterion) {
    let chunk = console_output(512);

    let mut group = c.benchmark_group("frame");
    group.throughput(Throughput::Bytes(chunk.len() as u64));

    group.bench_function("encode_chunk", |b| {
        b.iter(|| black_box(Frame::Chunk(black_box(&chunk)).encode()))
    });

    group.bench_function("parse_chunk", |b| {
        let encoded = Frame::Chunk(&chunk).encode();
        b.iter(|| black_box(Frame::parse(black_box(&encoded)).is_ok()))
    });

    group.finish();
}

criterion_group!(benches, matcher_benchmark, frame_benchmark);
criterion_main!(benches);
