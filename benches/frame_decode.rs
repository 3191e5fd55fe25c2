//! Benchmarks for container decoding and envelope production
//!
//! Covers the per-frame work done by the drain loop:
//! - Header parsing and body decoding for ASCII and binary frames
//! - Vertex view serialization and zstd compression
//!
//! Platform: Cross-platform (synthetic frames, CI-safe)

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use pcd_relay::bridge::FrameProcessor;
use pcd_relay::codec::ZstdCompressor;
use pcd_relay::pcd::{TableView, Terminator, decode_container};
use pcd_relay::test_utils::{PcdBuilder, f32_rows};
use pcd_relay::types::RawFrame;
use std::hint::black_box;
use std::sync::Arc;

const POINT_COUNTS: [usize; 3] = [1_000, 10_000, 100_000];

fn synthetic_rows(points: usize) -> Vec<[f32; 4]> {
    (0..points)
        .map(|i| {
            let t = i as f32 * 0.01;
            [t.cos() * 10.0, t.sin() * 10.0, (i % 32) as f32 * 0.1, (i % 256) as f32]
        })
        .collect()
}

fn binary_frame(points: usize) -> Vec<u8> {
    let rows = synthetic_rows(points);
    let refs: Vec<&[f32]> = rows.iter().map(|r| r.as_slice()).collect();
    PcdBuilder::xyzi().points(points).binary(&f32_rows(&refs))
}

fn ascii_frame(points: usize) -> Vec<u8> {
    let rows: Vec<String> = synthetic_rows(points)
        .iter()
        .map(|[x, y, z, i]| format!("{x:.3} {y:.3} {z:.3} {i:.0}"))
        .collect();
    let refs: Vec<&str> = rows.iter().map(String::as_str).collect();
    PcdBuilder::xyzi().ascii(&refs)
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_container");

    for points in POINT_COUNTS {
        let binary = binary_frame(points);
        group.throughput(Throughput::Elements(points as u64));
        group.bench_with_input(BenchmarkId::new("binary", points), &binary, |b, frame| {
            b.iter(|| {
                let decoded = decode_container("bench", black_box(frame), Terminator::TimeSentinel)
                    .expect("binary frame decodes");
                black_box(decoded)
            })
        });

        let ascii = ascii_frame(points);
        group.bench_with_input(BenchmarkId::new("ascii", points), &ascii, |b, frame| {
            b.iter(|| {
                let decoded = decode_container("bench", black_box(frame), Terminator::TimeSentinel)
                    .expect("ascii frame decodes");
                black_box(decoded)
            })
        });
    }

    group.finish();
}

fn bench_envelope(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_to_envelope");
    let processor = FrameProcessor::new(
        Terminator::TimeSentinel,
        TableView::Vertices,
        Arc::new(ZstdCompressor::default()),
    );

    for points in POINT_COUNTS {
        let frame = RawFrame::new("bench", binary_frame(points));
        group.throughput(Throughput::Elements(points as u64));
        group.bench_with_input(BenchmarkId::from_parameter(points), &frame, |b, frame| {
            b.iter(|| black_box(processor.process(black_box(frame)).expect("frame processes")))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_decode, bench_envelope);
criterion_main!(benches);
