//! Criterion benchmarks for the chunked hasher's core optimization: a
//! second `digest()` call over unchanged data should cost far less than the
//! first.
//!
//! Run with:
//!   cargo bench --bench digest

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use pagehash::ChunkedHasher;

const CHUNK_SIZE: usize = 8192;

fn synthetic_region(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 256) as u8).collect()
}

fn bench_first_vs_cached_digest(c: &mut Criterion) {
    let mut group = c.benchmark_group("chunked_digest");

    for &chunks in &[16usize, 128, 1024] {
        let len = chunks * CHUNK_SIZE;
        let data = synthetic_region(len);
        group.throughput(Throughput::Bytes(len as u64));

        group.bench_with_input(BenchmarkId::new("first_digest", chunks), &data, |b, data| {
            b.iter_batched(
                || ChunkedHasher::new(data.len()),
                |mut hasher| {
                    let mut out = [0u8; 32];
                    hasher.digest(data, &mut out, true).unwrap();
                },
                criterion::BatchSize::LargeInput,
            )
        });

        group.bench_with_input(BenchmarkId::new("cached_digest", chunks), &data, |b, data| {
            let mut hasher = ChunkedHasher::new(data.len());
            let mut warm = [0u8; 32];
            hasher.digest(data, &mut warm, true).unwrap();
            b.iter(|| {
                let mut out = [0u8; 32];
                hasher.digest(data, &mut out, true).unwrap();
            })
        });

        group.bench_with_input(
            BenchmarkId::new("one_chunk_dirty_digest", chunks),
            &data,
            |b, data| {
                let mut hasher = ChunkedHasher::new(data.len());
                let mut warm = [0u8; 32];
                hasher.digest(data, &mut warm, true).unwrap();
                b.iter(|| {
                    hasher.mark_chunk_changed(chunks / 2);
                    let mut out = [0u8; 32];
                    hasher.digest(data, &mut out, true).unwrap();
                })
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_first_vs_cached_digest);
criterion_main!(benches);
