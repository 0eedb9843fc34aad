//! Benchmarks for the blob cache insert and lookup paths.
//!
//! Run with:
//! ```bash
//! cargo bench --bench cache_insert
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use unwind_cache::cache::BlobCache;
use unwind_cache::id::BlobId;

/// Generate deterministic random blobs for reproducible benchmarks.
fn random_blobs(seed: u64, count: usize) -> Vec<Vec<u8>> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..count)
        .map(|i| {
            let len = rng.random_range(4..=64);
            let mut blob = vec![0u8; len];
            rng.fill(&mut blob[..]);
            // Prefix with the index so every blob is distinct.
            blob[..4].copy_from_slice(&(i as u32).to_le_bytes());
            blob
        })
        .collect()
}

fn filled_cache(blobs: &[Vec<u8>]) -> (BlobCache, Vec<BlobId>) {
    let cache = BlobCache::new();
    let ids = blobs.iter().map(|blob| cache.insert(blob)).collect();
    (cache, ids)
}

// ============================================================================
// Benchmark: Insert distinct blobs
// ============================================================================

fn bench_insert_distinct(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert/distinct");
    group.sample_size(20);

    for size in [1_000, 4_000, 16_000] {
        let blobs = random_blobs(42, size);

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &blobs, |b, blobs| {
            b.iter_with_setup(BlobCache::new, |cache| {
                for blob in blobs {
                    black_box(cache.insert(blob));
                }
                cache
            });
        });
    }

    group.finish();
}

// ============================================================================
// Benchmark: Re-insert known blobs (dedup hits)
// ============================================================================

fn bench_insert_existing(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert/existing");

    for size in [1_000, 4_000, 16_000] {
        let blobs = random_blobs(42, size);
        let (cache, _) = filled_cache(&blobs);
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let probes: Vec<usize> = (0..1_000).map(|_| rng.random_range(0..size)).collect();

        group.throughput(Throughput::Elements(probes.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &probes, |b, probes| {
            b.iter(|| {
                for &i in probes {
                    black_box(cache.insert(&blobs[i]));
                }
            });
        });
    }

    group.finish();
}

// ============================================================================
// Benchmark: Lookup
// ============================================================================

fn bench_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("lookup");

    let size = 16_000;
    let blobs = random_blobs(42, size);
    let (cache, ids) = filled_cache(&blobs);

    group.throughput(Throughput::Elements(ids.len() as u64));
    group.bench_function("checked", |b| {
        b.iter(|| {
            for &id in &ids {
                black_box(cache.lookup(id));
            }
        });
    });
    group.bench_function("unchecked", |b| {
        b.iter(|| {
            for &id in &ids {
                // SAFETY: every id was issued by `filled_cache`.
                black_box(unsafe { cache.lookup_unchecked(id) });
            }
        });
    });

    group.finish();
}

criterion_group!(benches, bench_insert_distinct, bench_insert_existing, bench_lookup);
criterion_main!(benches);
