//! Benchmarks for training and bucket-id computation.
//!
//! Training cost is dominated by the covariance eigendecomposition; hashing
//! cost by the basis-times-vector projection. Both scale with the code
//! width, so each benchmark sweeps N.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use orthant::{DenseMatrix, IndexParams, OrthantIndex, TrainOptions};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn random_dataset(rows: usize, dim: usize) -> DenseMatrix {
    let mut rng = StdRng::seed_from_u64(42);
    let data: Vec<f32> = (0..rows * dim)
        .map(|_| rng.random::<f32>() * 2.0 - 1.0)
        .collect();
    DenseMatrix::from_flat(data, dim).unwrap()
}

fn trained_index(data: &DenseMatrix, dim: usize, bits: usize) -> OrthantIndex {
    let params = IndexParams {
        m: 521,
        l: 4,
        d: dim,
        n: bits,
        s: 256,
        i: 20,
    };
    let mut index = OrthantIndex::new(params).unwrap();
    index
        .train_all(data, &TrainOptions::default().with_seed(7))
        .unwrap();
    index
}

fn bench_training(c: &mut Criterion) {
    let dim = 32;
    let data = random_dataset(1024, dim);

    let mut group = c.benchmark_group("train_all");
    group.sample_size(10);
    for bits in [8usize, 16, 24] {
        group.bench_with_input(BenchmarkId::from_parameter(bits), &bits, |b, &bits| {
            b.iter(|| {
                let params = IndexParams {
                    m: 521,
                    l: 4,
                    d: dim,
                    n: bits,
                    s: 256,
                    i: 20,
                };
                let mut index = OrthantIndex::new(params).unwrap();
                index
                    .train_all(&data, &TrainOptions::default().with_seed(7))
                    .unwrap();
                black_box(index)
            });
        });
    }
    group.finish();
}

fn bench_bucket_id(c: &mut Criterion) {
    let dim = 32;
    let data = random_dataset(1024, dim);
    let query: Vec<f32> = (0..dim).map(|i| (i as f32 * 0.3).sin()).collect();

    let mut group = c.benchmark_group("bucket_id");
    group.throughput(Throughput::Elements(1));
    for bits in [8usize, 16, 24] {
        let index = trained_index(&data, dim, bits);
        group.bench_with_input(BenchmarkId::from_parameter(bits), &bits, |b, _| {
            b.iter(|| index.bucket_id(0, black_box(&query)).unwrap());
        });
    }
    group.finish();
}

fn bench_bulk_hash(c: &mut Criterion) {
    let dim = 32;
    let data = random_dataset(4096, dim);

    let mut group = c.benchmark_group("hash_dataset");
    group.sample_size(10);
    group.throughput(Throughput::Elements(4096));
    group.bench_function("4096x32", |b| {
        b.iter_batched(
            || trained_index(&data, dim, 16),
            |mut index| {
                index.hash(&data).unwrap();
                black_box(index)
            },
            criterion::BatchSize::LargeInput,
        );
    });
    group.finish();
}

criterion_group!(benches, bench_training, bench_bucket_id, bench_bulk_hash);
criterion_main!(benches);
