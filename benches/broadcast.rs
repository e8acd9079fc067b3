//! Broadcast materialization and elementwise throughput
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ingot::{broadcast_to, elementwise, elementwise_broadcast, elementwise_broadcast_into, DType, ElewOp, Tensor};

const SIZES: &[usize] = &[16, 64, 256];

fn bench_broadcast_to(c: &mut Criterion) {
    let mut group = c.benchmark_group("broadcast_to");
    for &n in SIZES {
        let row = Tensor::arange(0.0, n as f64, 1.0, DType::F32).unwrap();
        group.bench_with_input(BenchmarkId::new("row_to_square", n), &n, |b, &n| {
            b.iter(|| broadcast_to(black_box(&row), (n, n)).unwrap())
        });
    }
    group.finish();
}

fn bench_elementwise(c: &mut Criterion) {
    let mut group = c.benchmark_group("elementwise");
    for &n in SIZES {
        let a = Tensor::zeros((n, n), DType::F32).unwrap();
        let b = Tensor::zeros((n, n), DType::F32).unwrap();
        let col = Tensor::zeros((n, 1), DType::F32).unwrap();
        let row = Tensor::zeros((1, n), DType::F32).unwrap();
        let mut dst = Tensor::zeros((n, n), DType::F32).unwrap();

        group.bench_with_input(BenchmarkId::new("same_shape_sum", n), &n, |bench, _| {
            bench.iter(|| elementwise(black_box(&a), black_box(&b), ElewOp::Sum).unwrap())
        });
        group.bench_with_input(BenchmarkId::new("outer_mul", n), &n, |bench, _| {
            bench.iter(|| elementwise_broadcast(black_box(&col), black_box(&row), ElewOp::Mul).unwrap())
        });
        group.bench_with_input(BenchmarkId::new("outer_mul_into", n), &n, |bench, _| {
            bench.iter(|| elementwise_broadcast_into(black_box(&col), black_box(&row), &mut dst, ElewOp::Mul).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_broadcast_to, bench_elementwise);
criterion_main!(benches);
