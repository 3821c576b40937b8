//! Benchmarks for processor operations across every available backend
//!
//! # Benchmark Methodology
//!
//! - Sizes 100, 1000, 10000 and a tail-heavy 1023
//! - Every backend available on the machine, constructed explicitly
//! - Criterion throughput in elements/second
//!
//! # Performance Goals
//!
//! Expected speedup over Scalar for element-wise ops:
//! - SSE2/NEON/SIMD128:   3-4x
//! - AVX2:                6-8x
//! - AVX-512:             8-16x (memory bound beyond L2)

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rayo::{available_backends, SimdProcessor};

const SIZES: [usize; 4] = [100, 1000, 1023, 10000];

/// Generate test data for benchmarks
fn generate_test_data(size: usize) -> Vec<f32> {
    (0..size).map(|i| (i as f32) * 0.5 + 1.0).collect()
}

fn processors() -> Vec<Box<dyn SimdProcessor>> {
    available_backends()
        .into_iter()
        .filter_map(|backend| backend.processor().ok())
        .collect()
}

/// Benchmark an elementwise two-source operation
fn bench_binary(
    c: &mut Criterion,
    group_name: &str,
    op: fn(&dyn SimdProcessor, &mut [f32], &[f32], &[f32]),
) {
    let mut group = c.benchmark_group(group_name);

    for size in SIZES {
        group.throughput(Throughput::Elements(size as u64));

        for p in processors() {
            group.bench_with_input(BenchmarkId::new(p.name(), size), &size, |bencher, &size| {
                let a = generate_test_data(size);
                let b = generate_test_data(size);
                let mut dst = vec![0.0; size];

                bencher.iter(|| {
                    op(p.as_ref(), black_box(&mut dst), black_box(&a), black_box(&b));
                });
            });
        }
    }

    group.finish();
}

/// Benchmark a broadcast-constant operation
fn bench_constant(
    c: &mut Criterion,
    group_name: &str,
    op: fn(&dyn SimdProcessor, &mut [f32], f32, &[f32]),
) {
    let mut group = c.benchmark_group(group_name);

    for size in SIZES {
        group.throughput(Throughput::Elements(size as u64));

        for p in processors() {
            group.bench_with_input(BenchmarkId::new(p.name(), size), &size, |bencher, &size| {
                let src = generate_test_data(size);
                let mut dst = vec![0.0; size];

                bencher.iter(|| {
                    op(p.as_ref(), black_box(&mut dst), black_box(1.5), black_box(&src));
                });
            });
        }
    }

    group.finish();
}

fn bench_add(c: &mut Criterion) {
    bench_binary(c, "add", |p, dst, a, b| p.add(dst, a, b));
    bench_constant(c, "add_const", |p, dst, k, s| p.add_const(dst, k, s));
}

fn bench_sub(c: &mut Criterion) {
    bench_binary(c, "sub", |p, dst, a, b| p.sub(dst, a, b));
    bench_constant(c, "sub_const", |p, dst, k, s| p.sub_const(dst, k, s));
}

fn bench_mul(c: &mut Criterion) {
    bench_binary(c, "mul", |p, dst, a, b| p.mul(dst, a, b));
    bench_constant(c, "mul_const", |p, dst, k, s| p.mul_const(dst, k, s));
}

fn bench_div(c: &mut Criterion) {
    bench_binary(c, "div", |p, dst, a, b| p.div(dst, a, b));
    bench_constant(c, "div_const", |p, dst, k, s| p.div_const(dst, k, s));
}

/// Multiply-add family: FMA backends should pull ahead here
fn bench_mul_add(c: &mut Criterion) {
    bench_binary(c, "mul_add", |p, dst, a, b| p.mul_add(dst, a, b));
    bench_constant(c, "mul_add_const", |p, dst, k, s| p.mul_add_const(dst, k, s));
    bench_binary(c, "mul_sub", |p, dst, a, b| p.mul_sub(dst, a, b));
    bench_constant(c, "mul_sub_const", |p, dst, k, s| p.mul_sub_const(dst, k, s));
}

criterion_group!(benches, bench_add, bench_sub, bench_mul, bench_div, bench_mul_add);
criterion_main!(benches);
