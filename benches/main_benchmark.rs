use arpfloat::Float;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use fplimit::{find_limit, find_limit_reverse, DOUBLE, SINGLE};

fn test_sine_limit_single() {
    let res = find_limit(
        |x: &Float| x.sin(),
        |x: &Float| x.clone(),
        &SINGLE,
    );
    black_box(res.unwrap());
}

fn test_cosine_limit_single() {
    let res = find_limit(
        |x: &Float| x.cos(),
        |x: &Float| Float::one(x.get_semantics(), false),
        &SINGLE,
    );
    black_box(res.unwrap());
}

fn test_reverse_sine_limit_single() {
    let res = find_limit_reverse(
        |x: &Float| x.sin(),
        |x: &Float| x.clone(),
        &SINGLE,
    );
    black_box(res.unwrap());
}

fn test_distance_single() {
    let wide = DOUBLE.semantics();
    let a = Float::try_from_str("1.00001001", wide).unwrap();
    let b = Float::try_from_str("1.00001013", wide).unwrap();
    black_box(SINGLE.distance(&a, &b).unwrap());
}

fn test_ulp_sweep() {
    for e in -20..20 {
        let x = Float::from_f64(1.5 * 2f64.powi(e));
        black_box(SINGLE.ulp(&x).unwrap());
    }
}

pub fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("sine_limit_single", |b| b.iter(test_sine_limit_single));
    c.bench_function("cosine_limit_single", |b| {
        b.iter(test_cosine_limit_single)
    });
    c.bench_function("reverse_sine_limit_single", |b| {
        b.iter(test_reverse_sine_limit_single)
    });
    c.bench_function("distance_single", |b| b.iter(test_distance_single));
    c.bench_function("ulp_sweep", |b| b.iter(test_ulp_sweep));
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
