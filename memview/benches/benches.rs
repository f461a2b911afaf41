use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use memview::{AnyView, DType, Float32Buffer};

/// Writes then reads every element one copy at a time
pub fn elementwise(v: &mut Float32Buffer) -> f32 {
    for i in 0..v.len() {
        v.set_at(i, i as f32).unwrap();
    }
    (0..v.len()).map(|i| v.get(i).unwrap().unwrap_or_default()).sum()
}

/// Same result with one fill and one bulk read
pub fn bulk(v: &mut Float32Buffer) -> f32 {
    v.fill(1.0, 0, None).unwrap();
    v.to_vec().unwrap().into_iter().sum()
}

pub fn access(c: &mut Criterion) {
    let mut group = c.benchmark_group("access");

    for len in [16, 256, 4096] {
        let mut v = Float32Buffer::new(len).unwrap();
        group.bench_with_input(BenchmarkId::new("elementwise", len), &len, |b, _| {
            b.iter(|| black_box(elementwise(&mut v)));
        });

        let mut v = Float32Buffer::new(len).unwrap();
        group.bench_with_input(BenchmarkId::new("bulk", len), &len, |b, _| {
            b.iter(|| black_box(bulk(&mut v)));
        });
    }

    group.finish();
}

pub fn windows(c: &mut Criterion) {
    let mut group = c.benchmark_group("windows");
    let v = AnyView::new(DType::Uint8, 1 << 16).unwrap();

    group.bench_function("subarray", |b| {
        b.iter(|| black_box(v.subarray(black_box(-1024), None)));
    });

    group.bench_function("slice", |b| {
        b.iter(|| black_box(v.slice(black_box(-1024), None).unwrap()));
    });

    group.bench_function("to_owned_copy", |b| {
        let typed = v.downcast_ref::<u8>().unwrap();
        b.iter(|| black_box(typed.to_owned_copy().unwrap()));
    });

    group.finish();
}

criterion_group!(benches, access, windows);
criterion_main!(benches);
