use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use holdout::crossval::cross_validate;
use holdout::data::Dataset;
use holdout::logistic::LogisticRegression;
use holdout::partition::split;
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

fn random_dataset(n_rows: usize, n_features: usize) -> Dataset {
    let mut rng = StdRng::seed_from_u64(0x5EED_F64 + n_rows as u64);
    let features: Array2<f64> =
        Array2::from_shape_fn((n_rows, n_features), |_| rng.sample(StandardNormal));
    let labels: Array1<f64> = features
        .rows()
        .into_iter()
        .map(|row| if row.sum() + rng.sample::<f64, _>(StandardNormal) > 0.0 { 1.0 } else { 0.0 })
        .collect();
    let names = (1..=n_features).map(|i| format!("x{i}")).collect();
    Dataset::new(features, labels, names).expect("valid synthetic dataset")
}

fn benchmark_split(c: &mut Criterion) {
    let mut group = c.benchmark_group("split");
    for n_rows in [1_000_usize, 10_000, 100_000] {
        group.throughput(Throughput::Elements(n_rows as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n_rows), &n_rows, |b, &n| {
            b.iter(|| {
                let parts = split(black_box(n), 5, 1).expect("split");
                black_box(parts);
            });
        });
    }
    group.finish();
}

fn benchmark_cross_validate(c: &mut Criterion) {
    let model = LogisticRegression::default();
    let mut group = c.benchmark_group("cross_validate");
    for n_rows in [1_000_usize, 5_000] {
        let dataset = random_dataset(n_rows, 4);
        let (cv, _) = split(n_rows, 5, 1).expect("split");
        group.throughput(Throughput::Elements(n_rows as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n_rows), &dataset, |b, data| {
            b.iter(|| {
                let result = cross_validate(black_box(data), &cv, &model).expect("cv");
                black_box(result.test_err);
            });
        });
    }
    group.finish();
}

criterion_group!(crossval, benchmark_split, benchmark_cross_validate);
criterion_main!(crossval);
