use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use ndarray::{Array1, Array2};
use parabola::model::RegressorConfig;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const N_SAMPLES: usize = 2_000;

fn random_problem(n_features: usize) -> (Array2<f64>, Array1<f64>) {
    let mut rng = StdRng::seed_from_u64(0x5EED_F64 + n_features as u64);
    let x = Array2::from_shape_fn((N_SAMPLES, n_features), |_| rng.gen_range(0.1..5.0));
    let y = Array1::from_shape_fn(N_SAMPLES, |r| {
        1.0 + x.row(r).sum() + 0.5 * x[[r, 0]] * x[[r, 0]] + rng.gen_range(-0.1..0.1)
    });
    (x, y)
}

fn benchmark_fit(c: &mut Criterion) {
    let feature_counts = [2_usize, 5, 10];
    let problems: Vec<_> = feature_counts
        .iter()
        .map(|&f| (f, random_problem(f)))
        .collect();

    let least_squares = RegressorConfig::default();
    let ridge = RegressorConfig {
        use_ridge: true,
        standardize_inputs: true,
        ..RegressorConfig::default()
    };

    let mut group = c.benchmark_group("fit");
    for (n_features, (x, y)) in problems.iter() {
        group.throughput(Throughput::Elements(N_SAMPLES as u64));

        group.bench_with_input(
            BenchmarkId::new("least_squares", n_features),
            &(x, y),
            |b, (x, y)| {
                b.iter(|| {
                    let model = least_squares.fit(black_box(x.view()), black_box(y.view()));
                    black_box(model.map(|m| m.coefficients.len()).unwrap_or(0));
                });
            },
        );

        group.bench_with_input(
            BenchmarkId::new("ridge_standardized", n_features),
            &(x, y),
            |b, (x, y)| {
                b.iter(|| {
                    let model = ridge.fit(black_box(x.view()), black_box(y.view()));
                    black_box(model.map(|m| m.coefficients.len()).unwrap_or(0));
                });
            },
        );
    }
    group.finish();
}

fn benchmark_predict(c: &mut Criterion) {
    let (x, y) = random_problem(5);
    let Ok(model) = RegressorConfig::default().fit(x.view(), y.view()) else {
        return;
    };

    let mut group = c.benchmark_group("predict");
    group.throughput(Throughput::Elements(N_SAMPLES as u64));
    group.bench_function("five_features", |b| {
        b.iter(|| {
            let predictions = model.predict(black_box(x.view()));
            black_box(predictions.map(|p| p.len()).unwrap_or(0));
        });
    });
    group.finish();
}

criterion_group!(fit_benchmark, benchmark_fit, benchmark_predict);
criterion_main!(fit_benchmark);
