use criterion::measurement::Measurement;
use criterion::{criterion_group, criterion_main, BenchmarkGroup, BenchmarkId, Criterion};
use ndarray::{Array1, Array2, Axis};
use rand::{rngs::StdRng, SeedableRng};
use rand_distr::{Distribution, StandardNormal};
use single_vbpca::VBPCABuilder;
use std::time::Duration;

#[derive(Clone)]
pub struct DenseDataConfig {
    seed: u64,
    // (features, observations, active latent dimensions)
    shapes: Vec<(usize, usize, usize)>,
    noise: f64,
    measurement_time: u64,
    sample_size: usize,
}

impl Default for DenseDataConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            shapes: vec![(10, 500, 3), (25, 2000, 5), (50, 5000, 10)],
            noise: 0.1,
            measurement_time: 10,
            sample_size: 10,
        }
    }
}

fn create_low_rank_data(d: usize, n: usize, k: usize, noise: f64, seed: u64) -> Array2<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut draw = || -> f64 { StandardNormal.sample(&mut rng) };

    let w = Array2::from_shape_simple_fn((d, k), &mut draw);
    let x = Array2::from_shape_simple_fn((k, n), &mut draw);
    let mu = Array1::from_shape_simple_fn(d, &mut draw);
    let eps = Array2::from_shape_simple_fn((d, n), &mut draw) * noise;

    w.dot(&x) + &mu.insert_axis(Axis(1)) + eps
}

fn configure_group<'a, M: Measurement>(
    c: &'a mut Criterion<M>,
    name: &str,
    config: &DenseDataConfig,
) -> BenchmarkGroup<'a, M> {
    let mut group = c.benchmark_group(name);
    group.measurement_time(Duration::from_secs(config.measurement_time));
    group.sample_size(config.sample_size);
    group
}

pub fn bench_vbpca_update(c: &mut Criterion) {
    let config = DenseDataConfig::default();
    let mut group = configure_group(c, "VBPCA_Update", &config);

    for &(d, n, k) in config.shapes.iter() {
        let y = create_low_rank_data(d, n, k, config.noise, config.seed);
        let mut vbpca = VBPCABuilder::new()
            .random_seed(config.seed)
            .build(y)
            .unwrap();

        group.bench_with_input(
            BenchmarkId::new("sweep", format!("{}x{}", d, n)),
            &(d, n),
            |b, _| {
                b.iter(|| vbpca.update().unwrap());
            },
        );
    }
    group.finish();
}

pub fn bench_vbpca_transform(c: &mut Criterion) {
    let config = DenseDataConfig::default();
    let mut group = configure_group(c, "VBPCA_Transform", &config);

    for &(d, n, k) in config.shapes.iter() {
        let y = create_low_rank_data(d, n, k, config.noise, config.seed);
        let mut vbpca = VBPCABuilder::new()
            .random_seed(config.seed)
            .build(y.clone())
            .unwrap();
        vbpca.fit(20).unwrap();

        group.bench_with_input(
            BenchmarkId::new("transform_new", format!("{}x{}", d, n)),
            &(d, n),
            |b, _| {
                b.iter(|| vbpca.transform_new(y.view()).unwrap());
            },
        );
    }
    group.finish();
}

criterion_group!(vbpca_benches, bench_vbpca_update, bench_vbpca_transform);
criterion_main!(vbpca_benches);
