//! Benchmarks for suitability generation and conversion

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use virtualspecies_algorithms::prelude::*;

/// Three smooth, partly correlated layers over a square grid
fn create_stack(size: usize) -> EnvironmentalStack {
    let layer = |f: &dyn Fn(f64, f64) -> f64| {
        let mut r = Raster::new(size, size);
        r.set_transform(GeoTransform::new(0.0, size as f64, 1.0, -1.0));
        for row in 0..size {
            for col in 0..size {
                let (y, x) = (row as f64 / size as f64, col as f64 / size as f64);
                r.set(row, col, f(x, y)).unwrap();
            }
        }
        r
    };
    EnvironmentalStack::from_layers(vec![
        ("temp", layer(&|x, y| 25.0 - 15.0 * y + 2.0 * x)),
        ("prec", layer(&|x, y| 800.0 + 600.0 * (3.0 * x).sin() * y)),
        ("elev", layer(&|x, y| 1200.0 * (x * y).sqrt())),
    ])
    .unwrap()
}

fn response_params() -> ResponseParameters {
    let mut p = ResponseParameters::new();
    p.insert("temp".into(), ResponseParameterBlock::gaussian(18.0, 4.0));
    p.insert("prec".into(), ResponseParameterBlock::logistic(-100.0, 700.0));
    p.insert("elev".into(), ResponseParameterBlock::quadratic(-1e-6, 1e-3, 0.5));
    p
}

fn bench_responses(c: &mut Criterion) {
    let mut group = c.benchmark_group("suitability/responses");
    let registry = ResponseRegistry::default();
    let params = response_params();
    for size in [128, 256, 512] {
        let stack = create_stack(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                generate_from_responses(
                    black_box(&stack),
                    &params,
                    ResponseSpeciesParams::default(),
                    &registry,
                )
                .unwrap()
            })
        });
    }
    group.finish();
}

fn bench_pca(c: &mut Criterion) {
    let mut group = c.benchmark_group("suitability/pca");
    for size in [128, 256] {
        let stack = create_stack(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                generate_from_pca(black_box(&stack), PcaSpeciesParams::default(), &mut seeded(1)).unwrap()
            })
        });
    }
    group.finish();
}

fn bench_prevalence_conversion(c: &mut Criterion) {
    let mut group = c.benchmark_group("conversion/logistic_prevalence");
    for size in [128, 256] {
        let sp = generate_from_responses(
            &create_stack(size),
            &response_params(),
            ResponseSpeciesParams::default(),
            &ResponseRegistry::default(),
        )
        .unwrap();
        let params = ConversionParams {
            method: ConversionMethod::Logistic {
                alpha: Some(0.05),
                beta: Beta::Random,
            },
            species_prevalence: Some(0.2),
            ..Default::default()
        };
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| convert_to_pa(black_box(&sp), &params, &mut seeded(2)).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_responses, bench_pca, bench_prevalence_conversion);
criterion_main!(benches);
