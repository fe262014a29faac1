use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use hetile::backend::cleartext::CleartextBackend;
use hetile::{Encoder, EvalType, FunctionEvaluator, HeConfigRequirement, HeContext};
use std::sync::Arc;

fn bench_poly_eval(c: &mut Criterion) {
    let mut ctx = HeContext::new(Box::new(CleartextBackend::with_seed(42)));
    ctx.init(&HeConfigRequirement::new(1024, 40, 30, 10))
        .unwrap();
    let ctx = Arc::new(ctx);
    let encoder = Encoder::new(&ctx).unwrap();
    let evaluator = FunctionEvaluator::new(&ctx);

    let values: Vec<f64> = (0..1024).map(|i| i as f64 / 1024.0 - 0.5).collect();
    let coeffs: Vec<f64> = (0..=31).map(|i| 1.0 / (i + 1) as f64).collect();
    let x = encoder.encrypt(&values).unwrap();

    let mut group = c.benchmark_group("poly_eval_degree_31");
    for (name, eval_type) in [
        ("paterson_stockmeyer", EvalType::PatersonStockmeyer),
        ("efficient_powers", EvalType::EfficientPowers),
        ("min_depth", EvalType::MinDepth),
    ] {
        group.bench_with_input(
            BenchmarkId::from_parameter(name),
            &eval_type,
            |b, &eval_type| b.iter(|| evaluator.poly_eval(&x, &coeffs, eval_type).unwrap()),
        );
    }
    group.finish();
}

fn bench_rotation(c: &mut Criterion) {
    let mut ctx = HeContext::new(Box::new(CleartextBackend::with_seed(42)));
    ctx.init(&HeConfigRequirement::new(4096, 2, 30, 10)).unwrap();
    let ctx = Arc::new(ctx);
    let encoder = Encoder::new(&ctx).unwrap();
    let values: Vec<f64> = (0..4096).map(|i| i as f64).collect();
    let tile = encoder.encrypt(&values).unwrap();

    c.bench_function("rotate_arbitrary_amount", |b| {
        b.iter(|| {
            let mut rotated = tile.clone();
            rotated.rotate(1234).unwrap();
            rotated
        })
    });
}

criterion_group!(benches, bench_poly_eval, bench_rotation);
criterion_main!(benches);
