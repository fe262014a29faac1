//! Numeric layer against the cleartext backend: polynomial evaluation,
//! comparisons and iterative inverses.

use hetile::backend::cleartext::CleartextBackend;
use hetile::functions::horner_eval_plain;
use hetile::{Encoder, EvalType, FunctionEvaluator, HeConfigRequirement, HeContext, HeError};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use std::sync::Arc;

fn context(num_slots: i64, depth: i32) -> Arc<HeContext> {
    let mut ctx = HeContext::new(Box::new(CleartextBackend::with_seed(99)));
    ctx.init(&HeConfigRequirement::new(num_slots, depth, 40, 10))
        .unwrap();
    Arc::new(ctx)
}

#[test]
fn poly_eval_matches_plain_horner() {
    let ctx = context(32, 40);
    let encoder = Encoder::new(&ctx).unwrap();
    let evaluator = FunctionEvaluator::new(&ctx);

    let mut rng = ChaCha20Rng::seed_from_u64(7);
    let coeffs: Vec<f64> = (0..=31).map(|_| rng.random_range(-1.0..1.0)).collect();
    let xs: Vec<f64> = (0..32).map(|_| rng.random_range(-0.9..0.9)).collect();
    let x = encoder.encrypt(&xs).unwrap();

    for eval_type in [
        EvalType::PatersonStockmeyer,
        EvalType::EfficientPowers,
        EvalType::MinDepth,
    ] {
        let result = evaluator.poly_eval(&x, &coeffs, eval_type).unwrap();
        let got = encoder.decrypt(&result).unwrap();
        for (i, &xi) in xs.iter().enumerate() {
            let want = horner_eval_plain(&coeffs, xi);
            assert!(
                (got[i] - want).abs() < 1e-6,
                "{eval_type:?} slot {i}: got {}, want {want}",
                got[i]
            );
        }
    }
}

#[test]
fn paterson_stockmeyer_spends_fewer_levels_than_the_ladder() {
    let ctx = context(32, 40);
    let encoder = Encoder::new(&ctx).unwrap();
    let evaluator = FunctionEvaluator::new(&ctx);
    let coeffs: Vec<f64> = (0..=31).map(|i| 1.0 / (i + 1) as f64).collect();
    let x = encoder.encrypt(&[0.5; 32]).unwrap();

    let ps = evaluator
        .poly_eval(&x, &coeffs, EvalType::PatersonStockmeyer)
        .unwrap();
    let ladder = evaluator
        .poly_eval(&x, &coeffs, EvalType::EfficientPowers)
        .unwrap();
    assert!(
        ps.chain_index() > ladder.chain_index() + 10,
        "ps at {}, ladder at {}",
        ps.chain_index(),
        ladder.chain_index()
    );
}

#[test]
fn all_near_zero_coefficients_short_circuit() {
    let ctx = context(16, 4);
    let encoder = Encoder::new(&ctx).unwrap();
    let evaluator = FunctionEvaluator::new(&ctx);
    let x = encoder.encrypt(&[0.7; 16]).unwrap();

    let result = evaluator
        .poly_eval(&x, &[1e-30, 1e-25, 1e-20], EvalType::PatersonStockmeyer)
        .unwrap();
    let got = encoder.decrypt(&result).unwrap();
    assert!(got[0].abs() < 1e-9);
}

#[test]
fn poly_eval_with_encrypted_coefficients() {
    let ctx = context(16, 10);
    let encoder = Encoder::new(&ctx).unwrap();
    let evaluator = FunctionEvaluator::new(&ctx);

    let coeff_values = [0.5, -1.0, 0.25, 2.0];
    let coeffs: Vec<_> = coeff_values
        .iter()
        .map(|&c| encoder.encrypt(&[c; 16]).unwrap())
        .collect();
    let x = encoder.encrypt(&[0.3; 16]).unwrap();

    let result = evaluator.poly_eval_encrypted(&x, &coeffs).unwrap();
    let got = encoder.decrypt(&result).unwrap();
    let want = horner_eval_plain(&coeff_values, 0.3);
    assert!((got[0] - want).abs() < 1e-6, "got {}, want {want}", got[0]);

    assert!(matches!(
        evaluator.poly_eval_encrypted(&x, &[]),
        Err(HeError::InvalidArgument { .. })
    ));
}

#[test]
fn pow_agrees_across_strategies() {
    let ctx = context(16, 12);
    let encoder = Encoder::new(&ctx).unwrap();
    let evaluator = FunctionEvaluator::new(&ctx);
    let xs: Vec<f64> = (0..16).map(|i| 0.1 * i as f64 - 0.75).collect();
    let x = encoder.encrypt(&xs).unwrap();

    for n in [1u32, 2, 5, 8, 11] {
        for eval_type in [EvalType::EfficientPowers, EvalType::MinDepth] {
            let result = evaluator.pow(&x, n, eval_type).unwrap();
            let got = encoder.decrypt(&result).unwrap();
            for (i, &xi) in xs.iter().enumerate() {
                let want = xi.powi(n as i32);
                assert!(
                    (got[i] - want).abs() < 1e-6,
                    "x^{n} {eval_type:?} slot {i}"
                );
            }
        }
    }
    assert!(matches!(
        evaluator.pow(&x, 0, EvalType::MinDepth),
        Err(HeError::InvalidArgument { .. })
    ));
}

#[test]
fn sign_saturates_away_from_zero() {
    let ctx = context(16, 60);
    let encoder = Encoder::new(&ctx).unwrap();
    let evaluator = FunctionEvaluator::new(&ctx);

    let xs = [
        -0.99, -0.9, -0.5, -0.3, -0.2, 0.2, 0.3, 0.5, 0.9, 0.99, 0.25, -0.25, 0.7, -0.7, 0.4,
        -0.4,
    ];
    let x = encoder.encrypt(&xs).unwrap();
    let result = evaluator.sign(&x, 3, 3, 1.0).unwrap();
    let got = encoder.decrypt(&result).unwrap();
    for (i, &xi) in xs.iter().enumerate() {
        let want = xi.signum();
        assert!(
            (got[i] - want).abs() < 0.05,
            "sign({xi}): got {}, want {want}",
            got[i]
        );
    }

    // Same inputs scaled up, with the bound passed along.
    let scaled: Vec<f64> = xs.iter().map(|v| v * 4.0).collect();
    let x = encoder.encrypt(&scaled).unwrap();
    let result = evaluator.sign(&x, 3, 3, 4.0).unwrap();
    let got = encoder.decrypt(&result).unwrap();
    for (i, &xi) in scaled.iter().enumerate() {
        assert!((got[i] - xi.signum()).abs() < 0.05);
    }
}

#[test]
fn compare_produces_indicator_values() {
    let ctx = context(16, 60);
    let encoder = Encoder::new(&ctx).unwrap();
    let evaluator = FunctionEvaluator::new(&ctx);

    let a_values = [3.0, 1.0, 2.0, -1.0, 0.5, -2.5, 4.0, 0.0, 3.0, 1.0, 2.0, -1.0, 0.5, -2.5, 4.0, 0.0];
    let b_values = [1.0, 3.0, 2.0, -3.0, 1.5, -0.5, 0.0, 0.0, 1.0, 3.0, 2.0, -3.0, 1.5, -0.5, 0.0, 0.0];
    let a = encoder.encrypt(&a_values).unwrap();
    let b = encoder.encrypt(&b_values).unwrap();

    let result = evaluator.compare(&a, &b, 8.0).unwrap();
    let got = encoder.decrypt(&result).unwrap();
    for i in 0..16 {
        let want = match a_values[i].partial_cmp(&b_values[i]).unwrap() {
            std::cmp::Ordering::Greater => 1.0,
            std::cmp::Ordering::Less => 0.0,
            std::cmp::Ordering::Equal => 0.5,
        };
        assert!(
            (got[i] - want).abs() < 0.05,
            "compare slot {i}: got {}, want {want}",
            got[i]
        );
    }
}

#[test]
fn min_max_abs_via_sign() {
    let ctx = context(16, 60);
    let encoder = Encoder::new(&ctx).unwrap();
    let evaluator = FunctionEvaluator::new(&ctx);

    let a_values: Vec<f64> = (0..16).map(|i| (i as f64) * 0.4 - 3.0).collect();
    let b_values: Vec<f64> = (0..16).map(|i| 2.5 - (i as f64) * 0.3).collect();
    let a = encoder.encrypt(&a_values).unwrap();
    let b = encoder.encrypt(&b_values).unwrap();

    let minimum = evaluator.min(&a, &b, 8.0).unwrap();
    let maximum = evaluator.max(&a, &b, 8.0).unwrap();
    let got_min = encoder.decrypt(&minimum).unwrap();
    let got_max = encoder.decrypt(&maximum).unwrap();
    for i in 0..16 {
        assert!((got_min[i] - a_values[i].min(b_values[i])).abs() < 0.05, "min slot {i}");
        assert!((got_max[i] - a_values[i].max(b_values[i])).abs() < 0.05, "max slot {i}");
    }

    let magnitude = evaluator.abs(&a, 4.0).unwrap();
    let got_abs = encoder.decrypt(&magnitude).unwrap();
    for i in 0..16 {
        assert!((got_abs[i] - a_values[i].abs()).abs() < 0.05, "abs slot {i}");
    }
}

#[test]
fn inverse_by_newton_iteration() {
    let ctx = context(16, 40);
    let encoder = Encoder::new(&ctx).unwrap();
    let evaluator = FunctionEvaluator::new(&ctx);

    let xs: Vec<f64> = (0..16).map(|i| 0.5 + 0.1 * i as f64).collect();
    let x = encoder.encrypt(&xs).unwrap();
    let result = evaluator.inverse(&x, 2.0, 8).unwrap();
    let got = encoder.decrypt(&result).unwrap();
    for (i, &xi) in xs.iter().enumerate() {
        assert!(
            (got[i] - 1.0 / xi).abs() < 1e-3,
            "1/{xi}: got {}",
            got[i]
        );
    }

    assert!(matches!(
        evaluator.inverse(&x, 0.0, 4),
        Err(HeError::InvalidArgument { .. })
    ));
}

#[test]
fn sqrt_by_wilkes_iteration() {
    let ctx = context(16, 40);
    let encoder = Encoder::new(&ctx).unwrap();
    let evaluator = FunctionEvaluator::new(&ctx);

    let xs: Vec<f64> = (0..16).map(|i| 0.06 * i as f64 + 0.05).collect();
    let x = encoder.encrypt(&xs).unwrap();
    let result = evaluator.sqrt(&x, 8).unwrap();
    let got = encoder.decrypt(&result).unwrap();
    for (i, &xi) in xs.iter().enumerate() {
        assert!(
            (got[i] - xi.sqrt()).abs() < 1e-2,
            "sqrt({xi}): got {}, want {}",
            got[i],
            xi.sqrt()
        );
    }
}

#[test]
fn sigmoid_tracks_the_logistic_on_its_domain() {
    let ctx = context(16, 10);
    let encoder = Encoder::new(&ctx).unwrap();
    let evaluator = FunctionEvaluator::new(&ctx);

    let xs: Vec<f64> = (0..16).map(|i| i as f64 - 7.5).collect();
    let x = encoder.encrypt(&xs).unwrap();
    let result = evaluator.sigmoid(&x).unwrap();
    let got = encoder.decrypt(&result).unwrap();
    for (i, &xi) in xs.iter().enumerate() {
        let want = 1.0 / (1.0 + (-xi).exp());
        assert!(
            (got[i] - want).abs() < 0.04,
            "sigmoid({xi}): got {}, want {want}",
            got[i]
        );
    }
}
