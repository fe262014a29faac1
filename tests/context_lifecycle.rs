//! Context negotiation, persistence and the estimation backend.

use hetile::backend::cleartext::CleartextBackend;
use hetile::{
    BackendRegistry, BootstrapConfig, Device, Encoder, HeConfigRequirement, HeContext, HeError,
    OpType, Saveable,
};
use std::sync::Arc;

fn basic_requirement() -> HeConfigRequirement {
    HeConfigRequirement::new(16, 3, 40, 10)
}

#[test]
fn init_is_a_one_way_state_machine() {
    let mut ctx = HeContext::cleartext();
    assert!(!ctx.is_initialized());
    assert!(matches!(ctx.slot_count(), Err(HeError::NotInitialized)));

    ctx.init(&basic_requirement()).unwrap();
    assert!(ctx.is_initialized());
    assert_eq!(ctx.slot_count().unwrap(), 16);
    assert_eq!(ctx.top_chain_index().unwrap(), 3);
    assert_ne!(ctx.context_id(), 0);

    assert!(matches!(
        ctx.init(&basic_requirement()),
        Err(HeError::AlreadyInitialized)
    ));
}

#[test]
fn incomplete_requirements_are_rejected_before_negotiation() {
    let mut ctx = HeContext::cleartext();
    assert!(matches!(
        ctx.init(&HeConfigRequirement::default()),
        Err(HeError::InvalidArgument { .. })
    ));

    let mut partial = HeConfigRequirement::default();
    partial.num_slots = 16;
    partial.multiplication_depth = 2;
    assert!(matches!(
        ctx.init(&partial),
        Err(HeError::InvalidArgument { .. })
    ));
}

#[test]
fn negotiation_upgrades_and_is_idempotent() {
    let ctx = HeContext::cleartext();
    let req = HeConfigRequirement::new(100, 3, 40, 10);
    assert!(!ctx.is_config_requirement_feasible(&req));

    let actual = ctx.actual_config_requirement(&req).unwrap();
    assert_eq!(actual.num_slots, 128);
    assert!(ctx.is_config_requirement_feasible(&actual));
    assert_eq!(ctx.actual_config_requirement(&actual).unwrap(), actual);

    let infeasible = HeConfigRequirement::new(16, 1000, 40, 10);
    assert!(matches!(
        ctx.actual_config_requirement(&infeasible),
        Err(HeError::Infeasible { .. })
    ));
}

#[test]
fn feasibility_searches_walk_single_fields() {
    let ctx = HeContext::cleartext();
    let req = basic_requirement();
    assert_eq!(ctx.best_feasible_fractional_part_precision(&req), Some(60));
    assert_eq!(ctx.best_feasible_mul_depth(&req), Some(64));
    assert_eq!(ctx.min_feasible_num_slots(&req), Some(2));

    // No fractional precision can rescue an out-of-range integer precision.
    let mut wide = req.clone();
    wide.integer_part_precision = 65;
    assert_eq!(ctx.best_feasible_fractional_part_precision(&wide), None);
}

#[test]
fn context_save_load_round_trip() {
    let mut original = HeContext::new(Box::new(CleartextBackend::with_seed(11)));
    original.init(&basic_requirement()).unwrap();
    let original = Arc::new(original);
    let encoder = Encoder::new(&original).unwrap();

    let mut ctx_bytes = Vec::new();
    original.save(&mut ctx_bytes).unwrap();
    let mut restored = HeContext::load(&mut ctx_bytes.as_slice(), &BackendRegistry::default())
        .unwrap();

    assert!(restored.is_initialized());
    assert_eq!(restored.context_id(), original.context_id());
    assert_eq!(restored.slot_count().unwrap(), 16);
    assert_eq!(restored.top_chain_index().unwrap(), 3);
    // The secret key never travels with the context body.
    assert!(!restored.has_secret_key());

    let mut key_bytes = Vec::new();
    original.save_secret_key(&mut key_bytes, false).unwrap();
    restored.load_secret_key(&mut key_bytes.as_slice()).unwrap();
    assert!(restored.has_secret_key());

    // A tile written under the original context loads under the restored one.
    let values = [1.5, -0.5, 2.0, 0.0, 3.25, 1.0, -2.0, 0.75];
    let tile = encoder.encrypt(&values).unwrap();
    let mut tile_bytes = Vec::new();
    tile.save(&mut tile_bytes).unwrap();

    let restored = Arc::new(restored);
    let loaded = hetile::CTile::load(&mut tile_bytes.as_slice(), &restored).unwrap();
    let decrypted = Encoder::new(&restored).unwrap().decrypt(&loaded).unwrap();
    for (got, want) in decrypted.iter().zip(&values) {
        assert!((got - want).abs() < 1e-6);
    }
}

#[test]
fn seed_only_secret_keys_regenerate_identical_material() {
    let mut ctx = HeContext::new(Box::new(CleartextBackend::with_seed(23)));
    ctx.init(&basic_requirement()).unwrap();

    let mut full = Vec::new();
    ctx.save_secret_key(&mut full, false).unwrap();
    let mut seed_only = Vec::new();
    ctx.save_secret_key(&mut seed_only, true).unwrap();
    assert!(seed_only.len() < full.len());

    ctx.load_secret_key(&mut seed_only.as_slice()).unwrap();
    let mut regenerated = Vec::new();
    ctx.save_secret_key(&mut regenerated, false).unwrap();
    assert_eq!(full, regenerated);
}

#[test]
fn secret_key_loads_are_bound_to_the_context_id() {
    let mut a = HeContext::cleartext();
    a.init(&basic_requirement()).unwrap();
    let mut b = HeContext::cleartext();
    b.init(&basic_requirement()).unwrap();

    let mut key_bytes = Vec::new();
    a.save_secret_key(&mut key_bytes, false).unwrap();
    assert!(matches!(
        b.load_secret_key(&mut key_bytes.as_slice()),
        Err(HeError::ContextIdMismatch { .. })
    ));
}

#[test]
fn bootstrap_restores_the_chain_index() {
    let mut ctx = HeContext::new(Box::new(CleartextBackend::with_seed(5)));
    let req = HeConfigRequirement::new(16, 6, 40, 10).with_bootstrappable(None);
    ctx.init(&req).unwrap();
    let ctx = Arc::new(ctx);
    assert!(ctx.is_bootstrappable());

    let encoder = Encoder::new(&ctx).unwrap();
    let values: Vec<f64> = (0..16).map(|i| (i as f64) / 16.0 - 0.5).collect();
    let mut tile = encoder.encrypt(&values).unwrap();
    tile.set_chain_index(1).unwrap();

    tile.bootstrap().unwrap();
    assert_eq!(tile.chain_index(), 6);
    let got = encoder.decrypt(&tile).unwrap();
    for (i, (g, w)) in got.iter().zip(&values).enumerate() {
        assert!((g - w).abs() < 1e-3, "slot {i}: {g} vs {w}");
    }
}

#[test]
fn non_bootstrappable_contexts_say_so() {
    let mut ctx = HeContext::cleartext();
    ctx.init(&basic_requirement()).unwrap();
    let ctx = Arc::new(ctx);
    assert!(!ctx.is_bootstrappable());

    let mut tile = Encoder::new(&ctx).unwrap().encrypt(&[0.5; 16]).unwrap();
    assert!(matches!(tile.bootstrap(), Err(HeError::NotBootstrappable)));
}

#[test]
fn automatic_bootstrapping_keeps_deep_circuits_alive() {
    let mut ctx = HeContext::new(Box::new(CleartextBackend::with_seed(17)));
    let req = HeConfigRequirement::new(16, 3, 40, 10)
        .with_bootstrappable(Some(BootstrapConfig::default()))
        .with_automatic_bootstrapping(true);
    ctx.init(&req).unwrap();
    let ctx = Arc::new(ctx);
    let encoder = Encoder::new(&ctx).unwrap();

    // Eight squarings through a depth-3 chain; impossible without recryption.
    let mut tile = encoder.encrypt(&[0.99; 16]).unwrap();
    for _ in 0..8 {
        tile.square().unwrap();
    }
    let want = 0.99f64.powi(256);
    let got = encoder.decrypt(&tile).unwrap();
    assert!(
        (got[0] - want).abs() < 1e-2,
        "0.99^256: got {}, want {want}",
        got[0]
    );

    // The knob can be turned off after sharing.
    ctx.set_automatic_bootstrapping(false);
    let mut starved = encoder.encrypt(&[0.5; 16]).unwrap();
    starved.set_chain_index(0).unwrap();
    assert!(matches!(
        starved.square(),
        Err(HeError::ChainIndexExhausted)
    ));
}

#[test]
fn mockup_counts_operations_and_refuses_decryption() {
    let mut ctx = HeContext::mockup();
    ctx.init(&HeConfigRequirement::new(16, 4, 40, 10)).unwrap();
    let ctx = Arc::new(ctx);
    let encoder = Encoder::new(&ctx).unwrap();

    let mut a = encoder.encrypt(&[0.0; 16]).unwrap();
    let b = encoder.encrypt(&[0.0; 16]).unwrap();
    a.multiply(&b).unwrap();
    a.add(&b).unwrap();
    a.rotate(3).unwrap();

    assert!(matches!(
        encoder.decrypt(&a),
        Err(HeError::NotSupported { .. })
    ));
    assert!(matches!(a.scale(), Err(HeError::ScaleUnsupported)));

    let stats = ctx.run_stats().unwrap();
    assert_eq!(stats.count(OpType::Encrypt), 2);
    assert_eq!(stats.count(OpType::Multiply), 1);
    assert_eq!(stats.count(OpType::Relinearize), 1);
    assert_eq!(stats.count(OpType::Rescale), 1);
    assert_eq!(stats.count(OpType::Add), 1);
    // rotate(3) decomposes into two supported power-of-two steps.
    assert_eq!(stats.count(OpType::Rotate), 2);
    assert_eq!(stats.count_at(OpType::Multiply, 4), 1);

    ctx.reset_run_stats();
    assert_eq!(ctx.run_stats().unwrap().count(OpType::Multiply), 0);
}

#[test]
fn mockup_estimates_runtime_from_a_latency_table() {
    let mut ctx = HeContext::mockup();
    ctx.init(&HeConfigRequirement::new(16, 4, 40, 10)).unwrap();
    let ctx = Arc::new(ctx);
    let encoder = Encoder::new(&ctx).unwrap();

    let mut a = encoder.encrypt(&[0.0; 16]).unwrap();
    let b = encoder.encrypt(&[0.0; 16]).unwrap();
    a.multiply(&b).unwrap();

    let table = serde_json::json!({
        "encrypt": 10.0,
        "multiply": 25.0,
        "relinearize": 8.0,
        "rescale": 4.0,
    });
    let stats = ctx.run_stats().unwrap();
    let estimate = stats.estimated_time(&table);
    assert!((estimate - (2.0 * 10.0 + 25.0 + 8.0 + 4.0)).abs() < 1e-9);
}

#[test]
fn default_device_is_cpu_and_gpu_is_gated_by_traits() {
    let mut ctx = HeContext::cleartext();
    ctx.init(&basic_requirement()).unwrap();
    assert_eq!(ctx.default_device(), Device::Cpu);
    assert!(matches!(
        ctx.set_default_device(Device::Gpu),
        Err(HeError::NotSupported { .. })
    ));
    assert_eq!(ctx.default_device(), Device::Cpu);
}

#[test]
fn default_scale_follows_the_fractional_precision() {
    let mut ctx = HeContext::cleartext();
    ctx.init(&basic_requirement()).unwrap();
    assert_eq!(ctx.default_scale(), (40.0f64).exp2());
    ctx.set_default_scale((30.0f64).exp2());
    assert_eq!(ctx.default_scale(), (30.0f64).exp2());
}
