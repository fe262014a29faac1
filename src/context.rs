//! The context: owner of keys, parameters and tile factories.

use crate::backend::{BackendRegistry, Device, HeBackend};
use crate::bootstrap::BootstrapEvaluator;
use crate::config::{BootstrapConfig, HeConfigRequirement, PublicFunctions};
use crate::error::{HeError, HeResult};
use crate::rotate::RotateDependencyMapper;
use crate::save::{Saveable, SaveableHeader, read_body, write_body};
use crate::stats::RunStats;
use crate::traits::{Capability, HeTraits};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};

const SECRET_KEY_CLASS: &str = "SecretKey";

/// A scheme context: negotiates a configuration requirement, owns the
/// resulting parameters and key material, and produces tiles bound to it.
///
/// One-way state machine: `Uninitialized → Initialized`. Every query that
/// depends on parameters fails before [`HeContext::init`] succeeded, and
/// `init` itself fails when called twice. After init a context is typically
/// wrapped in an `Arc` and shared by every tile created from it; the few
/// post-share knobs (default scale/device, automatic bootstrapping) are
/// atomics so mutation needs no context-wide lock.
pub struct HeContext {
    backend: Box<dyn HeBackend>,
    initialized: bool,
    context_id: i32,
    public_functions: PublicFunctions,
    bootstrap_config: Option<BootstrapConfig>,
    bootstrap_evaluator: Option<Box<dyn BootstrapEvaluator + Send + Sync>>,
    rotate_mapper: Option<RotateDependencyMapper>,
    default_scale_bits: AtomicU64,
    default_device: AtomicU8,
    automatic_bootstrapping: AtomicBool,
}

#[derive(Serialize, Deserialize)]
struct ContextBody {
    backend_body: Vec<u8>,
    public_functions: PublicFunctions,
    bootstrap_config: Option<BootstrapConfig>,
    default_scale: f64,
    automatic_bootstrapping: bool,
    device_gpu: bool,
}

impl HeContext {
    pub fn new(backend: Box<dyn HeBackend>) -> Self {
        Self {
            backend,
            initialized: false,
            context_id: 0,
            public_functions: PublicFunctions::default(),
            bootstrap_config: None,
            bootstrap_evaluator: None,
            rotate_mapper: None,
            default_scale_bits: AtomicU64::new(1.0f64.to_bits()),
            default_device: AtomicU8::new(0),
            automatic_bootstrapping: AtomicBool::new(false),
        }
    }

    /// Uninitialized context over the value-carrying reference backend.
    pub fn cleartext() -> Self {
        Self::new(Box::new(crate::backend::cleartext::CleartextBackend::new()))
    }

    /// Uninitialized context over the metadata-only estimation backend.
    pub fn mockup() -> Self {
        Self::new(Box::new(crate::backend::mockup::MockupBackend::new()))
    }

    fn validate_init(&self) -> HeResult<()> {
        if !self.initialized {
            return Err(HeError::NotInitialized);
        }
        Ok(())
    }

    fn validate_not_init(&self) -> HeResult<()> {
        if self.initialized {
            return Err(HeError::AlreadyInitialized);
        }
        Ok(())
    }

    /// Negotiates `req` with the backend, derives parameters and key
    /// material, and (when requested) builds the bootstrap evaluator.
    ///
    /// Evaluator construction is the expensive part of a bootstrappable
    /// init; configurations that never bootstrap pay nothing for it.
    pub fn init(&mut self, req: &HeConfigRequirement) -> HeResult<()> {
        self.validate_not_init()?;
        req.assert_complete()?;
        let actual = self.backend.actual_config_requirement(req)?;
        self.backend.init(&actual)?;

        self.rotate_mapper = Some(RotateDependencyMapper::new(
            self.backend.slot_count(),
            &self.backend.supported_rotations(),
        ));
        if actual.bootstrappable {
            let config = actual
                .bootstrap_config
                .clone()
                .ok_or_else(|| HeError::invalid_argument("missing bootstrap config"))?;
            self.bootstrap_evaluator = Some(self.backend.make_bootstrap_evaluator(&config)?);
            self.bootstrap_config = Some(config);
        }

        self.public_functions = actual.public_functions.clone();
        self.default_scale_bits.store(
            (actual.fractional_part_precision as f64).exp2().to_bits(),
            Ordering::Relaxed,
        );
        self.automatic_bootstrapping
            .store(actual.automatic_bootstrapping, Ordering::Relaxed);
        self.context_id = rand::rng().random_range(1..=i32::MAX);
        self.initialized = true;
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn context_id(&self) -> i32 {
        self.context_id
    }

    pub fn traits(&self) -> &HeTraits {
        self.backend.traits()
    }

    pub fn public_functions(&self) -> HeResult<&PublicFunctions> {
        self.validate_init()?;
        Ok(&self.public_functions)
    }

    pub fn slot_count(&self) -> HeResult<usize> {
        self.validate_init()?;
        Ok(self.backend.slot_count())
    }

    pub fn top_chain_index(&self) -> HeResult<i32> {
        self.validate_init()?;
        Ok(self.backend.top_chain_index())
    }

    pub fn min_chain_index(&self) -> HeResult<i32> {
        self.validate_init()?;
        Ok(self.backend.min_chain_index())
    }

    pub fn has_secret_key(&self) -> bool {
        self.backend.has_secret_key()
    }

    pub fn is_bootstrappable(&self) -> bool {
        self.bootstrap_evaluator.is_some()
    }

    pub fn bootstrap_evaluator(&self) -> Option<&(dyn BootstrapEvaluator + Send + Sync)> {
        self.bootstrap_evaluator.as_deref()
    }

    pub fn bootstrap_config(&self) -> Option<&BootstrapConfig> {
        self.bootstrap_config.as_ref()
    }

    pub(crate) fn rotate_mapper(&self) -> HeResult<&RotateDependencyMapper> {
        self.rotate_mapper.as_ref().ok_or(HeError::NotInitialized)
    }

    pub(crate) fn backend(&self) -> &dyn HeBackend {
        self.backend.as_ref()
    }

    pub fn default_scale(&self) -> f64 {
        f64::from_bits(self.default_scale_bits.load(Ordering::Relaxed))
    }

    pub fn set_default_scale(&self, scale: f64) {
        self.default_scale_bits
            .store(scale.to_bits(), Ordering::Relaxed);
    }

    pub fn default_device(&self) -> Device {
        match self.default_device.load(Ordering::Relaxed) {
            0 => Device::Cpu,
            _ => Device::Gpu,
        }
    }

    pub fn set_default_device(&self, device: Device) -> HeResult<()> {
        if device == Device::Gpu && !self.traits().supports(Capability::Gpu) {
            return Err(HeError::not_supported("GPU placement on this backend"));
        }
        self.default_device
            .store(if device == Device::Gpu { 1 } else { 0 }, Ordering::Relaxed);
        Ok(())
    }

    pub fn automatic_bootstrapping(&self) -> bool {
        self.automatic_bootstrapping.load(Ordering::Relaxed)
    }

    pub fn set_automatic_bootstrapping(&self, enabled: bool) {
        self.automatic_bootstrapping.store(enabled, Ordering::Relaxed);
    }

    pub fn run_stats(&self) -> Option<RunStats> {
        self.backend.run_stats()
    }

    pub fn reset_run_stats(&self) {
        self.backend.reset_run_stats()
    }

    // --- feasibility negotiation -----------------------------------------

    pub fn is_config_requirement_feasible(&self, req: &HeConfigRequirement) -> bool {
        self.backend.is_config_requirement_feasible(req)
    }

    /// Upgrades `req` to the nearest configuration the backend supports.
    /// Negotiating an already-feasible requirement is a no-op, so the call
    /// is idempotent.
    pub fn actual_config_requirement(
        &self,
        req: &HeConfigRequirement,
    ) -> HeResult<HeConfigRequirement> {
        self.backend.actual_config_requirement(req)
    }

    /// Highest feasible fractional-part precision with every other field of
    /// `req` fixed, or `None` when no precision is feasible.
    pub fn best_feasible_fractional_part_precision(
        &self,
        req: &HeConfigRequirement,
    ) -> Option<i32> {
        let mut candidate = req.clone();
        (1..=60).rev().find(|&precision| {
            candidate.fractional_part_precision = precision;
            self.backend.is_config_requirement_feasible(&candidate)
        })
    }

    /// Highest feasible multiplication depth with every other field fixed.
    pub fn best_feasible_mul_depth(&self, req: &HeConfigRequirement) -> Option<i32> {
        let mut candidate = req.clone();
        (0..=256).rev().find(|&depth| {
            candidate.multiplication_depth = depth;
            self.backend.is_config_requirement_feasible(&candidate)
        })
    }

    /// Smallest feasible slot count with every other field fixed. Searches
    /// upward over powers of two: HE slot counts are ring-degree bound.
    pub fn min_feasible_num_slots(&self, req: &HeConfigRequirement) -> Option<i64> {
        let mut candidate = req.clone();
        let mut slots: i64 = 2;
        while slots <= 1 << 24 {
            candidate.num_slots = slots;
            if self.backend.is_config_requirement_feasible(&candidate) {
                return Some(slots);
            }
            slots *= 2;
        }
        None
    }

    // --- serialization ----------------------------------------------------

    /// Restores a context saved with [`Saveable::save`], dispatching on the
    /// stored class name through the registry.
    pub fn load<R: Read>(r: &mut R, registry: &BackendRegistry) -> HeResult<Self> {
        let header = SaveableHeader::read_from(r)?;
        let mut backend = registry.create(&header.class_name).ok_or_else(|| {
            HeError::ClassNameMismatch {
                expected: "a registered backend".to_string(),
                actual: header.class_name.clone(),
            }
        })?;
        let body: ContextBody = bincode::deserialize(&read_body(r)?)?;
        backend.load_body(&body.backend_body)?;

        let rotate_mapper = Some(RotateDependencyMapper::new(
            backend.slot_count(),
            &backend.supported_rotations(),
        ));
        let bootstrap_evaluator = match &body.bootstrap_config {
            Some(config) => Some(backend.make_bootstrap_evaluator(config)?),
            None => None,
        };

        Ok(Self {
            backend,
            initialized: true,
            context_id: header.context_id,
            public_functions: body.public_functions,
            bootstrap_config: body.bootstrap_config,
            bootstrap_evaluator,
            rotate_mapper,
            default_scale_bits: AtomicU64::new(body.default_scale.to_bits()),
            default_device: AtomicU8::new(if body.device_gpu { 1 } else { 0 }),
            automatic_bootstrapping: AtomicBool::new(body.automatic_bootstrapping),
        })
    }

    /// Writes the secret-key material, optionally as the regeneration seed
    /// only. Gated on [`HeContext::has_secret_key`].
    pub fn save_secret_key<W: Write>(&self, w: &mut W, seed_only: bool) -> HeResult<()> {
        self.validate_init()?;
        let body = self.backend.save_secret_key(seed_only)?;
        SaveableHeader::new(SECRET_KEY_CLASS, self.context_id).write_to(w)?;
        write_body(w, &body)
    }

    pub fn load_secret_key<R: Read>(&mut self, r: &mut R) -> HeResult<()> {
        self.validate_init()?;
        let header = SaveableHeader::read_from(r)?;
        header.verify_class(SECRET_KEY_CLASS)?;
        header.verify_context_id(self.context_id)?;
        let body = read_body(r)?;
        self.backend.load_secret_key(&body)
    }
}

impl Saveable for HeContext {
    fn class_name(&self) -> &'static str {
        self.backend.name()
    }

    fn context_id(&self) -> i32 {
        self.context_id
    }

    fn save_body(&self) -> HeResult<Vec<u8>> {
        self.validate_init()?;
        let body = ContextBody {
            backend_body: self.backend.save_body()?,
            public_functions: self.public_functions.clone(),
            bootstrap_config: self.bootstrap_config.clone(),
            default_scale: self.default_scale(),
            automatic_bootstrapping: self.automatic_bootstrapping(),
            device_gpu: self.default_device() == Device::Gpu,
        };
        Ok(bincode::serialize(&body)?)
    }
}
