//! Backend seams: the polymorphic capability objects the tile layer
//! dispatches to.
//!
//! The core never performs lattice math itself. A backend supplies opaque
//! ciphertext/plaintext objects implementing the raw scheme operations plus a
//! context object owning parameters and key material; the tile layer only
//! orchestrates *when* and *in what order* those operations happen.

pub mod cleartext;
pub mod mockup;

use crate::bootstrap::BootstrapEvaluator;
use crate::config::{BootstrapConfig, HeConfigRequirement};
use crate::error::{HeError, HeResult};
use crate::stats::RunStats;
use crate::traits::HeTraits;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::HashMap;

/// Where a tile's payload lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Device {
    #[default]
    Cpu,
    Gpu,
}

/// Raw per-backend ciphertext operations.
///
/// Implementations perform only the literal algebra; relinearize/rescale
/// timing, chain-index reconciliation and bootstrap triggering are the tile
/// layer's job. `rotate_raw` accepts only the natively supported steps;
/// arbitrary amounts are decomposed by the rotate dependency mapper before
/// reaching the backend.
pub trait AbstractCiphertext: Send {
    fn clone_box(&self) -> Box<dyn AbstractCiphertext>;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;

    fn add_raw(&mut self, other: &dyn AbstractCiphertext) -> HeResult<()>;
    fn sub_raw(&mut self, other: &dyn AbstractCiphertext) -> HeResult<()>;
    fn multiply_raw(&mut self, other: &dyn AbstractCiphertext) -> HeResult<()>;
    fn add_plain_raw(&mut self, other: &dyn AbstractPlaintext) -> HeResult<()>;
    fn sub_plain_raw(&mut self, other: &dyn AbstractPlaintext) -> HeResult<()>;
    fn multiply_plain_raw(&mut self, other: &dyn AbstractPlaintext) -> HeResult<()>;
    fn add_scalar(&mut self, value: f64) -> HeResult<()>;
    fn multiply_scalar(&mut self, value: f64) -> HeResult<()>;
    fn square_raw(&mut self) -> HeResult<()>;
    fn negate(&mut self) -> HeResult<()>;
    fn conjugate_raw(&mut self) -> HeResult<()>;
    fn rotate_raw(&mut self, step: i32) -> HeResult<()>;

    fn relinearize(&mut self) -> HeResult<()>;
    fn rescale_raw(&mut self) -> HeResult<()>;

    fn chain_index(&self) -> i32;
    /// Lowers the chain index to `target`; increasing it this way is illegal.
    fn set_chain_index(&mut self, target: i32) -> HeResult<()>;
    fn reduce_chain_index(&mut self) -> HeResult<()>;
    /// Raises the chain index. Reserved for bootstrap evaluators.
    fn raise_chain_index(&mut self, target: i32) -> HeResult<()>;

    fn scale(&self) -> HeResult<f64>;
    fn set_scale(&mut self, scale: f64) -> HeResult<()>;

    fn slot_count(&self) -> usize;
    fn is_empty(&self) -> bool;

    fn save_body(&self) -> HeResult<Vec<u8>>;
    fn load_body(&mut self, body: &[u8]) -> HeResult<()>;
}

/// Raw per-backend plaintext operations.
pub trait AbstractPlaintext: Send {
    fn clone_box(&self) -> Box<dyn AbstractPlaintext>;
    fn as_any(&self) -> &dyn Any;

    fn chain_index(&self) -> i32;
    fn set_chain_index(&mut self, target: i32) -> HeResult<()>;
    fn scale(&self) -> HeResult<f64>;
    fn set_scale(&mut self, scale: f64) -> HeResult<()>;
    fn slot_count(&self) -> usize;
    fn is_empty(&self) -> bool;

    fn save_body(&self) -> HeResult<Vec<u8>>;
    fn load_body(&mut self, body: &[u8]) -> HeResult<()>;
}

/// A context backend: owns scheme parameters and key material, negotiates
/// configuration feasibility and produces tile payload objects.
pub trait HeBackend: Send + Sync {
    /// Stable class name, also used as the registry key and the stored
    /// header class name.
    fn name(&self) -> &'static str;

    fn traits(&self) -> &HeTraits;

    /// Derives parameters and key material from an already-validated
    /// requirement. Called exactly once.
    fn init(&mut self, req: &HeConfigRequirement) -> HeResult<()>;

    fn is_config_requirement_feasible(&self, req: &HeConfigRequirement) -> bool;

    /// Upgrades individual fields of `req` to the nearest values this
    /// backend supports (e.g. slot counts to powers of two). Errors when no
    /// upgrade produces a feasible requirement.
    fn actual_config_requirement(
        &self,
        req: &HeConfigRequirement,
    ) -> HeResult<HeConfigRequirement>;

    fn slot_count(&self) -> usize;
    fn top_chain_index(&self) -> i32;
    /// Lowest chain index at which ciphertexts remain usable.
    fn min_chain_index(&self) -> i32 {
        0
    }

    /// Rotation steps natively supported by the generated keys.
    fn supported_rotations(&self) -> Vec<i32>;

    fn create_cipher(&self) -> HeResult<Box<dyn AbstractCiphertext>>;
    fn create_plain(&self) -> HeResult<Box<dyn AbstractPlaintext>>;

    fn encode(
        &self,
        values: &[Complex64],
        chain_index: i32,
        scale: f64,
    ) -> HeResult<Box<dyn AbstractPlaintext>>;
    fn decode(&self, plain: &dyn AbstractPlaintext) -> HeResult<Vec<Complex64>>;
    fn encrypt(
        &self,
        values: &[Complex64],
        chain_index: i32,
        scale: f64,
    ) -> HeResult<Box<dyn AbstractCiphertext>>;
    fn decrypt(&self, cipher: &dyn AbstractCiphertext) -> HeResult<Vec<Complex64>>;

    fn has_secret_key(&self) -> bool;
    /// Secret-key material, either in full or as the PRNG seed it can be
    /// deterministically regenerated from. Seed-only storage is a strict
    /// size/content trade-off.
    fn save_secret_key(&self, seed_only: bool) -> HeResult<Vec<u8>>;
    fn load_secret_key(&mut self, body: &[u8]) -> HeResult<()>;

    fn make_bootstrap_evaluator(
        &self,
        config: &BootstrapConfig,
    ) -> HeResult<Box<dyn BootstrapEvaluator + Send + Sync>>;

    /// Snapshot of the operation counters, for estimation backends.
    fn run_stats(&self) -> Option<RunStats> {
        None
    }
    fn reset_run_stats(&self) {}

    fn save_body(&self) -> HeResult<Vec<u8>>;
    fn load_body(&mut self, body: &[u8]) -> HeResult<()>;
}

/// Downcast helper for binary raw operations: backends only interoperate
/// with payloads of their own concrete type.
pub(crate) fn expect_cipher<'a, T: 'static>(
    other: &'a dyn AbstractCiphertext,
    backend: &str,
) -> HeResult<&'a T> {
    other
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| HeError::invalid_argument(format!("foreign ciphertext passed to {backend}")))
}

pub(crate) fn expect_plain<'a, T: 'static>(
    other: &'a dyn AbstractPlaintext,
    backend: &str,
) -> HeResult<&'a T> {
    other
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| HeError::invalid_argument(format!("foreign plaintext passed to {backend}")))
}

type BackendFactory = fn() -> Box<dyn HeBackend>;

/// Explicit process-wide registry of compiled-in backends.
///
/// Built by listing the built-in factories at construction time; no
/// static-initialization registration tricks. `HeContext::load` uses it to
/// reconstruct a context from the class name stored in a saved header.
pub struct BackendRegistry {
    factories: HashMap<&'static str, BackendFactory>,
}

impl BackendRegistry {
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry pre-populated with all built-in backends.
    pub fn with_builtin() -> Self {
        let mut registry = Self::empty();
        registry.register(cleartext::CLASS_NAME, || {
            Box::new(cleartext::CleartextBackend::new())
        });
        registry.register(mockup::CLASS_NAME, || Box::new(mockup::MockupBackend::new()));
        registry
    }

    pub fn register(&mut self, name: &'static str, factory: BackendFactory) {
        self.factories.insert(name, factory);
    }

    pub fn create(&self, name: &str) -> Option<Box<dyn HeBackend>> {
        self.factories.get(name).map(|f| f())
    }

    pub fn registered_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.factories.keys().copied()
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}
