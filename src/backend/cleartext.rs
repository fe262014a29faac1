//! Value-carrying reference backend.
//!
//! Slots hold plain `Complex64` values; "encryption" stores them together
//! with a small Gaussian perturbation matching the configured fractional
//! precision, so that tolerance-based tests behave the way they would
//! against a real approximate scheme. Chain index and scale are tracked
//! with full fidelity, which is the whole point: every bookkeeping path of
//! the tile layer runs against this backend exactly as it would against a
//! CKKS library wrapper.

use crate::backend::{
    AbstractCiphertext, AbstractPlaintext, HeBackend, expect_cipher, expect_plain,
};
use crate::bootstrap::{BootstrapEvaluator, CkksBootstrapEvaluator};
use crate::config::{BootstrapConfig, HeConfigRequirement, RotationSet};
use crate::error::{HeError, HeResult};
use crate::rotate::default_rotation_steps;
use crate::traits::HeTraits;
use num_complex::Complex64;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::sync::Mutex;

pub const CLASS_NAME: &str = "CleartextContext";

const MAX_LOG_SLOTS: u32 = 20;
const MAX_DEPTH: i32 = 64;
const MAX_PRECISION: i32 = 60;
const MAX_TOTAL_PRECISION: i32 = 120;
const KEY_MATERIAL_BYTES: usize = 64;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CleartextParams {
    num_slots: usize,
    top_chain_index: i32,
    fractional_part_precision: i32,
    integer_part_precision: i32,
    base_scale: f64,
    noise_std: f64,
    supported_rotations: Vec<i32>,
}

/// Deterministically expandable secret-key stand-in.
///
/// There is no real lattice key here; the material is a ChaCha20 expansion
/// of a seed, which is enough to exercise the seed-only save/load contract:
/// regenerating from the stored seed must reproduce identical material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct SecretKeyMaterial {
    seed: u64,
    material: Vec<u8>,
}

impl SecretKeyMaterial {
    fn from_seed(seed: u64) -> Self {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let mut material = vec![0u8; KEY_MATERIAL_BYTES];
        rng.fill(&mut material[..]);
        Self { seed, material }
    }
}

#[derive(Debug, Serialize, Deserialize)]
enum SecretKeyBody {
    Seed(u64),
    Full(SecretKeyMaterial),
}

pub struct CleartextBackend {
    traits: HeTraits,
    params: Option<CleartextParams>,
    secret_key: Option<SecretKeyMaterial>,
    rng: Mutex<ChaCha20Rng>,
}

impl CleartextBackend {
    pub fn new() -> Self {
        Self::with_rng(ChaCha20Rng::from_os_rng())
    }

    /// Reproducible variant for tests.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(ChaCha20Rng::seed_from_u64(seed))
    }

    fn with_rng(rng: ChaCha20Rng) -> Self {
        Self {
            traits: HeTraits {
                supports_bootstrapping: true,
                supports_explicit_chain_indices: true,
                chain_index_adjustments_required: true,
                automatic_rescale: false,
                supports_explicit_rescale: true,
                supports_scale_setting: true,
                multiplication_requires_relinearize: true,
                multiplication_requires_rescale: true,
                supports_complex_numbers: true,
                supports_decryption: true,
                is_modular_arithmetic: false,
                arithmetic_modulus: 0,
                is_mockup: true,
                supports_gpu: false,
            },
            params: None,
            secret_key: None,
            rng: Mutex::new(rng),
        }
    }

    fn params(&self) -> HeResult<&CleartextParams> {
        self.params.as_ref().ok_or(HeError::NotInitialized)
    }

    fn pad_values(&self, values: &[Complex64]) -> HeResult<Vec<Complex64>> {
        let num_slots = self.params()?.num_slots;
        if values.len() > num_slots {
            return Err(HeError::invalid_argument(format!(
                "{} values exceed the {} available slots",
                values.len(),
                num_slots
            )));
        }
        let mut slots = values.to_vec();
        slots.resize(num_slots, Complex64::new(0.0, 0.0));
        Ok(slots)
    }
}

impl Default for CleartextBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl HeBackend for CleartextBackend {
    fn name(&self) -> &'static str {
        CLASS_NAME
    }

    fn traits(&self) -> &HeTraits {
        &self.traits
    }

    fn init(&mut self, req: &HeConfigRequirement) -> HeResult<()> {
        let supported_rotations = match &req.public_functions.rotations {
            RotationSet::All => default_rotation_steps(req.num_slots as usize),
            RotationSet::Steps(steps) => steps.clone(),
            RotationSet::None => Vec::new(),
        };
        let base_scale = (req.fractional_part_precision as f64).exp2();
        self.params = Some(CleartextParams {
            num_slots: req.num_slots as usize,
            top_chain_index: req.multiplication_depth,
            fractional_part_precision: req.fractional_part_precision,
            integer_part_precision: req.integer_part_precision,
            base_scale,
            noise_std: (-(req.fractional_part_precision.min(50)) as f64).exp2(),
            supported_rotations,
        });
        let seed = self.rng.lock().unwrap().random();
        self.secret_key = Some(SecretKeyMaterial::from_seed(seed));
        Ok(())
    }

    fn is_config_requirement_feasible(&self, req: &HeConfigRequirement) -> bool {
        let slots_ok = req.num_slots >= 2
            && req.num_slots <= (1i64 << MAX_LOG_SLOTS)
            && (req.num_slots as u64).is_power_of_two();
        slots_ok
            && (0..=MAX_DEPTH).contains(&req.multiplication_depth)
            && (1..=MAX_PRECISION).contains(&req.fractional_part_precision)
            && (0..=MAX_PRECISION).contains(&req.integer_part_precision)
            && req.fractional_part_precision + req.integer_part_precision <= MAX_TOTAL_PRECISION
    }

    fn actual_config_requirement(
        &self,
        req: &HeConfigRequirement,
    ) -> HeResult<HeConfigRequirement> {
        let mut actual = req.clone();
        actual.num_slots = (req.num_slots.max(2) as u64).next_power_of_two() as i64;
        if !self.is_config_requirement_feasible(&actual) {
            return Err(HeError::infeasible(format!(
                "depth {} / precision {}+{} outside this backend's parameter space",
                actual.multiplication_depth,
                actual.integer_part_precision,
                actual.fractional_part_precision
            )));
        }
        Ok(actual)
    }

    fn slot_count(&self) -> usize {
        self.params.as_ref().map_or(0, |p| p.num_slots)
    }

    fn top_chain_index(&self) -> i32 {
        self.params.as_ref().map_or(-1, |p| p.top_chain_index)
    }

    fn supported_rotations(&self) -> Vec<i32> {
        self.params
            .as_ref()
            .map_or_else(Vec::new, |p| p.supported_rotations.clone())
    }

    fn create_cipher(&self) -> HeResult<Box<dyn AbstractCiphertext>> {
        let params = self.params()?;
        Ok(Box::new(CleartextCiphertext::empty(params)))
    }

    fn create_plain(&self) -> HeResult<Box<dyn AbstractPlaintext>> {
        let params = self.params()?;
        Ok(Box::new(CleartextPlaintext {
            values: Vec::new(),
            chain_index: params.top_chain_index,
            scale: params.base_scale,
            slot_count: params.num_slots,
        }))
    }

    fn encode(
        &self,
        values: &[Complex64],
        chain_index: i32,
        scale: f64,
    ) -> HeResult<Box<dyn AbstractPlaintext>> {
        let slots = self.pad_values(values)?;
        let params = self.params()?;
        Ok(Box::new(CleartextPlaintext {
            values: slots,
            chain_index,
            scale,
            slot_count: params.num_slots,
        }))
    }

    fn decode(&self, plain: &dyn AbstractPlaintext) -> HeResult<Vec<Complex64>> {
        let plain = expect_plain::<CleartextPlaintext>(plain, CLASS_NAME)?;
        if plain.values.is_empty() {
            return Err(HeError::EmptyTile { op: "decode" });
        }
        Ok(plain.values.clone())
    }

    fn encrypt(
        &self,
        values: &[Complex64],
        chain_index: i32,
        scale: f64,
    ) -> HeResult<Box<dyn AbstractCiphertext>> {
        let mut slots = self.pad_values(values)?;
        let params = self.params()?;
        let noise = Normal::new(0.0, params.noise_std)
            .map_err(|e| HeError::invalid_argument(e.to_string()))?;
        {
            let mut rng = self.rng.lock().unwrap();
            for v in &mut slots {
                *v += Complex64::new(noise.sample(&mut *rng), noise.sample(&mut *rng));
            }
        }
        Ok(Box::new(CleartextCiphertext {
            values: slots,
            chain_index,
            scale,
            base_scale: params.base_scale,
            slot_count: params.num_slots,
            size: 2,
        }))
    }

    fn decrypt(&self, cipher: &dyn AbstractCiphertext) -> HeResult<Vec<Complex64>> {
        if self.secret_key.is_none() {
            return Err(HeError::MissingSecretKey);
        }
        let cipher = expect_cipher::<CleartextCiphertext>(cipher, CLASS_NAME)?;
        if cipher.values.is_empty() {
            return Err(HeError::EmptyTile { op: "decrypt" });
        }
        Ok(cipher.values.clone())
    }

    fn has_secret_key(&self) -> bool {
        self.secret_key.is_some()
    }

    fn save_secret_key(&self, seed_only: bool) -> HeResult<Vec<u8>> {
        let key = self.secret_key.as_ref().ok_or(HeError::MissingSecretKey)?;
        let body = if seed_only {
            SecretKeyBody::Seed(key.seed)
        } else {
            SecretKeyBody::Full(key.clone())
        };
        Ok(bincode::serialize(&body)?)
    }

    fn load_secret_key(&mut self, body: &[u8]) -> HeResult<()> {
        let body: SecretKeyBody = bincode::deserialize(body)?;
        self.secret_key = Some(match body {
            SecretKeyBody::Seed(seed) => SecretKeyMaterial::from_seed(seed),
            SecretKeyBody::Full(material) => material,
        });
        Ok(())
    }

    fn make_bootstrap_evaluator(
        &self,
        config: &BootstrapConfig,
    ) -> HeResult<Box<dyn BootstrapEvaluator + Send + Sync>> {
        let params = self.params()?;
        Ok(Box::new(CkksBootstrapEvaluator::new(
            config.clone(),
            params.num_slots,
            params.top_chain_index,
        )?))
    }

    fn save_body(&self) -> HeResult<Vec<u8>> {
        // The secret key is deliberately excluded; it has its own gated path.
        Ok(bincode::serialize(self.params()?)?)
    }

    fn load_body(&mut self, body: &[u8]) -> HeResult<()> {
        self.params = Some(bincode::deserialize(body)?);
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleartextCiphertext {
    pub(crate) values: Vec<Complex64>,
    chain_index: i32,
    scale: f64,
    base_scale: f64,
    slot_count: usize,
    /// Number of ciphertext components; 3 after multiplication until
    /// relinearized back to the canonical 2.
    size: usize,
}

impl CleartextCiphertext {
    fn empty(params: &CleartextParams) -> Self {
        Self {
            values: Vec::new(),
            chain_index: params.top_chain_index,
            scale: params.base_scale,
            base_scale: params.base_scale,
            slot_count: params.num_slots,
            size: 2,
        }
    }

    pub(crate) fn base_scale(&self) -> f64 {
        self.base_scale
    }

    fn check_not_empty(&self, op: &'static str) -> HeResult<()> {
        if self.values.is_empty() {
            return Err(HeError::EmptyTile { op });
        }
        Ok(())
    }
}

impl AbstractCiphertext for CleartextCiphertext {
    fn clone_box(&self) -> Box<dyn AbstractCiphertext> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn add_raw(&mut self, other: &dyn AbstractCiphertext) -> HeResult<()> {
        self.check_not_empty("add")?;
        let other = expect_cipher::<Self>(other, CLASS_NAME)?;
        for (a, b) in self.values.iter_mut().zip(&other.values) {
            *a += b;
        }
        Ok(())
    }

    fn sub_raw(&mut self, other: &dyn AbstractCiphertext) -> HeResult<()> {
        self.check_not_empty("sub")?;
        let other = expect_cipher::<Self>(other, CLASS_NAME)?;
        for (a, b) in self.values.iter_mut().zip(&other.values) {
            *a -= b;
        }
        Ok(())
    }

    fn multiply_raw(&mut self, other: &dyn AbstractCiphertext) -> HeResult<()> {
        self.check_not_empty("multiply")?;
        let other = expect_cipher::<Self>(other, CLASS_NAME)?;
        for (a, b) in self.values.iter_mut().zip(&other.values) {
            *a *= b;
        }
        self.scale *= other.scale;
        self.size = 3;
        Ok(())
    }

    fn add_plain_raw(&mut self, other: &dyn AbstractPlaintext) -> HeResult<()> {
        self.check_not_empty("add_plain")?;
        let other = expect_plain::<CleartextPlaintext>(other, CLASS_NAME)?;
        for (a, b) in self.values.iter_mut().zip(&other.values) {
            *a += b;
        }
        Ok(())
    }

    fn sub_plain_raw(&mut self, other: &dyn AbstractPlaintext) -> HeResult<()> {
        self.check_not_empty("sub_plain")?;
        let other = expect_plain::<CleartextPlaintext>(other, CLASS_NAME)?;
        for (a, b) in self.values.iter_mut().zip(&other.values) {
            *a -= b;
        }
        Ok(())
    }

    fn multiply_plain_raw(&mut self, other: &dyn AbstractPlaintext) -> HeResult<()> {
        self.check_not_empty("multiply_plain")?;
        let other = expect_plain::<CleartextPlaintext>(other, CLASS_NAME)?;
        for (a, b) in self.values.iter_mut().zip(&other.values) {
            *a *= b;
        }
        self.scale *= other.scale;
        Ok(())
    }

    fn add_scalar(&mut self, value: f64) -> HeResult<()> {
        self.check_not_empty("add_scalar")?;
        for v in &mut self.values {
            *v += value;
        }
        Ok(())
    }

    fn multiply_scalar(&mut self, value: f64) -> HeResult<()> {
        self.check_not_empty("multiply_scalar")?;
        for v in &mut self.values {
            *v *= value;
        }
        self.scale *= self.base_scale;
        Ok(())
    }

    fn square_raw(&mut self) -> HeResult<()> {
        self.check_not_empty("square")?;
        for v in &mut self.values {
            *v *= *v;
        }
        self.scale *= self.scale;
        self.size = 3;
        Ok(())
    }

    fn negate(&mut self) -> HeResult<()> {
        self.check_not_empty("negate")?;
        for v in &mut self.values {
            *v = -*v;
        }
        Ok(())
    }

    fn conjugate_raw(&mut self) -> HeResult<()> {
        self.check_not_empty("conjugate")?;
        for v in &mut self.values {
            *v = v.conj();
        }
        Ok(())
    }

    fn rotate_raw(&mut self, step: i32) -> HeResult<()> {
        self.check_not_empty("rotate")?;
        let n = self.slot_count as i32;
        let shift = step.rem_euclid(n) as usize;
        if shift != 0 {
            self.values.rotate_left(shift);
        }
        Ok(())
    }

    fn relinearize(&mut self) -> HeResult<()> {
        self.check_not_empty("relinearize")?;
        self.size = 2;
        Ok(())
    }

    fn rescale_raw(&mut self) -> HeResult<()> {
        self.check_not_empty("rescale")?;
        if self.chain_index <= 0 {
            return Err(HeError::ChainIndexExhausted);
        }
        self.chain_index -= 1;
        self.scale /= self.base_scale;
        Ok(())
    }

    fn chain_index(&self) -> i32 {
        self.chain_index
    }

    fn set_chain_index(&mut self, target: i32) -> HeResult<()> {
        if target > self.chain_index {
            return Err(HeError::ChainIndexIncrease {
                current: self.chain_index,
                requested: target,
            });
        }
        if target < 0 {
            return Err(HeError::invalid_argument("negative chain index"));
        }
        self.chain_index = target;
        Ok(())
    }

    fn reduce_chain_index(&mut self) -> HeResult<()> {
        if self.chain_index <= 0 {
            return Err(HeError::ChainIndexExhausted);
        }
        self.chain_index -= 1;
        Ok(())
    }

    fn raise_chain_index(&mut self, target: i32) -> HeResult<()> {
        if target < self.chain_index {
            return Err(HeError::invalid_argument(
                "raise_chain_index below the current chain index",
            ));
        }
        self.chain_index = target;
        Ok(())
    }

    fn scale(&self) -> HeResult<f64> {
        Ok(self.scale)
    }

    fn set_scale(&mut self, scale: f64) -> HeResult<()> {
        if scale <= 0.0 {
            return Err(HeError::invalid_argument("scale must be positive"));
        }
        self.scale = scale;
        Ok(())
    }

    fn slot_count(&self) -> usize {
        self.slot_count
    }

    fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn save_body(&self) -> HeResult<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    fn load_body(&mut self, body: &[u8]) -> HeResult<()> {
        *self = bincode::deserialize(body)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleartextPlaintext {
    pub(crate) values: Vec<Complex64>,
    chain_index: i32,
    scale: f64,
    slot_count: usize,
}

impl AbstractPlaintext for CleartextPlaintext {
    fn clone_box(&self) -> Box<dyn AbstractPlaintext> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn chain_index(&self) -> i32 {
        self.chain_index
    }

    fn set_chain_index(&mut self, target: i32) -> HeResult<()> {
        if target > self.chain_index {
            return Err(HeError::ChainIndexIncrease {
                current: self.chain_index,
                requested: target,
            });
        }
        self.chain_index = target;
        Ok(())
    }

    fn scale(&self) -> HeResult<f64> {
        Ok(self.scale)
    }

    fn set_scale(&mut self, scale: f64) -> HeResult<()> {
        if scale <= 0.0 {
            return Err(HeError::invalid_argument("scale must be positive"));
        }
        self.scale = scale;
        Ok(())
    }

    fn slot_count(&self) -> usize {
        self.slot_count
    }

    fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn save_body(&self) -> HeResult<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    fn load_body(&mut self, body: &[u8]) -> HeResult<()> {
        *self = bincode::deserialize(body)?;
        Ok(())
    }
}
