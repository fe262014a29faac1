//! Metadata-only estimation backend.
//!
//! Ciphertexts carry no payload, only chain index and slot count. Every raw
//! operation is recorded into a shared [`RunStats`] accumulator keyed by
//! (operation, chain index), which is what estimation workflows join against
//! a latency table. Decryption and scale manipulation are unsupported and
//! reported as such, never silently faked.

use crate::backend::{AbstractCiphertext, AbstractPlaintext, HeBackend, expect_cipher};
use crate::bootstrap::BootstrapEvaluator;
use crate::config::{BootstrapConfig, HeConfigRequirement, RotationSet};
use crate::error::{HeError, HeResult};
use crate::rotate::default_rotation_steps;
use crate::stats::{OpType, RunStats};
use crate::tile::CTile;
use crate::traits::HeTraits;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::sync::{Arc, Mutex};

pub const CLASS_NAME: &str = "MockupContext";

const MAX_LOG_SLOTS: u32 = 24;
const MAX_DEPTH: i32 = 128;

type SharedStats = Arc<Mutex<RunStats>>;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MockupParams {
    num_slots: usize,
    top_chain_index: i32,
    supported_rotations: Vec<i32>,
}

pub struct MockupBackend {
    traits: HeTraits,
    params: Option<MockupParams>,
    stats: SharedStats,
}

impl MockupBackend {
    pub fn new() -> Self {
        Self {
            traits: HeTraits {
                supports_bootstrapping: true,
                supports_explicit_chain_indices: true,
                chain_index_adjustments_required: true,
                automatic_rescale: false,
                supports_explicit_rescale: true,
                supports_scale_setting: false,
                multiplication_requires_relinearize: true,
                multiplication_requires_rescale: true,
                supports_complex_numbers: false,
                supports_decryption: false,
                is_modular_arithmetic: false,
                arithmetic_modulus: 0,
                is_mockup: true,
                supports_gpu: false,
            },
            params: None,
            stats: Arc::new(Mutex::new(RunStats::new())),
        }
    }

    fn params(&self) -> HeResult<&MockupParams> {
        self.params.as_ref().ok_or(HeError::NotInitialized)
    }

    fn record(&self, op: OpType, chain_index: i32) {
        self.stats.lock().unwrap().record(op, chain_index);
    }
}

impl Default for MockupBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl HeBackend for MockupBackend {
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
        self.params = Some(MockupParams {
            num_slots: req.num_slots as usize,
            top_chain_index: req.multiplication_depth,
            supported_rotations,
        });
        Ok(())
    }

    fn is_config_requirement_feasible(&self, req: &HeConfigRequirement) -> bool {
        req.num_slots >= 2
            && req.num_slots <= (1i64 << MAX_LOG_SLOTS)
            && (req.num_slots as u64).is_power_of_two()
            && (0..=MAX_DEPTH).contains(&req.multiplication_depth)
            && req.fractional_part_precision >= 1
            && req.integer_part_precision >= 0
    }

    fn actual_config_requirement(
        &self,
        req: &HeConfigRequirement,
    ) -> HeResult<HeConfigRequirement> {
        let mut actual = req.clone();
        actual.num_slots = (req.num_slots.max(2) as u64).next_power_of_two() as i64;
        if !self.is_config_requirement_feasible(&actual) {
            return Err(HeError::infeasible(
                "requirement outside the mockup parameter space",
            ));
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
        Ok(Box::new(MockupCiphertext {
            meta: MockupMeta {
                chain_index: params.top_chain_index,
                slot_count: params.num_slots,
                empty: true,
            },
            stats: Arc::clone(&self.stats),
        }))
    }

    fn create_plain(&self) -> HeResult<Box<dyn AbstractPlaintext>> {
        let params = self.params()?;
        Ok(Box::new(MockupPlaintext {
            meta: MockupMeta {
                chain_index: params.top_chain_index,
                slot_count: params.num_slots,
                empty: true,
            },
        }))
    }

    fn encode(
        &self,
        values: &[Complex64],
        chain_index: i32,
        _scale: f64,
    ) -> HeResult<Box<dyn AbstractPlaintext>> {
        let params = self.params()?;
        if values.len() > params.num_slots {
            return Err(HeError::invalid_argument(format!(
                "{} values exceed the {} available slots",
                values.len(),
                params.num_slots
            )));
        }
        Ok(Box::new(MockupPlaintext {
            meta: MockupMeta {
                chain_index,
                slot_count: params.num_slots,
                empty: false,
            },
        }))
    }

    fn decode(&self, _plain: &dyn AbstractPlaintext) -> HeResult<Vec<Complex64>> {
        Err(HeError::not_supported("decode on a metadata-only context"))
    }

    fn encrypt(
        &self,
        values: &[Complex64],
        chain_index: i32,
        _scale: f64,
    ) -> HeResult<Box<dyn AbstractCiphertext>> {
        let params = self.params()?;
        if values.len() > params.num_slots {
            return Err(HeError::invalid_argument(format!(
                "{} values exceed the {} available slots",
                values.len(),
                params.num_slots
            )));
        }
        self.record(OpType::Encrypt, chain_index);
        Ok(Box::new(MockupCiphertext {
            meta: MockupMeta {
                chain_index,
                slot_count: params.num_slots,
                empty: false,
            },
            stats: Arc::clone(&self.stats),
        }))
    }

    fn decrypt(&self, _cipher: &dyn AbstractCiphertext) -> HeResult<Vec<Complex64>> {
        Err(HeError::not_supported("decrypt on a metadata-only context"))
    }

    fn has_secret_key(&self) -> bool {
        false
    }

    fn save_secret_key(&self, _seed_only: bool) -> HeResult<Vec<u8>> {
        Err(HeError::MissingSecretKey)
    }

    fn load_secret_key(&mut self, _body: &[u8]) -> HeResult<()> {
        Err(HeError::not_supported("secret keys on a metadata-only context"))
    }

    fn make_bootstrap_evaluator(
        &self,
        config: &BootstrapConfig,
    ) -> HeResult<Box<dyn BootstrapEvaluator + Send + Sync>> {
        let params = self.params()?;
        let target = config
            .target_chain_index
            .unwrap_or(params.top_chain_index)
            .min(params.top_chain_index);
        Ok(Box::new(MockupBootstrapEvaluator {
            config: config.clone(),
            target_chain_index: target,
            stats: Arc::clone(&self.stats),
        }))
    }

    fn run_stats(&self) -> Option<RunStats> {
        Some(self.stats.lock().unwrap().clone())
    }

    fn reset_run_stats(&self) {
        self.stats.lock().unwrap().reset();
    }

    fn save_body(&self) -> HeResult<Vec<u8>> {
        Ok(bincode::serialize(self.params()?)?)
    }

    fn load_body(&mut self, body: &[u8]) -> HeResult<()> {
        self.params = Some(bincode::deserialize(body)?);
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MockupMeta {
    chain_index: i32,
    slot_count: usize,
    empty: bool,
}

pub struct MockupCiphertext {
    meta: MockupMeta,
    stats: SharedStats,
}

impl MockupCiphertext {
    fn record(&self, op: OpType) {
        self.stats.lock().unwrap().record(op, self.meta.chain_index);
    }

    fn check_not_empty(&self, op: &'static str) -> HeResult<()> {
        if self.meta.empty {
            return Err(HeError::EmptyTile { op });
        }
        Ok(())
    }

    fn counted_op(&mut self, op: OpType, name: &'static str) -> HeResult<()> {
        self.check_not_empty(name)?;
        self.record(op);
        Ok(())
    }
}

impl AbstractCiphertext for MockupCiphertext {
    fn clone_box(&self) -> Box<dyn AbstractCiphertext> {
        Box::new(MockupCiphertext {
            meta: self.meta.clone(),
            stats: Arc::clone(&self.stats),
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn add_raw(&mut self, other: &dyn AbstractCiphertext) -> HeResult<()> {
        expect_cipher::<Self>(other, CLASS_NAME)?;
        self.counted_op(OpType::Add, "add")
    }

    fn sub_raw(&mut self, other: &dyn AbstractCiphertext) -> HeResult<()> {
        expect_cipher::<Self>(other, CLASS_NAME)?;
        self.counted_op(OpType::Sub, "sub")
    }

    fn multiply_raw(&mut self, other: &dyn AbstractCiphertext) -> HeResult<()> {
        expect_cipher::<Self>(other, CLASS_NAME)?;
        self.counted_op(OpType::Multiply, "multiply")
    }

    fn add_plain_raw(&mut self, _other: &dyn AbstractPlaintext) -> HeResult<()> {
        self.counted_op(OpType::AddPlain, "add_plain")
    }

    fn sub_plain_raw(&mut self, _other: &dyn AbstractPlaintext) -> HeResult<()> {
        self.counted_op(OpType::SubPlain, "sub_plain")
    }

    fn multiply_plain_raw(&mut self, _other: &dyn AbstractPlaintext) -> HeResult<()> {
        self.counted_op(OpType::MultiplyPlain, "multiply_plain")
    }

    fn add_scalar(&mut self, _value: f64) -> HeResult<()> {
        self.counted_op(OpType::AddScalar, "add_scalar")
    }

    fn multiply_scalar(&mut self, _value: f64) -> HeResult<()> {
        self.counted_op(OpType::MultiplyScalar, "multiply_scalar")
    }

    fn square_raw(&mut self) -> HeResult<()> {
        self.counted_op(OpType::Square, "square")
    }

    fn negate(&mut self) -> HeResult<()> {
        self.counted_op(OpType::Negate, "negate")
    }

    fn conjugate_raw(&mut self) -> HeResult<()> {
        Err(HeError::not_supported("conjugation on a real-only context"))
    }

    fn rotate_raw(&mut self, _step: i32) -> HeResult<()> {
        self.counted_op(OpType::Rotate, "rotate")
    }

    fn relinearize(&mut self) -> HeResult<()> {
        self.counted_op(OpType::Relinearize, "relinearize")
    }

    fn rescale_raw(&mut self) -> HeResult<()> {
        self.check_not_empty("rescale")?;
        if self.meta.chain_index <= 0 {
            return Err(HeError::ChainIndexExhausted);
        }
        self.record(OpType::Rescale);
        self.meta.chain_index -= 1;
        Ok(())
    }

    fn chain_index(&self) -> i32 {
        self.meta.chain_index
    }

    fn set_chain_index(&mut self, target: i32) -> HeResult<()> {
        if target > self.meta.chain_index {
            return Err(HeError::ChainIndexIncrease {
                current: self.meta.chain_index,
                requested: target,
            });
        }
        if target < 0 {
            return Err(HeError::invalid_argument("negative chain index"));
        }
        self.meta.chain_index = target;
        Ok(())
    }

    fn reduce_chain_index(&mut self) -> HeResult<()> {
        if self.meta.chain_index <= 0 {
            return Err(HeError::ChainIndexExhausted);
        }
        self.record(OpType::ReduceChainIndex);
        self.meta.chain_index -= 1;
        Ok(())
    }

    fn raise_chain_index(&mut self, target: i32) -> HeResult<()> {
        if target < self.meta.chain_index {
            return Err(HeError::invalid_argument(
                "raise_chain_index below the current chain index",
            ));
        }
        self.meta.chain_index = target;
        Ok(())
    }

    fn scale(&self) -> HeResult<f64> {
        Err(HeError::ScaleUnsupported)
    }

    fn set_scale(&mut self, _scale: f64) -> HeResult<()> {
        Err(HeError::ScaleUnsupported)
    }

    fn slot_count(&self) -> usize {
        self.meta.slot_count
    }

    fn is_empty(&self) -> bool {
        self.meta.empty
    }

    fn save_body(&self) -> HeResult<Vec<u8>> {
        Ok(bincode::serialize(&self.meta)?)
    }

    fn load_body(&mut self, body: &[u8]) -> HeResult<()> {
        self.meta = bincode::deserialize(body)?;
        Ok(())
    }
}

pub struct MockupPlaintext {
    meta: MockupMeta,
}

impl AbstractPlaintext for MockupPlaintext {
    fn clone_box(&self) -> Box<dyn AbstractPlaintext> {
        Box::new(MockupPlaintext {
            meta: self.meta.clone(),
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn chain_index(&self) -> i32 {
        self.meta.chain_index
    }

    fn set_chain_index(&mut self, target: i32) -> HeResult<()> {
        if target > self.meta.chain_index {
            return Err(HeError::ChainIndexIncrease {
                current: self.meta.chain_index,
                requested: target,
            });
        }
        self.meta.chain_index = target;
        Ok(())
    }

    fn scale(&self) -> HeResult<f64> {
        Err(HeError::ScaleUnsupported)
    }

    fn set_scale(&mut self, _scale: f64) -> HeResult<()> {
        Err(HeError::ScaleUnsupported)
    }

    fn slot_count(&self) -> usize {
        self.meta.slot_count
    }

    fn is_empty(&self) -> bool {
        self.meta.empty
    }

    fn save_body(&self) -> HeResult<Vec<u8>> {
        Ok(bincode::serialize(&self.meta)?)
    }

    fn load_body(&mut self, body: &[u8]) -> HeResult<()> {
        self.meta = bincode::deserialize(body)?;
        Ok(())
    }
}

/// Bootstrap for estimation runs: no approximation pipeline, just the
/// chain-index reset and an operation count.
struct MockupBootstrapEvaluator {
    config: BootstrapConfig,
    target_chain_index: i32,
    stats: SharedStats,
}

impl BootstrapEvaluator for MockupBootstrapEvaluator {
    fn config(&self) -> &BootstrapConfig {
        &self.config
    }

    fn min_chain_index_for_bootstrapping(&self) -> i32 {
        1
    }

    fn chain_index_after_bootstrapping(&self) -> i32 {
        self.target_chain_index
    }

    fn bootstrap(&self, tile: &mut CTile) -> HeResult<()> {
        if tile.is_empty() {
            return Err(HeError::EmptyTile { op: "bootstrap" });
        }
        self.stats
            .lock()
            .unwrap()
            .record(OpType::Bootstrap, tile.chain_index());
        tile.inner_mut().raise_chain_index(self.target_chain_index)
    }
}
