use crate::backend::{AbstractCiphertext, Device};
use crate::context::HeContext;
use crate::error::{HeError, HeResult};
use crate::save::{Saveable, SaveableHeader, read_body};
use crate::tile::{PTile, Tile};
use crate::traits::Capability;
use std::io::Read;
use std::sync::Arc;

const CLASS_NAME: &str = "CTile";

/// A ciphertext tile.
///
/// Value semantics: `Clone` deep-copies the backend payload. Managed
/// operations run the full binary-op protocol (context check, chain-index
/// equalization, automatic bootstrap, post-multiply relinearize/rescale);
/// the `_raw` variants delegate straight to the backend.
pub struct CTile {
    context: Arc<HeContext>,
    inner: Box<dyn AbstractCiphertext>,
}

impl Clone for CTile {
    fn clone(&self) -> Self {
        Self {
            context: Arc::clone(&self.context),
            inner: self.inner.clone_box(),
        }
    }
}

impl CTile {
    /// An empty tile bound to `context`; most operations on it fail with
    /// `EmptyTile` until it is loaded or encrypted into.
    pub fn new(context: &Arc<HeContext>) -> HeResult<Self> {
        Ok(Self {
            context: Arc::clone(context),
            inner: context.backend().create_cipher()?,
        })
    }

    pub(crate) fn from_parts(
        context: &Arc<HeContext>,
        inner: Box<dyn AbstractCiphertext>,
    ) -> Self {
        Self {
            context: Arc::clone(context),
            inner,
        }
    }

    pub fn context(&self) -> &Arc<HeContext> {
        &self.context
    }

    pub(crate) fn inner_ref(&self) -> &dyn AbstractCiphertext {
        self.inner.as_ref()
    }

    pub(crate) fn inner_mut(&mut self) -> &mut dyn AbstractCiphertext {
        self.inner.as_mut()
    }

    fn check_context(&self, other_context_id: i32) -> HeResult<()> {
        if self.context.context_id() != other_context_id {
            return Err(HeError::ContextMismatch {
                expected: self.context.context_id(),
                actual: other_context_id,
            });
        }
        Ok(())
    }

    /// Bootstraps `self` when automatic bootstrapping is on and the chain
    /// index dropped below the evaluator's minimum. Entry point of every
    /// managed multiplying operation.
    fn auto_bootstrap(&mut self) -> HeResult<()> {
        let context = Arc::clone(&self.context);
        if !context.automatic_bootstrapping() {
            return Ok(());
        }
        if let Some(evaluator) = context.bootstrap_evaluator() {
            if self.chain_index() < evaluator.min_chain_index_for_bootstrapping() {
                evaluator.bootstrap(self)?;
            }
        }
        Ok(())
    }

    /// The shared front half of every managed binary operation. Returns an
    /// adjusted copy of `other` when it had to be modified; the caller uses
    /// the copy in place of the original. `self` is adjusted in place.
    fn prepare_binary(&mut self, other: &CTile) -> HeResult<Option<CTile>> {
        self.check_context(other.context.context_id())?;
        let context = Arc::clone(&self.context);
        let mut adjusted: Option<CTile> = None;

        if context.automatic_bootstrapping() {
            if let Some(evaluator) = context.bootstrap_evaluator() {
                let min = evaluator.min_chain_index_for_bootstrapping();
                if self.chain_index() < min {
                    evaluator.bootstrap(self)?;
                }
                if other.chain_index() < min {
                    let mut copy = other.clone();
                    evaluator.bootstrap(&mut copy)?;
                    adjusted = Some(copy);
                }
            }
        }

        if context.traits().chain_index_adjustments_required {
            let other_index = adjusted
                .as_ref()
                .map_or_else(|| other.chain_index(), |t| t.chain_index());
            let target = self.chain_index().min(other_index);
            if self.chain_index() > target {
                self.inner.set_chain_index(target)?;
            }
            if other_index > target {
                let mut copy = adjusted.take().unwrap_or_else(|| other.clone());
                copy.inner.set_chain_index(target)?;
                adjusted = Some(copy);
            }
        }

        Ok(adjusted)
    }

    /// Chain-index reconciliation against a plaintext operand. Plaintexts
    /// are cheap to adjust, so the higher side always moves.
    fn prepare_plain(&mut self, other: &PTile) -> HeResult<Option<PTile>> {
        self.check_context(other.context_id())?;
        if !self.context.traits().chain_index_adjustments_required {
            return Ok(None);
        }
        let target = self.chain_index().min(other.chain_index());
        if self.chain_index() > target {
            self.inner.set_chain_index(target)?;
        }
        if other.chain_index() > target {
            let mut copy = other.clone();
            copy.set_chain_index(target)?;
            return Ok(Some(copy));
        }
        Ok(None)
    }

    /// A managed multiplication that could not be rescaled afterwards must
    /// fail before the payload is touched; errors leave the tile unchanged.
    fn check_multiply_budget(&self) -> HeResult<()> {
        if self.context.traits().multiplication_requires_rescale
            && self.chain_index() <= self.context.backend().min_chain_index()
        {
            return Err(HeError::ChainIndexExhausted);
        }
        Ok(())
    }

    /// The back half of a managed multiplication.
    fn finish_multiply(&mut self) -> HeResult<()> {
        let traits = self.context.traits();
        if traits.multiplication_requires_relinearize {
            self.inner.relinearize()?;
        }
        if traits.multiplication_requires_rescale {
            self.inner.rescale_raw()?;
        }
        Ok(())
    }

    // --- managed operations ----------------------------------------------

    pub fn add(&mut self, other: &CTile) -> HeResult<()> {
        let adjusted = self.prepare_binary(other)?;
        let rhs = adjusted.as_ref().unwrap_or(other);
        self.inner.add_raw(rhs.inner.as_ref())
    }

    pub fn sub(&mut self, other: &CTile) -> HeResult<()> {
        let adjusted = self.prepare_binary(other)?;
        let rhs = adjusted.as_ref().unwrap_or(other);
        self.inner.sub_raw(rhs.inner.as_ref())
    }

    pub fn multiply(&mut self, other: &CTile) -> HeResult<()> {
        let adjusted = self.prepare_binary(other)?;
        self.check_multiply_budget()?;
        let rhs = adjusted.as_ref().unwrap_or(other);
        self.inner.multiply_raw(rhs.inner.as_ref())?;
        self.finish_multiply()
    }

    pub fn add_plain(&mut self, other: &PTile) -> HeResult<()> {
        let adjusted = self.prepare_plain(other)?;
        let rhs = adjusted.as_ref().unwrap_or(other);
        self.inner.add_plain_raw(rhs.inner_ref())
    }

    pub fn sub_plain(&mut self, other: &PTile) -> HeResult<()> {
        let adjusted = self.prepare_plain(other)?;
        let rhs = adjusted.as_ref().unwrap_or(other);
        self.inner.sub_plain_raw(rhs.inner_ref())
    }

    pub fn multiply_plain(&mut self, other: &PTile) -> HeResult<()> {
        self.auto_bootstrap()?;
        let adjusted = self.prepare_plain(other)?;
        self.check_multiply_budget()?;
        let rhs = adjusted.as_ref().unwrap_or(other);
        self.inner.multiply_plain_raw(rhs.inner_ref())?;
        if self.context.traits().multiplication_requires_rescale {
            self.inner.rescale_raw()?;
        }
        Ok(())
    }

    pub fn add_scalar(&mut self, value: f64) -> HeResult<()> {
        self.inner.add_scalar(value)
    }

    pub fn multiply_scalar(&mut self, value: f64) -> HeResult<()> {
        self.auto_bootstrap()?;
        self.check_multiply_budget()?;
        self.inner.multiply_scalar(value)?;
        if self.context.traits().multiplication_requires_rescale {
            self.inner.rescale_raw()?;
        }
        Ok(())
    }

    pub fn square(&mut self) -> HeResult<()> {
        self.auto_bootstrap()?;
        self.check_multiply_budget()?;
        self.inner.square_raw()?;
        self.finish_multiply()
    }

    pub fn negate(&mut self) -> HeResult<()> {
        self.inner.negate()
    }

    pub fn conjugate(&mut self) -> HeResult<()> {
        if !self.context.public_functions()?.conjugate {
            return Err(HeError::not_supported("conjugation keys were not generated"));
        }
        self.inner.conjugate_raw()
    }

    /// Left rotation by an arbitrary amount: slot `i` receives the value of
    /// slot `(i + n) mod slot_count`; negative `n` rotates right. The amount
    /// is decomposed into natively supported steps by the dependency mapper.
    pub fn rotate(&mut self, n: i32) -> HeResult<()> {
        let context = Arc::clone(&self.context);
        let steps = context
            .rotate_mapper()?
            .compose_rotate(n)
            .ok_or(HeError::RotationUnreachable { target: n })?;
        for step in steps {
            self.inner.rotate_raw(step)?;
        }
        Ok(())
    }

    pub fn relinearize(&mut self) -> HeResult<()> {
        self.inner.relinearize()
    }

    pub fn rescale(&mut self) -> HeResult<()> {
        if !self.context.traits().supports(Capability::ExplicitRescale) {
            return Err(HeError::not_supported("explicit rescaling on this backend"));
        }
        self.inner.rescale_raw()
    }

    pub fn bootstrap(&mut self) -> HeResult<()> {
        let context = Arc::clone(&self.context);
        let evaluator = context
            .bootstrap_evaluator()
            .ok_or(HeError::NotBootstrappable)?;
        evaluator.bootstrap(self)
    }

    /// Sums slot windows by rotate-and-add doubling: after the call, slot `i`
    /// holds the sum of slots `i, i+rot1, i+2*rot1, .., i+rot2-rot1` of the
    /// input. Requires `rot2 = rot1 << k`; with `reverse` the rotations go
    /// right instead of left.
    pub fn inner_sum(&mut self, rot1: i32, rot2: i32, reverse: bool) -> HeResult<()> {
        if rot1 <= 0 || rot2 < rot1 {
            return Err(HeError::invalid_argument(format!(
                "inner_sum requires 0 < rot1 <= rot2, got {rot1}, {rot2}"
            )));
        }
        if rot2 % rot1 != 0 || !((rot2 / rot1) as u32).is_power_of_two() {
            return Err(HeError::invalid_argument(format!(
                "inner_sum requires rot2 = rot1 << k, got {rot1}, {rot2}"
            )));
        }
        let mut step = rot1;
        while step < rot2 {
            let mut rotated = self.clone();
            rotated.rotate(if reverse { -step } else { step })?;
            self.add(&rotated)?;
            step *= 2;
        }
        Ok(())
    }

    /// Sum of `n` consecutive slots per position, doubling schedule driven
    /// MSB-first. `O(log n)` rotations for any `n`, not just powers of two.
    pub fn sum_exp_by_squaring_left_to_right(&mut self, n: i32) -> HeResult<()> {
        if n <= 0 {
            return Err(HeError::invalid_argument(format!(
                "window sum needs a positive length, got {n}"
            )));
        }
        let input = self.clone();
        let mut count: i32 = 1;
        for bit in (0..31 - n.leading_zeros()).rev() {
            let mut shifted = self.clone();
            shifted.rotate(count)?;
            self.add(&shifted)?;
            count *= 2;
            if n & (1 << bit) != 0 {
                let mut tail = input.clone();
                tail.rotate(count)?;
                self.add(&tail)?;
                count += 1;
            }
        }
        Ok(())
    }

    /// Same window sum, doubling schedule driven LSB-first.
    pub fn sum_exp_by_squaring_right_to_left(&mut self, n: i32) -> HeResult<()> {
        if n <= 0 {
            return Err(HeError::invalid_argument(format!(
                "window sum needs a positive length, got {n}"
            )));
        }
        let mut base = self.clone();
        let mut base_len: i32 = 1;
        let mut acc: Option<CTile> = None;
        let mut acc_len: i32 = 0;
        let mut remaining = n;
        while remaining > 0 {
            if remaining & 1 == 1 {
                match &mut acc {
                    None => {
                        acc = Some(base.clone());
                        acc_len = base_len;
                    }
                    Some(sum) => {
                        let mut shifted = base.clone();
                        shifted.rotate(acc_len)?;
                        sum.add(&shifted)?;
                        acc_len += base_len;
                    }
                }
            }
            remaining >>= 1;
            if remaining > 0 {
                let mut shifted = base.clone();
                shifted.rotate(base_len)?;
                base.add(&shifted)?;
                base_len *= 2;
            }
        }
        *self = acc.expect("positive n always produces a sum");
        Ok(())
    }

    // --- raw operations ---------------------------------------------------

    pub fn add_raw(&mut self, other: &CTile) -> HeResult<()> {
        self.check_context(other.context.context_id())?;
        self.inner.add_raw(other.inner.as_ref())
    }

    pub fn sub_raw(&mut self, other: &CTile) -> HeResult<()> {
        self.check_context(other.context.context_id())?;
        self.inner.sub_raw(other.inner.as_ref())
    }

    pub fn multiply_raw(&mut self, other: &CTile) -> HeResult<()> {
        self.check_context(other.context.context_id())?;
        self.inner.multiply_raw(other.inner.as_ref())
    }

    pub fn multiply_plain_raw(&mut self, other: &PTile) -> HeResult<()> {
        self.check_context(other.context_id())?;
        self.inner.multiply_plain_raw(other.inner_ref())
    }

    pub fn square_raw(&mut self) -> HeResult<()> {
        self.inner.square_raw()
    }

    pub fn rescale_raw(&mut self) -> HeResult<()> {
        self.inner.rescale_raw()
    }

    /// A single natively supported rotation step, no decomposition.
    pub fn rotate_raw(&mut self, step: i32) -> HeResult<()> {
        self.inner.rotate_raw(step)
    }

    // --- metadata ---------------------------------------------------------

    pub fn chain_index(&self) -> i32 {
        self.inner.chain_index()
    }

    pub fn set_chain_index(&mut self, target: i32) -> HeResult<()> {
        self.inner.set_chain_index(target)
    }

    pub fn reduce_chain_index(&mut self) -> HeResult<()> {
        self.inner.reduce_chain_index()
    }

    pub fn scale(&self) -> HeResult<f64> {
        self.inner.scale()
    }

    pub fn set_scale(&mut self, scale: f64) -> HeResult<()> {
        if !self.context.traits().supports(Capability::ScaleSetting) {
            return Err(HeError::ScaleUnsupported);
        }
        self.inner.set_scale(scale)
    }

    pub fn slot_count(&self) -> usize {
        self.inner.slot_count()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn device(&self) -> Device {
        self.context.default_device()
    }

    /// Restores a tile saved with [`Saveable::save`] into `context`, which
    /// must be the context it was saved under.
    pub fn load<R: Read>(r: &mut R, context: &Arc<HeContext>) -> HeResult<Self> {
        let header = SaveableHeader::read_from(r)?;
        header.verify_class(CLASS_NAME)?;
        header.verify_context_id(context.context_id())?;
        let mut inner = context.backend().create_cipher()?;
        inner.load_body(&read_body(r)?)?;
        Ok(Self {
            context: Arc::clone(context),
            inner,
        })
    }
}

impl Tile for CTile {
    fn chain_index(&self) -> i32 {
        CTile::chain_index(self)
    }

    fn set_chain_index(&mut self, target: i32) -> HeResult<()> {
        CTile::set_chain_index(self, target)
    }

    fn reduce_chain_index(&mut self) -> HeResult<()> {
        CTile::reduce_chain_index(self)
    }

    fn scale(&self) -> HeResult<f64> {
        CTile::scale(self)
    }

    fn set_scale(&mut self, scale: f64) -> HeResult<()> {
        CTile::set_scale(self, scale)
    }

    fn slot_count(&self) -> usize {
        CTile::slot_count(self)
    }

    fn is_empty(&self) -> bool {
        CTile::is_empty(self)
    }

    fn device(&self) -> Device {
        CTile::device(self)
    }

    fn context_id(&self) -> i32 {
        self.context.context_id()
    }
}

impl Saveable for CTile {
    fn class_name(&self) -> &'static str {
        CLASS_NAME
    }

    fn context_id(&self) -> i32 {
        self.context.context_id()
    }

    fn save_body(&self) -> HeResult<Vec<u8>> {
        self.inner.save_body()
    }
}
