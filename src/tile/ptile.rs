use crate::backend::{AbstractPlaintext, Device};
use crate::context::HeContext;
use crate::error::{HeError, HeResult};
use crate::save::{Saveable, SaveableHeader, read_body};
use crate::tile::Tile;
use std::io::Read;
use std::sync::Arc;

const CLASS_NAME: &str = "PTile";

/// An encoded-plaintext tile: chain-index and scale metadata plus
/// save/load. All arithmetic involving a `PTile` goes through the `CTile`
/// plain-operand operations.
pub struct PTile {
    context: Arc<HeContext>,
    inner: Box<dyn AbstractPlaintext>,
}

impl Clone for PTile {
    fn clone(&self) -> Self {
        Self {
            context: Arc::clone(&self.context),
            inner: self.inner.clone_box(),
        }
    }
}

impl PTile {
    pub fn new(context: &Arc<HeContext>) -> HeResult<Self> {
        Ok(Self {
            context: Arc::clone(context),
            inner: context.backend().create_plain()?,
        })
    }

    pub(crate) fn from_parts(
        context: &Arc<HeContext>,
        inner: Box<dyn AbstractPlaintext>,
    ) -> Self {
        Self {
            context: Arc::clone(context),
            inner,
        }
    }

    pub fn context(&self) -> &Arc<HeContext> {
        &self.context
    }

    pub(crate) fn inner_ref(&self) -> &dyn AbstractPlaintext {
        self.inner.as_ref()
    }

    pub fn chain_index(&self) -> i32 {
        self.inner.chain_index()
    }

    pub fn set_chain_index(&mut self, target: i32) -> HeResult<()> {
        self.inner.set_chain_index(target)
    }

    pub fn reduce_chain_index(&mut self) -> HeResult<()> {
        let current = self.inner.chain_index();
        if current <= 0 {
            return Err(HeError::ChainIndexExhausted);
        }
        self.inner.set_chain_index(current - 1)
    }

    pub fn scale(&self) -> HeResult<f64> {
        self.inner.scale()
    }

    pub fn set_scale(&mut self, scale: f64) -> HeResult<()> {
        if !self.context.traits().supports_scale_setting {
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

    pub fn context_id(&self) -> i32 {
        self.context.context_id()
    }

    pub fn load<R: Read>(r: &mut R, context: &Arc<HeContext>) -> HeResult<Self> {
        let header = SaveableHeader::read_from(r)?;
        header.verify_class(CLASS_NAME)?;
        header.verify_context_id(context.context_id())?;
        let mut inner = context.backend().create_plain()?;
        inner.load_body(&read_body(r)?)?;
        Ok(Self {
            context: Arc::clone(context),
            inner,
        })
    }
}

impl Tile for PTile {
    fn chain_index(&self) -> i32 {
        PTile::chain_index(self)
    }

    fn set_chain_index(&mut self, target: i32) -> HeResult<()> {
        PTile::set_chain_index(self, target)
    }

    fn reduce_chain_index(&mut self) -> HeResult<()> {
        PTile::reduce_chain_index(self)
    }

    fn scale(&self) -> HeResult<f64> {
        PTile::scale(self)
    }

    fn set_scale(&mut self, scale: f64) -> HeResult<()> {
        PTile::set_scale(self, scale)
    }

    fn slot_count(&self) -> usize {
        PTile::slot_count(self)
    }

    fn is_empty(&self) -> bool {
        PTile::is_empty(self)
    }

    fn device(&self) -> Device {
        PTile::device(self)
    }

    fn context_id(&self) -> i32 {
        PTile::context_id(self)
    }
}

impl Saveable for PTile {
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
