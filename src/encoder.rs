//! Encoding, encryption and their inverses.

use crate::context::HeContext;
use crate::error::{HeError, HeResult};
use crate::tile::{CTile, PTile};
use num_complex::Complex64;
use std::sync::Arc;

/// Front-end for moving cleartext vectors in and out of tiles.
///
/// Vectors shorter than the slot count are zero-padded; decode returns all
/// slots and leaves truncation to the caller.
pub struct Encoder {
    context: Arc<HeContext>,
}

impl Encoder {
    pub fn new(context: &Arc<HeContext>) -> HeResult<Self> {
        // Fails early on an uninitialized context.
        context.slot_count()?;
        Ok(Self {
            context: Arc::clone(context),
        })
    }

    fn check_complex(&self, values: &[Complex64]) -> HeResult<()> {
        if !self.context.traits().supports_complex_numbers
            && values.iter().any(|v| v.im != 0.0)
        {
            return Err(HeError::not_supported(
                "complex slot values on a real-only backend",
            ));
        }
        Ok(())
    }

    fn resolve_chain_index(&self, chain_index: Option<i32>) -> HeResult<i32> {
        match chain_index {
            Some(index) => Ok(index),
            None => self.context.top_chain_index(),
        }
    }

    pub fn encode(&self, values: &[f64], chain_index: Option<i32>) -> HeResult<PTile> {
        let values: Vec<Complex64> = values.iter().map(|&v| Complex64::new(v, 0.0)).collect();
        self.encode_complex(&values, chain_index)
    }

    pub fn encode_complex(
        &self,
        values: &[Complex64],
        chain_index: Option<i32>,
    ) -> HeResult<PTile> {
        self.check_complex(values)?;
        let chain_index = self.resolve_chain_index(chain_index)?;
        let inner =
            self.context
                .backend()
                .encode(values, chain_index, self.context.default_scale())?;
        Ok(PTile::from_parts(&self.context, inner))
    }

    pub fn encrypt(&self, values: &[f64]) -> HeResult<CTile> {
        let values: Vec<Complex64> = values.iter().map(|&v| Complex64::new(v, 0.0)).collect();
        self.encrypt_complex(&values)
    }

    pub fn encrypt_complex(&self, values: &[Complex64]) -> HeResult<CTile> {
        if !self.context.public_functions()?.encrypt && !self.context.has_secret_key() {
            return Err(HeError::not_supported(
                "encryption was excluded from the public functions",
            ));
        }
        self.check_complex(values)?;
        let chain_index = self.context.top_chain_index()?;
        let inner =
            self.context
                .backend()
                .encrypt(values, chain_index, self.context.default_scale())?;
        Ok(CTile::from_parts(&self.context, inner))
    }

    pub fn decrypt(&self, tile: &CTile) -> HeResult<Vec<f64>> {
        Ok(self.decrypt_complex(tile)?.iter().map(|v| v.re).collect())
    }

    pub fn decrypt_complex(&self, tile: &CTile) -> HeResult<Vec<Complex64>> {
        if !self.context.traits().supports_decryption {
            return Err(HeError::not_supported("decryption on this backend"));
        }
        if !self.context.has_secret_key() {
            return Err(HeError::MissingSecretKey);
        }
        self.context.backend().decrypt(tile.inner_ref())
    }

    pub fn decode(&self, tile: &PTile) -> HeResult<Vec<f64>> {
        Ok(self.decode_complex(tile)?.iter().map(|v| v.re).collect())
    }

    pub fn decode_complex(&self, tile: &PTile) -> HeResult<Vec<Complex64>> {
        self.context.backend().decode(tile.inner_ref())
    }
}
