//! Capability descriptors for scheme/backend combinations.
//!
//! `HeTraits` is pure data: a backend fills it in once at construction and
//! every other component only reads it. Callers that want to branch on a
//! capability before attempting an operation use [`HeTraits::supports`]
//! instead of catching "not supported" errors.

/// A queryable capability of a scheme/backend pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Bootstrap,
    ExplicitChainIndices,
    ExplicitRescale,
    ScaleSetting,
    ComplexNumbers,
    Decryption,
    ModularArithmetic,
    Gpu,
}

/// Fixed bag of flags describing what a scheme/backend supports.
///
/// Set once by the owning context backend during construction and never
/// mutated afterwards.
#[derive(Debug, Clone)]
pub struct HeTraits {
    /// Whether ciphertexts of this scheme can be bootstrapped at all.
    pub supports_bootstrapping: bool,
    /// Whether ciphertexts carry an explicit position in a modulus chain.
    pub supports_explicit_chain_indices: bool,
    /// Whether binary operations require operands at equal chain index and
    /// the tile layer must reconcile mismatches itself.
    pub chain_index_adjustments_required: bool,
    /// Whether the scheme rescales internally after multiplication.
    pub automatic_rescale: bool,
    /// Whether an explicit rescale operation exists.
    pub supports_explicit_rescale: bool,
    /// Whether scale metadata can be read and written.
    pub supports_scale_setting: bool,
    /// Whether the ciphertext grows on multiplication and must be
    /// relinearized back to canonical form.
    pub multiplication_requires_relinearize: bool,
    /// Whether a managed multiplication must be followed by a rescale.
    pub multiplication_requires_rescale: bool,
    pub supports_complex_numbers: bool,
    /// False for estimation backends that carry no values.
    pub supports_decryption: bool,
    pub is_modular_arithmetic: bool,
    /// Plaintext-space modulus, 0 when arithmetic is approximate.
    pub arithmetic_modulus: u64,
    /// True for backends that do not provide any cryptographic security.
    pub is_mockup: bool,
    pub supports_gpu: bool,
}

impl HeTraits {
    pub fn supports(&self, capability: Capability) -> bool {
        match capability {
            Capability::Bootstrap => self.supports_bootstrapping,
            Capability::ExplicitChainIndices => self.supports_explicit_chain_indices,
            Capability::ExplicitRescale => self.supports_explicit_rescale,
            Capability::ScaleSetting => self.supports_scale_setting,
            Capability::ComplexNumbers => self.supports_complex_numbers,
            Capability::Decryption => self.supports_decryption,
            Capability::ModularArithmetic => self.is_modular_arithmetic,
            Capability::Gpu => self.supports_gpu,
        }
    }
}
