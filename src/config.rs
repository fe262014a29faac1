//! Configuration requirements negotiated with a context at init time.

use crate::error::{HeError, HeResult};
use serde::{Deserialize, Serialize};

/// Which rotation keys the key owner is willing to generate.
///
/// Restricting the set shrinks the public key; arbitrary rotations are then
/// composed from the available steps by the rotate dependency mapper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RotationSet {
    /// The default ± powers-of-two set.
    All,
    /// An explicit list of supported rotation steps.
    Steps(Vec<i32>),
    /// No rotation keys at all.
    None,
}

/// Public-key functionality that must be supported by the generated keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicFunctions {
    pub encrypt: bool,
    pub relinearize: bool,
    pub conjugate: bool,
    pub rotations: RotationSet,
}

impl Default for PublicFunctions {
    fn default() -> Self {
        Self {
            encrypt: true,
            relinearize: true,
            conjugate: true,
            rotations: RotationSet::All,
        }
    }
}

/// Numeric knobs governing one scheme's bootstrap procedure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BootstrapConfig {
    /// Chain index a ciphertext is raised to by bootstrapping.
    /// `None` means the top of the chain.
    pub target_chain_index: Option<i32>,
    /// Degree of the Chebyshev approximation of the scaled sine used for
    /// approximate modular reduction.
    pub chebyshev_degree: usize,
    /// log2 of the base modulus the approximate reduction folds into.
    pub base_modulus_bits: u32,
    /// How many modulus multiples the sine approximation must tolerate.
    /// Inputs further out degrade accuracy silently.
    pub range_radius: u32,
    /// Whether bootstrapped ciphertexts may carry complex slot data.
    pub supports_complex: bool,
    pub verbose: bool,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            target_chain_index: None,
            chebyshev_degree: 31,
            base_modulus_bits: 12,
            range_radius: 1,
            supports_complex: true,
            verbose: false,
        }
    }
}

/// A request for a cryptographic configuration, consumed once by
/// `HeContext::init`.
///
/// Callers specify *intent* (desired depth and precision); the context
/// resolves it to a feasible instantiation, possibly upgrading individual
/// fields (see `HeContext::actual_config_requirement`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeConfigRequirement {
    pub num_slots: i64,
    pub multiplication_depth: i32,
    pub fractional_part_precision: i32,
    pub integer_part_precision: i32,
    pub security_level: i32,
    pub bootstrappable: bool,
    pub bootstrap_config: Option<BootstrapConfig>,
    pub automatic_bootstrapping: bool,
    pub public_functions: PublicFunctions,
}

impl Default for HeConfigRequirement {
    fn default() -> Self {
        Self {
            num_slots: -1,
            multiplication_depth: -1,
            fractional_part_precision: -1,
            integer_part_precision: -1,
            security_level: 128,
            bootstrappable: false,
            bootstrap_config: None,
            automatic_bootstrapping: false,
            public_functions: PublicFunctions::default(),
        }
    }
}

impl HeConfigRequirement {
    pub fn new(
        num_slots: i64,
        multiplication_depth: i32,
        fractional_part_precision: i32,
        integer_part_precision: i32,
    ) -> Self {
        Self {
            num_slots,
            multiplication_depth,
            fractional_part_precision,
            integer_part_precision,
            ..Self::default()
        }
    }

    pub fn with_security_level(mut self, security_level: i32) -> Self {
        self.security_level = security_level;
        self
    }

    /// Requests a bootstrappable configuration. Passing `None` uses the
    /// default [`BootstrapConfig`].
    pub fn with_bootstrappable(mut self, config: Option<BootstrapConfig>) -> Self {
        self.bootstrappable = true;
        self.bootstrap_config = Some(config.unwrap_or_default());
        self
    }

    pub fn with_automatic_bootstrapping(mut self, enabled: bool) -> Self {
        self.automatic_bootstrapping = enabled;
        self
    }

    pub fn with_public_functions(mut self, public_functions: PublicFunctions) -> Self {
        self.public_functions = public_functions;
        self
    }

    /// Verifies that all main numeric fields have been set.
    pub fn assert_complete(&self) -> HeResult<()> {
        if self.num_slots < 1 {
            return Err(HeError::invalid_argument("num_slots is not set"));
        }
        if self.multiplication_depth < 0 {
            return Err(HeError::invalid_argument("multiplication_depth is not set"));
        }
        if self.fractional_part_precision < 0 {
            return Err(HeError::invalid_argument(
                "fractional_part_precision is not set",
            ));
        }
        if self.integer_part_precision < 0 {
            return Err(HeError::invalid_argument("integer_part_precision is not set"));
        }
        if self.security_level < 0 {
            return Err(HeError::invalid_argument("security_level is not set"));
        }
        if self.bootstrappable && self.bootstrap_config.is_none() {
            return Err(HeError::invalid_argument(
                "bootstrappable requirement without a bootstrap config",
            ));
        }
        Ok(())
    }
}
