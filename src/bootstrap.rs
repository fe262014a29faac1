//! Bootstrap orchestration.
//!
//! A bootstrap evaluator is built once at context init (when the negotiated
//! requirement asked for it) and owned by the context; tiles reach it
//! through `CTile::bootstrap` or the automatic trigger inside managed
//! operations.
//!
//! The cleartext evaluator reproduces the arithmetic shape of a CKKS
//! recryption rather than faking a perfect one: slot values are carried to
//! the coefficient domain, each coefficient picks up a random multiple of
//! the base modulus (the mod-raise artifact a real scheme cannot avoid), and
//! the multiple is removed again by a Chebyshev approximation of the scaled
//! sine. Inputs outside the configured range degrade accuracy silently, the
//! same failure mode real bootstrapping has.

use crate::backend::AbstractCiphertext;
use crate::backend::cleartext::CleartextCiphertext;
use crate::config::BootstrapConfig;
use crate::error::{HeError, HeResult};
use crate::functions::chebyshev::{chebyshev_coefficients, chebyshev_to_monomial};
use crate::functions::paterson_stockmeyer::ps_eval_plain;
use crate::tile::CTile;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use rustfft::{Fft, FftPlanner};
use std::f64::consts::TAU;
use std::sync::{Arc, Mutex};

/// Scheme-specific recryption procedure.
pub trait BootstrapEvaluator {
    fn config(&self) -> &BootstrapConfig;

    /// Lowest chain index a ciphertext may have and still be bootstrapped.
    fn min_chain_index_for_bootstrapping(&self) -> i32;

    /// Chain index ciphertexts come out at.
    fn chain_index_after_bootstrapping(&self) -> i32;

    fn bootstrap(&self, tile: &mut CTile) -> HeResult<()>;
}

/// CKKS-shaped bootstrap over the value-carrying backend.
pub struct CkksBootstrapEvaluator {
    config: BootstrapConfig,
    target_chain_index: i32,
    /// Monomial coefficients of the scaled-sine cleanup polynomial, fitted
    /// on the normalized domain `[-1, 1]`.
    sine_coeffs: Vec<f64>,
    /// Base modulus `q = 2^base_modulus_bits`.
    modulus: f64,
    /// Half-width of the raw coefficient domain, `q * (range_radius + 1/2)`.
    range: f64,
    slot_count: usize,
    to_coefficients: Arc<dyn Fft<f64>>,
    to_slots: Arc<dyn Fft<f64>>,
    rng: Mutex<ChaCha20Rng>,
}

impl CkksBootstrapEvaluator {
    pub fn new(
        config: BootstrapConfig,
        num_slots: usize,
        top_chain_index: i32,
    ) -> HeResult<Self> {
        if num_slots < 2 || !num_slots.is_power_of_two() {
            return Err(HeError::invalid_argument(
                "bootstrapping needs a power-of-two slot count",
            ));
        }
        if config.chebyshev_degree < 7 {
            return Err(HeError::invalid_argument(
                "sine approximation needs degree at least 7",
            ));
        }
        let target_chain_index = config
            .target_chain_index
            .unwrap_or(top_chain_index)
            .min(top_chain_index);
        if target_chain_index < 1 {
            return Err(HeError::invalid_argument(
                "bootstrap target chain index must be positive",
            ));
        }

        let modulus = f64::from(1u32 << config.base_modulus_bits);
        let radius = f64::from(config.range_radius) + 0.5;
        let range = modulus * radius;
        // g(u) = (q / 2pi) * sin(2pi * radius * u); at u = t / (q * radius)
        // this is (q / 2pi) * sin(2pi t / q), the periodic cleanup that maps
        // t = m + q*I back to (approximately) m.
        let sine = |u: f64| modulus / TAU * (TAU * radius * u).sin();
        let sine_coeffs = chebyshev_to_monomial(&chebyshev_coefficients(
            sine,
            -1.0,
            1.0,
            config.chebyshev_degree,
        ));

        let mut planner = FftPlanner::new();
        Ok(Self {
            target_chain_index,
            sine_coeffs,
            modulus,
            range,
            slot_count: num_slots,
            to_coefficients: planner.plan_fft_inverse(num_slots),
            to_slots: planner.plan_fft_forward(num_slots),
            rng: Mutex::new(ChaCha20Rng::from_os_rng()),
            config,
        })
    }

    fn cleanup(&self, t: f64) -> f64 {
        ps_eval_plain(&self.sine_coeffs, t / self.range)
    }
}

impl BootstrapEvaluator for CkksBootstrapEvaluator {
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
        let inner = tile.inner_mut();
        let cipher = inner
            .as_any_mut()
            .downcast_mut::<CleartextCiphertext>()
            .ok_or_else(|| {
                HeError::not_supported("CKKS bootstrapping on this ciphertext type")
            })?;
        if cipher.values.len() != self.slot_count {
            return Err(HeError::invalid_argument(format!(
                "ciphertext has {} slots, evaluator was built for {}",
                cipher.values.len(),
                self.slot_count
            )));
        }

        if self.config.verbose {
            println!(
                "bootstrap: chain index {} -> {}, q = {}, degree {}",
                cipher.chain_index(),
                self.target_chain_index,
                self.modulus,
                self.config.chebyshev_degree
            );
        }

        // Slot domain to coefficient domain. rustfft leaves the factor n in
        // the inverse transform; fold it in here so the round trip is unit.
        let mut coefficients = cipher.values.clone();
        self.to_coefficients.process(&mut coefficients);
        let normalization = 1.0 / self.slot_count as f64;
        for c in &mut coefficients {
            *c *= normalization;
        }

        // Mod-raise artifact: every coefficient gains a random multiple of q
        // within the configured radius.
        {
            let radius = self.config.range_radius as i32;
            let mut rng = self.rng.lock().unwrap();
            for c in &mut coefficients {
                c.re += self.modulus * f64::from(rng.random_range(-radius..=radius));
                if self.config.supports_complex {
                    c.im += self.modulus * f64::from(rng.random_range(-radius..=radius));
                }
            }
        }

        // Approximate modular reduction removes the multiples again.
        for c in &mut coefficients {
            c.re = self.cleanup(c.re);
            c.im = self.cleanup(c.im);
        }

        self.to_slots.process(&mut coefficients);
        cipher.values = coefficients;

        let base_scale = cipher.base_scale();
        cipher.raise_chain_index(self.target_chain_index)?;
        cipher.set_scale(base_scale)
    }
}
