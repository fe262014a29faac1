//! Numeric algorithms over encrypted tiles.
//!
//! Everything here is polynomial or iterative under the hood: HE gives us
//! additions and multiplications, so comparisons, inverses and square roots
//! all become fixed arithmetic circuits whose accuracy is a function of the
//! degrees and iteration counts the caller picks.

pub mod chebyshev;
pub mod paterson_stockmeyer;

use crate::context::HeContext;
use crate::error::{HeError, HeResult};
use crate::tile::CTile;
use paterson_stockmeyer::{POLY_EVAL_EPS, baby_combination, horner_eval_tile, ps_eval_tile};
use std::sync::Arc;

/// Strategy for evaluating a polynomial under encryption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalType {
    /// Baby-step/giant-step; minimizes nonscalar multiplications.
    PatersonStockmeyer,
    /// Sequential power ladder `x^i = x^(i-1) * x`; every power is reused,
    /// depth grows linearly with the degree.
    EfficientPowers,
    /// Pairwise power ladder; a few more multiplications than the sequential
    /// ladder but logarithmic depth.
    MinDepth,
}

/// Degree-7 sign refinement polynomials (f3 and g3 of the composite minimax
/// family). g pushes inputs away from zero, f flattens them toward ±1.
const SIGN_F3: [f64; 8] = [
    0.0,
    2.1875, // 35/16
    0.0,
    -2.1875, // -35/16
    0.0,
    1.3125, // 21/16
    0.0,
    -0.3125, // -5/16
];
const SIGN_G3: [f64; 8] = [
    0.0,
    4.4814453125, // 4589/1024
    0.0,
    -16.1884765625, // -16577/1024
    0.0,
    25.013671875, // 25614/1024
    0.0,
    -12.55859375, // -12860/1024
];

/// Degree-7 least-squares fit of the logistic function on [-8, 8],
/// expressed in t = x/8.
const SIGMOID_DEG7: [f64; 8] = [
    0.5, 1.73496, 0.0, -4.19407, 0.0, 5.43402, 0.0, -2.50739,
];

/// Sign repetitions used by `compare`, `min`, `max` and `abs`.
const SIGN_DEFAULT_G_REP: usize = 3;
const SIGN_DEFAULT_F_REP: usize = 3;

pub struct FunctionEvaluator {
    context: Arc<HeContext>,
}

impl FunctionEvaluator {
    pub fn new(context: &Arc<HeContext>) -> Self {
        Self {
            context: Arc::clone(context),
        }
    }

    pub fn context(&self) -> &Arc<HeContext> {
        &self.context
    }

    /// Evaluates the polynomial with cleartext coefficients (low degree
    /// first) at the encrypted `x`.
    pub fn poly_eval(&self, x: &CTile, coeffs: &[f64], eval_type: EvalType) -> HeResult<CTile> {
        match eval_type {
            EvalType::PatersonStockmeyer => ps_eval_tile(x, coeffs),
            EvalType::EfficientPowers => ladder_eval(x, coeffs, false),
            EvalType::MinDepth => ladder_eval(x, coeffs, true),
        }
    }

    pub fn poly_eval_in_place(
        &self,
        x: &mut CTile,
        coeffs: &[f64],
        eval_type: EvalType,
    ) -> HeResult<()> {
        *x = self.poly_eval(x, coeffs, eval_type)?;
        Ok(())
    }

    /// Horner evaluation with encrypted coefficients, low degree first.
    /// One ciphertext multiplication per degree; there is no baby-step
    /// shortcut when the coefficients themselves are ciphertexts.
    pub fn poly_eval_encrypted(&self, x: &CTile, coeffs: &[CTile]) -> HeResult<CTile> {
        let (last, rest) = coeffs
            .split_last()
            .ok_or_else(|| HeError::invalid_argument("empty coefficient list"))?;
        let mut acc = last.clone();
        for c in rest.iter().rev() {
            acc.multiply(x)?;
            acc.add(c)?;
        }
        Ok(acc)
    }

    /// `x^n` for `n >= 1`.
    pub fn pow(&self, x: &CTile, n: u32, eval_type: EvalType) -> HeResult<CTile> {
        if n == 0 {
            return Err(HeError::invalid_argument(
                "pow needs a positive exponent; x^0 is a plain constant",
            ));
        }
        match eval_type {
            EvalType::MinDepth => pow_balanced(x, n),
            _ => pow_square_and_multiply(x, n),
        }
    }

    /// Logistic function, accurate to about 0.03 for inputs in [-8, 8].
    pub fn sigmoid(&self, x: &CTile) -> HeResult<CTile> {
        let mut t = x.clone();
        t.multiply_scalar(0.125)?;
        self.poly_eval(&t, &SIGMOID_DEG7, EvalType::PatersonStockmeyer)
    }

    /// Approximate sign: ≈ -1 below zero, ≈ +1 above. Inputs must lie in
    /// `[-max_abs_val, max_abs_val]`; more repetitions sharpen the
    /// transition around zero at the cost of `3 * (g_rep + f_rep)` levels.
    pub fn sign(
        &self,
        x: &CTile,
        g_rep: usize,
        f_rep: usize,
        max_abs_val: f64,
    ) -> HeResult<CTile> {
        if max_abs_val <= 0.0 {
            return Err(HeError::invalid_argument("max_abs_val must be positive"));
        }
        let mut acc = x.clone();
        if max_abs_val != 1.0 {
            acc.multiply_scalar(1.0 / max_abs_val)?;
        }
        for _ in 0..g_rep {
            self.poly_eval_in_place(&mut acc, &SIGN_G3, EvalType::PatersonStockmeyer)?;
        }
        for _ in 0..f_rep {
            self.poly_eval_in_place(&mut acc, &SIGN_F3, EvalType::PatersonStockmeyer)?;
        }
        Ok(acc)
    }

    /// Comparison indicator: ≈ 1 where `a > b`, ≈ 0 where `a < b`, ≈ 0.5 at
    /// ties. `max_abs_diff` bounds `|a - b|`.
    pub fn compare(&self, a: &CTile, b: &CTile, max_abs_diff: f64) -> HeResult<CTile> {
        let mut diff = a.clone();
        diff.sub(b)?;
        let mut result = self.sign(
            &diff,
            SIGN_DEFAULT_G_REP,
            SIGN_DEFAULT_F_REP,
            max_abs_diff,
        )?;
        result.add_scalar(1.0)?;
        result.multiply_scalar(0.5)?;
        Ok(result)
    }

    /// `|x|` as `x * sign(x)`.
    pub fn abs(&self, x: &CTile, max_abs_val: f64) -> HeResult<CTile> {
        let sign = self.sign(x, SIGN_DEFAULT_G_REP, SIGN_DEFAULT_F_REP, max_abs_val)?;
        let mut result = x.clone();
        result.multiply(&sign)?;
        Ok(result)
    }

    /// Slot-wise minimum via `(a + b)/2 - |a - b|/2`.
    pub fn min(&self, a: &CTile, b: &CTile, max_abs_diff: f64) -> HeResult<CTile> {
        self.extremum(a, b, max_abs_diff, false)
    }

    /// Slot-wise maximum via `(a + b)/2 + |a - b|/2`.
    pub fn max(&self, a: &CTile, b: &CTile, max_abs_diff: f64) -> HeResult<CTile> {
        self.extremum(a, b, max_abs_diff, true)
    }

    fn extremum(
        &self,
        a: &CTile,
        b: &CTile,
        max_abs_diff: f64,
        upper: bool,
    ) -> HeResult<CTile> {
        let mut mean = a.clone();
        mean.add(b)?;
        mean.multiply_scalar(0.5)?;
        let mut diff = a.clone();
        diff.sub(b)?;
        let mut half_gap = self.abs(&diff, max_abs_diff)?;
        half_gap.multiply_scalar(0.5)?;
        if upper {
            mean.add(&half_gap)?;
        } else {
            mean.sub(&half_gap)?;
        }
        Ok(mean)
    }

    /// `1/x` by Newton iteration `y <- y(2 - xy)`, converging for
    /// `x in (0, upper_bound]`. Quadratic convergence once started; slow to
    /// enter for inputs far below the upper bound, so size `iterations`
    /// against the smallest expected input.
    pub fn inverse(&self, x: &CTile, upper_bound: f64, iterations: usize) -> HeResult<CTile> {
        if upper_bound <= 0.0 {
            return Err(HeError::invalid_argument("upper_bound must be positive"));
        }
        let mut scaled = x.clone();
        scaled.multiply_scalar(1.0 / upper_bound)?;
        // y0 = 2 - x', exact at x' = 1 and within the convergence basin
        // everywhere on (0, 1].
        let mut y = scaled.clone();
        y.negate()?;
        y.add_scalar(2.0)?;
        for _ in 0..iterations {
            let mut correction = scaled.clone();
            correction.multiply(&y)?;
            correction.negate()?;
            correction.add_scalar(2.0)?;
            y.multiply(&correction)?;
        }
        y.multiply_scalar(1.0 / upper_bound)?;
        Ok(y)
    }

    /// `sqrt(x)` for `x in [0, 1]` by the Wilkes iteration:
    /// `a <- a(1 - b/2)`, `b <- b^2 (b - 3)/4`.
    pub fn sqrt(&self, x: &CTile, iterations: usize) -> HeResult<CTile> {
        let mut a = x.clone();
        let mut b = x.clone();
        b.add_scalar(-1.0)?;
        for _ in 0..iterations {
            let mut factor = b.clone();
            factor.multiply_scalar(0.5)?;
            factor.negate()?;
            factor.add_scalar(1.0)?;
            a.multiply(&factor)?;

            let mut shifted = b.clone();
            shifted.add_scalar(-3.0)?;
            b.square()?;
            b.multiply(&shifted)?;
            b.multiply_scalar(0.25)?;
        }
        Ok(a)
    }
}

/// Power-ladder polynomial evaluation shared by the non-PS strategies.
fn ladder_eval(x: &CTile, coeffs: &[f64], balanced: bool) -> HeResult<CTile> {
    let end = coeffs
        .iter()
        .rposition(|c| c.abs() >= POLY_EVAL_EPS)
        .map_or(0, |i| i + 1);
    let coeffs = &coeffs[..end];
    if coeffs.len() <= 2 {
        return horner_eval_tile(x, coeffs);
    }
    let degree = coeffs.len() - 1;
    let mut powers: Vec<CTile> = Vec::with_capacity(degree);
    powers.push(x.clone());
    for i in 2..=degree {
        let (left, right) = if balanced {
            (i / 2, i - i / 2)
        } else {
            (i - 1, 1)
        };
        let mut power = powers[left - 1].clone();
        power.multiply(&powers[right - 1])?;
        powers.push(power);
    }
    baby_combination(coeffs, &powers, x)
}

fn pow_square_and_multiply(x: &CTile, n: u32) -> HeResult<CTile> {
    let mut result = x.clone();
    for bit in (0..31 - n.leading_zeros()).rev() {
        result.square()?;
        if n & (1 << bit) != 0 {
            result.multiply(x)?;
        }
    }
    Ok(result)
}

fn pow_balanced(x: &CTile, n: u32) -> HeResult<CTile> {
    if n == 1 {
        return Ok(x.clone());
    }
    let mut half = pow_balanced(x, n / 2)?;
    if n % 2 == 0 {
        half.square()?;
        Ok(half)
    } else {
        let mut other = half.clone();
        other.multiply(x)?;
        half.multiply(&other)?;
        Ok(half)
    }
}

pub use paterson_stockmeyer::{horner_eval_plain, ps_eval_plain};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_polynomials_sharpen_toward_plus_minus_one() {
        let mut v = 0.2;
        for _ in 0..SIGN_DEFAULT_G_REP {
            v = horner_eval_plain(&SIGN_G3, v);
        }
        for _ in 0..SIGN_DEFAULT_F_REP {
            v = horner_eval_plain(&SIGN_F3, v);
        }
        assert!((v - 1.0).abs() < 0.01, "sign(0.2) refined to {v}");

        let mut w = -0.1;
        for _ in 0..SIGN_DEFAULT_G_REP {
            w = horner_eval_plain(&SIGN_G3, w);
        }
        for _ in 0..SIGN_DEFAULT_F_REP {
            w = horner_eval_plain(&SIGN_F3, w);
        }
        assert!((w + 1.0).abs() < 0.01, "sign(-0.1) refined to {w}");
    }

    #[test]
    fn sign_polynomials_are_odd_and_fix_zero() {
        assert_eq!(horner_eval_plain(&SIGN_F3, 0.0), 0.0);
        assert_eq!(horner_eval_plain(&SIGN_G3, 0.0), 0.0);
        for x in [0.3, 0.7, 0.95] {
            let f_pos = horner_eval_plain(&SIGN_F3, x);
            let f_neg = horner_eval_plain(&SIGN_F3, -x);
            assert!((f_pos + f_neg).abs() < 1e-12);
        }
    }

    #[test]
    fn sigmoid_polynomial_tracks_the_logistic() {
        for x in [-6.0, -2.0, -0.5, 0.0, 0.5, 2.0, 6.0] {
            let approx = horner_eval_plain(&SIGMOID_DEG7, x / 8.0);
            let exact = 1.0 / (1.0 + (-x).exp());
            assert!(
                (approx - exact).abs() < 0.04,
                "sigmoid({x}): {approx} vs {exact}"
            );
        }
    }
}
