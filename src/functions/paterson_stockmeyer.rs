//! Polynomial evaluation, plain and under encryption.
//!
//! Two strategies: plain Horner (the baseline, one multiplication per
//! degree) and Paterson-Stockmeyer, which for degree `n` spends about
//! `sqrt(n)` baby-step powers plus `log(n)` giant-step squarings. Under
//! encryption the difference is decisive: nonscalar multiplications dominate
//! the cost and the giant steps keep the multiplicative depth logarithmic.

use crate::error::HeResult;
use crate::tile::CTile;

/// Coefficients below this magnitude are treated as zero and skipped; the
/// cutoff absorbs the rounding dust left by basis conversions.
pub const POLY_EVAL_EPS: f64 = 1e-11;

fn trimmed(coeffs: &[f64]) -> &[f64] {
    let end = coeffs
        .iter()
        .rposition(|c| c.abs() >= POLY_EVAL_EPS)
        .map_or(0, |i| i + 1);
    &coeffs[..end]
}

/// Plain Horner evaluation. `coeffs` is low degree first.
pub fn horner_eval_plain(coeffs: &[f64], x: f64) -> f64 {
    coeffs.iter().rev().fold(0.0, |acc, &c| acc * x + c)
}

/// Plain baby-step/giant-step evaluation. Same result as Horner up to
/// rounding; exists so the cleartext pipeline exercises the exact arithmetic
/// shape used under encryption.
pub fn ps_eval_plain(coeffs: &[f64], x: f64) -> f64 {
    let coeffs = trimmed(coeffs);
    if coeffs.is_empty() {
        return 0.0;
    }
    let degree = coeffs.len() - 1;
    if degree < 3 {
        return horner_eval_plain(coeffs, x);
    }
    let k = (degree as f64).sqrt().ceil() as usize;
    let mut babies = vec![1.0; k + 1];
    for i in 1..=k {
        babies[i] = babies[i - 1] * x;
    }
    let y = babies[k];
    coeffs.chunks(k).rev().fold(0.0, |acc, chunk| {
        let part: f64 = chunk.iter().zip(&babies).map(|(&c, &b)| c * b).sum();
        acc * y + part
    })
}

/// Horner evaluation over an encrypted input, one ciphertext multiplication
/// per degree. Kept for comparison and for the low degrees where the
/// baby-step setup does not pay off.
pub(crate) fn horner_eval_tile(x: &CTile, coeffs: &[f64]) -> HeResult<CTile> {
    let coeffs = trimmed(coeffs);
    let (first, rest) = match coeffs.split_first() {
        Some(split) => split,
        None => return zero_like(x),
    };
    if rest.is_empty() {
        let mut constant = zero_like(x)?;
        constant.add_scalar(*first)?;
        return Ok(constant);
    }
    let mut acc = x.clone();
    acc.multiply_scalar(rest[rest.len() - 1])?;
    for &c in rest[..rest.len() - 1].iter().rev() {
        acc.add_scalar(c)?;
        acc.multiply(x)?;
    }
    acc.add_scalar(*first)?;
    Ok(acc)
}

/// Paterson-Stockmeyer evaluation over an encrypted input.
///
/// Baby powers `x^1..x^k` with `k = ceil(sqrt(n))` are built pairwise so
/// their depth stays logarithmic; giant powers `x^(k*2^j)` come from
/// repeated squaring. The outer recursion splits the coefficient vector at
/// the largest giant power and recombines with a single ciphertext
/// multiplication per level.
pub(crate) fn ps_eval_tile(x: &CTile, coeffs: &[f64]) -> HeResult<CTile> {
    let coeffs = trimmed(coeffs);
    if coeffs.len() <= 3 {
        return horner_eval_tile(x, coeffs);
    }
    let degree = coeffs.len() - 1;
    let k = (degree as f64).sqrt().ceil() as usize;

    let mut babies: Vec<CTile> = Vec::with_capacity(k);
    babies.push(x.clone());
    for i in 2..=k {
        let mut power = babies[i / 2 - 1].clone();
        power.multiply(&babies[i - i / 2 - 1])?;
        babies.push(power);
    }

    let mut giants = vec![babies[k - 1].clone()];
    while (k << giants.len()) <= degree {
        let mut next = giants.last().unwrap().clone();
        next.square()?;
        giants.push(next);
    }

    ps_recurse(coeffs, &babies, &giants, x)
}

fn ps_recurse(
    coeffs: &[f64],
    babies: &[CTile],
    giants: &[CTile],
    x: &CTile,
) -> HeResult<CTile> {
    let k = babies.len();
    let degree = coeffs.len() - 1;
    if degree < k {
        return baby_combination(coeffs, babies, x);
    }
    let mut level = 0;
    while (k << (level + 1)) <= degree {
        level += 1;
    }
    let (low, high) = coeffs.split_at(k << level);
    let mut result = ps_recurse(high, babies, giants, x)?;
    result.multiply(&giants[level])?;
    let low_part = ps_recurse(low, babies, giants, x)?;
    result.add(&low_part)?;
    Ok(result)
}

/// Linear combination of baby powers: scalar multiplications and additions
/// only, no nonscalar work.
pub(crate) fn baby_combination(coeffs: &[f64], babies: &[CTile], x: &CTile) -> HeResult<CTile> {
    let mut acc: Option<CTile> = None;
    for (i, &c) in coeffs.iter().enumerate().skip(1) {
        if c.abs() < POLY_EVAL_EPS {
            continue;
        }
        let mut term = babies[i - 1].clone();
        term.multiply_scalar(c)?;
        match &mut acc {
            Some(sum) => sum.add(&term)?,
            None => acc = Some(term),
        }
    }
    let mut acc = match acc {
        Some(sum) => sum,
        None => zero_like(x)?,
    };
    match coeffs.first() {
        Some(&c0) if c0.abs() >= POLY_EVAL_EPS => acc.add_scalar(c0)?,
        _ => {}
    }
    Ok(acc)
}

pub(crate) fn zero_like(x: &CTile) -> HeResult<CTile> {
    let mut zero = x.clone();
    zero.multiply_scalar(0.0)?;
    Ok(zero)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn ps_matches_horner_on_random_polynomials() {
        let mut rng = ChaCha20Rng::seed_from_u64(31);
        for degree in [0usize, 1, 2, 3, 4, 7, 15, 16, 31, 40] {
            let coeffs: Vec<f64> = (0..=degree).map(|_| rng.random_range(-2.0..2.0)).collect();
            for _ in 0..20 {
                let x = rng.random_range(-1.0..1.0);
                assert_relative_eq!(
                    ps_eval_plain(&coeffs, x),
                    horner_eval_plain(&coeffs, x),
                    epsilon = 1e-9,
                    max_relative = 1e-9
                );
            }
        }
    }

    #[test]
    fn near_zero_coefficients_are_dropped() {
        let coeffs = [1.0, 1e-30, 0.5, 1e-18];
        assert_relative_eq!(
            ps_eval_plain(&coeffs, 0.7),
            1.0 + 0.5 * 0.49,
            epsilon = 1e-12
        );
    }

    #[test]
    fn empty_and_constant_polynomials() {
        assert_eq!(ps_eval_plain(&[], 2.0), 0.0);
        assert_eq!(ps_eval_plain(&[0.0, 0.0], 2.0), 0.0);
        assert_relative_eq!(ps_eval_plain(&[4.5], 2.0), 4.5);
    }
}
