//! Chebyshev interpolation on `[-1, 1]`.
//!
//! Used to fit the scaled-sine cleanup polynomial of the bootstrap pipeline
//! and available to callers fitting their own activations. Coefficients are
//! produced in the Chebyshev basis and converted to the monomial basis, which
//! is what the polynomial evaluators consume.

/// Coefficients of the degree-`degree` Chebyshev interpolant of `f` on
/// `[a, b]`, sampled through the Chebyshev-Gauss nodes, in the Chebyshev
/// basis `T_0..T_degree` of the normalized variable `u = (2x - a - b)/(b - a)`.
pub fn chebyshev_coefficients(
    f: impl Fn(f64) -> f64,
    a: f64,
    b: f64,
    degree: usize,
) -> Vec<f64> {
    let mid = 0.5 * (a + b);
    let half = 0.5 * (b - a);
    let n = degree + 1;
    let samples: Vec<f64> = (0..n)
        .map(|j| {
            let theta = std::f64::consts::PI * (j as f64 + 0.5) / n as f64;
            f(mid + half * theta.cos())
        })
        .collect();
    (0..n)
        .map(|k| {
            let sum: f64 = samples
                .iter()
                .enumerate()
                .map(|(j, &s)| {
                    let theta = std::f64::consts::PI * (j as f64 + 0.5) / n as f64;
                    s * (k as f64 * theta).cos()
                })
                .sum();
            let weight = if k == 0 { 1.0 } else { 2.0 };
            weight * sum / n as f64
        })
        .collect()
}

/// Converts a Chebyshev-basis series to monomial coefficients, low degree
/// first, via the recurrence `T_{k+1}(x) = 2x T_k(x) - T_{k-1}(x)`.
///
/// Numerically safe for the moderate degrees used here; the conversion grows
/// unstable past degree a few hundred.
pub fn chebyshev_to_monomial(cheb: &[f64]) -> Vec<f64> {
    let n = cheb.len();
    if n == 0 {
        return Vec::new();
    }
    let mut result = vec![0.0; n];
    let mut t_prev = vec![0.0; n];
    let mut t_cur = vec![0.0; n];
    t_prev[0] = 1.0;
    result[0] = cheb[0];
    if n > 1 {
        t_cur[1] = 1.0;
        result[1] += cheb[1];
    }
    for c in cheb.iter().skip(2) {
        let mut t_next = vec![0.0; n];
        for i in 0..n - 1 {
            t_next[i + 1] = 2.0 * t_cur[i];
        }
        for (next, prev) in t_next.iter_mut().zip(&t_prev) {
            *next -= prev;
        }
        for (acc, t) in result.iter_mut().zip(&t_next) {
            *acc += c * t;
        }
        t_prev = t_cur;
        t_cur = t_next;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::paterson_stockmeyer::horner_eval_plain;
    use approx::assert_abs_diff_eq;

    #[test]
    fn low_degree_conversions_are_exact() {
        // 1*T_0 + 2*T_1 + 3*T_2 = 3x^2-... T_2 = 2x^2-1
        let mono = chebyshev_to_monomial(&[1.0, 2.0, 3.0]);
        assert_abs_diff_eq!(mono[0], -2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(mono[1], 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(mono[2], 6.0, epsilon = 1e-12);
    }

    #[test]
    fn interpolant_tracks_a_smooth_function() {
        let f = |x: f64| (3.0 * x).sin() + 0.5 * x;
        let mono = chebyshev_to_monomial(&chebyshev_coefficients(f, -1.0, 1.0, 23));
        for i in 0..=100 {
            let x = -1.0 + 0.02 * i as f64;
            assert_abs_diff_eq!(horner_eval_plain(&mono, x), f(x), epsilon = 1e-9);
        }
    }

    #[test]
    fn interpolant_on_a_shifted_interval() {
        // Interval [0, 4]; the series lives in u = (x - 2) / 2.
        let f = |x: f64| x.exp() / 60.0;
        let mono = chebyshev_to_monomial(&chebyshev_coefficients(f, 0.0, 4.0, 19));
        for i in 0..=40 {
            let x = 0.1 * i as f64;
            let u = (x - 2.0) / 2.0;
            assert_abs_diff_eq!(horner_eval_plain(&mono, u), f(x), epsilon = 1e-9);
        }
    }

    #[test]
    fn interpolating_a_polynomial_recovers_it() {
        // x^3 itself: monomial round trip must be exact up to rounding.
        let mono =
            chebyshev_to_monomial(&chebyshev_coefficients(|x| x * x * x, -1.0, 1.0, 5));
        let expected = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0];
        for (got, want) in mono.iter().zip(expected) {
            assert_abs_diff_eq!(*got, want, epsilon = 1e-12);
        }
    }
}
