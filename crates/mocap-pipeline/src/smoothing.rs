//! Moving least squares over timestamped samples.
//!
//! Around a query time `t`, each sample gets a tent weight
//! `w_i = max(h - |t_i - t|, 0)` and a local polynomial of order `d` in
//! `u_i = (t_i - t) / h` is fitted by weighted least squares. Its value at
//! `u = 0` is a fixed linear combination of the sample values:
//!
//! ```text
//! M = sum_i w_i p_i p_i^T,   M a = e_0,   l_i = w_i a^T p_i,   y(t) = sum_i l_i y_i
//! ```
//!
//! The weights `l_i` sum to one and reproduce polynomials up to order `d`.

use log::warn;
use mocap_core::Real;
use nalgebra::{DMatrix, DVector};

fn basis(u: Real, degree: usize) -> DVector<Real> {
    let mut p = DVector::zeros(degree + 1);
    let mut v = 1.0;
    for k in 0..=degree {
        p[k] = v;
        v *= u;
    }
    p
}

/// Number of distinct timestamps with positive weight.
fn support(times: &[Real], weights: &[Real]) -> usize {
    let mut ts: Vec<Real> = times
        .iter()
        .zip(weights.iter())
        .filter(|(_, w)| **w > 0.0)
        .map(|(t, _)| *t)
        .collect();
    ts.sort_by(|a, b| a.total_cmp(b));
    ts.dedup();
    ts.len()
}

fn normalized(weights: Vec<Real>) -> Vec<Real> {
    let total: Real = weights.iter().sum();
    if total > 0.0 {
        weights.into_iter().map(|w| w / total).collect()
    } else {
        let n = weights.len().max(1) as Real;
        vec![1.0 / n; weights.len()]
    }
}

/// Linear combination weights evaluating the local fit at `t`.
///
/// Falls back to the normalized tent weights (a weighted mean) when the
/// samples cannot determine a polynomial of the requested order.
pub fn mls_weights(times: &[Real], t: Real, half_width: Real, degree: usize) -> Vec<Real> {
    let w: Vec<Real> = times
        .iter()
        .map(|ti| (half_width - (ti - t).abs()).max(0.0))
        .collect();
    if degree == 0 {
        return normalized(w);
    }
    if support(times, &w) <= degree {
        warn!(
            "moving least squares needs {} distinct samples for degree {}, using weighted mean",
            degree + 1,
            degree
        );
        return normalized(w);
    }

    let basis_vectors: Vec<DVector<Real>> = times
        .iter()
        .map(|ti| basis((ti - t) / half_width, degree))
        .collect();
    let mut m = DMatrix::<Real>::zeros(degree + 1, degree + 1);
    for (p, wi) in basis_vectors.iter().zip(w.iter()) {
        m += p * p.transpose() * *wi;
    }
    let Some(chol) = m.cholesky() else {
        warn!("singular moving least squares system, using weighted mean");
        return normalized(w);
    };
    let mut e0 = DVector::zeros(degree + 1);
    e0[0] = 1.0;
    let a = chol.solve(&e0);
    basis_vectors
        .iter()
        .zip(w.iter())
        .map(|(p, wi)| wi * a.dot(p))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(weights: &[Real], values: &[Real]) -> Real {
        weights.iter().zip(values.iter()).map(|(w, v)| w * v).sum()
    }

    fn times(n: usize, dt: Real) -> Vec<Real> {
        (0..n).map(|i| i as Real * dt).collect()
    }

    #[test]
    fn weights_sum_to_one() {
        let ts = times(9, 1.0 / 30.0);
        for degree in 0..=3 {
            let w = mls_weights(&ts, 0.13, 0.3, degree);
            let total: Real = w.iter().sum();
            assert!((total - 1.0).abs() < 1e-10, "degree {degree}: {total}");
        }
    }

    #[test]
    fn linear_fit_reproduces_lines_at_the_endpoint() {
        let ts = times(9, 1.0 / 30.0);
        let values: Vec<Real> = ts.iter().map(|t| 2.0 - 3.0 * t).collect();
        let t = *ts.last().unwrap();
        let w = mls_weights(&ts, t, 0.3, 1);
        assert!((apply(&w, &values) - (2.0 - 3.0 * t)).abs() < 1e-10);
    }

    #[test]
    fn quadratic_fit_reproduces_parabolas() {
        let ts = times(12, 0.05);
        let values: Vec<Real> = ts.iter().map(|t| 1.0 + t - 4.0 * t * t).collect();
        let t = 0.31;
        let w = mls_weights(&ts, t, 0.3, 2);
        assert!((apply(&w, &values) - (1.0 + t - 4.0 * t * t)).abs() < 1e-9);
    }

    #[test]
    fn endpoint_spike_is_attenuated() {
        let ts = times(9, 1.0 / 30.0);
        let mut values = vec![0.0; 9];
        values[8] = 1.0;
        let w = mls_weights(&ts, ts[8], 0.3, 1);
        let smoothed = apply(&w, &values);
        assert!(smoothed > 0.0 && smoothed < 0.6, "smoothed spike {smoothed}");
    }

    #[test]
    fn coincident_timestamps_fall_back_to_mean() {
        let ts = vec![1.0; 4];
        let w = mls_weights(&ts, 1.0, 0.3, 1);
        for wi in w {
            assert!((wi - 0.25).abs() < 1e-12);
        }
    }
}
