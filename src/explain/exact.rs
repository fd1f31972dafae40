//! Model-agnostic exact Shapley values by coalition enumeration.
//!
//! Evaluates `v(S) = mean_z f(x_S, z_rest)` for every subset `S` and applies the
//! Shapley weighting directly. Cost is `2^d · |background|` model calls, so it
//! is limited to small feature counts.

use crate::ml::ChurnModel;

/// Largest feature count accepted for coalition enumeration.
pub const MAX_EXACT_FEATURES: usize = 16;

/// Shapley values of `x` against `background` for an arbitrary model.
pub fn shapley_values<M: ChurnModel + ?Sized>(
    model: &M,
    x: &[f64],
    background: &[Vec<f64>],
    factorials: &[f64],
) -> Vec<f64> {
    let d = x.len();
    let subsets = 1usize << d;
    let mut hybrid = vec![0.0f64; d];
    let mut values = vec![0.0f64; subsets];
    let scale = 1.0 / background.len() as f64;
    for (mask, slot) in values.iter_mut().enumerate() {
        let mut sum = 0.0;
        for z in background {
            for (i, cell) in hybrid.iter_mut().enumerate() {
                *cell = if mask & (1 << i) != 0 { x[i] } else { z[i] };
            }
            sum += model.predict_proba(&hybrid);
        }
        *slot = sum * scale;
    }

    let total = factorials[d];
    let mut phi = vec![0.0f64; d];
    for (i, phi_i) in phi.iter_mut().enumerate() {
        let bit = 1usize << i;
        for mask in 0..subsets {
            if mask & bit != 0 {
                continue;
            }
            let size = mask.count_ones() as usize;
            let weight = factorials[size] * factorials[d - size - 1] / total;
            *phi_i += weight * (values[mask | bit] - values[mask]);
        }
    }
    phi
}
