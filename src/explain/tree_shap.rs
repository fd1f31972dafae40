//! Exact interventional Shapley values for tree ensembles.
//!
//! For a foreground row `x` and one background row `z`, the tree's game is
//! `v(S) = tree(x_S, z_rest)`. Walking the tree once per `(x, z)` pair enumerates
//! every leaf reachable by some hybrid row. A leaf reached with feature set `A`
//! taking `x`'s branch and `B` taking `z`'s branch contributes to `v(S)` exactly
//! when `A ⊆ S` and `B ∩ S = ∅`, whose Shapley values have the closed form
//!
//! * `i ∈ A`: `+value · (|A|-1)! |B|! / (|A|+|B|)!`
//! * `j ∈ B`: `-value · |A|! (|B|-1)! / (|A|+|B|)!`
//!
//! Averaging over trees and background rows gives attributions whose sum is
//! `f(x) - mean_z f(z)`.

use crate::ml::{DecisionTree, Node, forest::goes_left};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Side {
    Unset,
    Foreground,
    Background,
}

struct PathState<'a> {
    x: &'a [f64],
    z: &'a [f64],
    sides: Vec<Side>,
    foreground: Vec<usize>,
    background: Vec<usize>,
    factorials: &'a [f64],
}

/// Accumulate `scale ·` the Shapley values of `tree` for `(x, z)` into `phi`.
pub fn accumulate_tree(
    tree: &DecisionTree,
    x: &[f64],
    z: &[f64],
    factorials: &[f64],
    scale: f64,
    phi: &mut [f64],
) {
    let mut state = PathState {
        x,
        z,
        sides: vec![Side::Unset; x.len()],
        foreground: Vec::new(),
        background: Vec::new(),
        factorials,
    };
    walk(tree, 0, &mut state, scale, phi);
}

fn walk(tree: &DecisionTree, idx: usize, state: &mut PathState<'_>, scale: f64, phi: &mut [f64]) {
    match &tree.nodes[idx] {
        Node::Leaf { value, .. } => credit_leaf(*value, state, scale, phi),
        Node::Split {
            feature,
            threshold,
            left,
            right,
            ..
        } => {
            let f = *feature;
            let x_child = if goes_left(value_at(state.x, f), *threshold) { *left } else { *right };
            let z_child = if goes_left(value_at(state.z, f), *threshold) { *left } else { *right };
            match state.sides.get(f).copied().unwrap_or(Side::Unset) {
                Side::Foreground => walk(tree, x_child, state, scale, phi),
                Side::Background => walk(tree, z_child, state, scale, phi),
                Side::Unset if x_child == z_child => walk(tree, x_child, state, scale, phi),
                Side::Unset => {
                    state.sides[f] = Side::Foreground;
                    state.foreground.push(f);
                    walk(tree, x_child, state, scale, phi);
                    state.foreground.pop();

                    state.sides[f] = Side::Background;
                    state.background.push(f);
                    walk(tree, z_child, state, scale, phi);
                    state.background.pop();
                    state.sides[f] = Side::Unset;
                }
            }
        }
    }
}

fn credit_leaf(value: f64, state: &PathState<'_>, scale: f64, phi: &mut [f64]) {
    let a = state.foreground.len();
    let b = state.background.len();
    if a + b == 0 || value == 0.0 {
        return;
    }
    let fact = state.factorials;
    let total = fact[a + b];
    if a > 0 {
        let gain = scale * value * fact[a - 1] * fact[b] / total;
        for &i in &state.foreground {
            phi[i] += gain;
        }
    }
    if b > 0 {
        let loss = scale * value * fact[a] * fact[b - 1] / total;
        for &j in &state.background {
            phi[j] -= loss;
        }
    }
}

fn value_at(row: &[f64], feature: usize) -> f64 {
    row.get(feature).copied().unwrap_or(0.0)
}

/// `factorials[k] = k!` for `k in 0..=n`.
pub fn factorials(n: usize) -> Vec<f64> {
    let mut out = Vec::with_capacity(n + 1);
    let mut acc = 1.0f64;
    out.push(acc);
    for k in 1..=n {
        acc *= k as f64;
        out.push(acc);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_feature_tree() -> DecisionTree {
        // x0 <= 0.5 ? (x1 <= 0.5 ? 0.0 : 0.4) : 1.0
        DecisionTree {
            nodes: vec![
                Node::Split {
                    feature: 0,
                    threshold: 0.5,
                    left: 1,
                    right: 4,
                    samples: 4,
                },
                Node::Split {
                    feature: 1,
                    threshold: 0.5,
                    left: 2,
                    right: 3,
                    samples: 2,
                },
                Node::Leaf {
                    value: 0.0,
                    samples: 1,
                },
                Node::Leaf {
                    value: 0.4,
                    samples: 1,
                },
                Node::Leaf {
                    value: 1.0,
                    samples: 2,
                },
            ],
        }
    }

    #[test]
    fn matches_hand_computed_shapley_values() {
        let tree = two_feature_tree();
        let fact = factorials(2);
        let x = [1.0, 1.0];
        let z = [0.0, 0.0];
        let mut phi = [0.0; 2];
        accumulate_tree(&tree, &x, &z, &fact, 1.0, &mut phi);
        // v({})=0, v({0})=1, v({1})=0.4, v({0,1})=1
        // phi0 = 0.5*(1-0) + 0.5*(1-0.4) = 0.8, phi1 = 0.5*(0.4-0) + 0.5*(1-1) = 0.2
        assert!((phi[0] - 0.8).abs() < 1e-12);
        assert!((phi[1] - 0.2).abs() < 1e-12);
    }

    #[test]
    fn identical_rows_get_no_credit() {
        let tree = two_feature_tree();
        let fact = factorials(2);
        let mut phi = [0.0; 2];
        accumulate_tree(&tree, &[0.2, 0.9], &[0.2, 0.9], &fact, 1.0, &mut phi);
        assert_eq!(phi, [0.0, 0.0]);
    }

    #[test]
    fn repeated_feature_keeps_its_side() {
        // x0 <= 0.5 ? (x0 <= 0.2 ? 0.1 : 0.3) : 0.9
        let tree = DecisionTree {
            nodes: vec![
                Node::Split {
                    feature: 0,
                    threshold: 0.5,
                    left: 1,
                    right: 4,
                    samples: 3,
                },
                Node::Split {
                    feature: 0,
                    threshold: 0.2,
                    left: 2,
                    right: 3,
                    samples: 2,
                },
                Node::Leaf {
                    value: 0.1,
                    samples: 1,
                },
                Node::Leaf {
                    value: 0.3,
                    samples: 1,
                },
                Node::Leaf {
                    value: 0.9,
                    samples: 1,
                },
            ],
        };
        let fact = factorials(1);
        let mut phi = [0.0; 1];
        accumulate_tree(&tree, &[0.1], &[0.9], &fact, 1.0, &mut phi);
        assert!((phi[0] - (0.1 - 0.9)).abs() < 1e-12);
    }
}
