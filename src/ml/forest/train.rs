use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::RandomForest;
use super::tree::{DecisionTree, Node, goes_left};

/// Random forest hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestOptions {
    /// Number of trees in the ensemble.
    pub n_trees: usize,
    /// Maximum depth of each tree (root has depth 0).
    pub max_depth: usize,
    /// Minimum rows required to attempt a split.
    pub min_samples_split: usize,
    /// Minimum rows on each side of a split.
    pub min_samples_leaf: usize,
    /// Candidate features per split; `None` means `ceil(sqrt(d))`.
    pub max_features: Option<usize>,
    /// Draw a bootstrap sample per tree.
    pub bootstrap: bool,
    /// Base seed; tree `i` uses `seed + i`.
    pub seed: u64,
}

impl Default for ForestOptions {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: 10,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            bootstrap: true,
            seed: 42,
        }
    }
}

impl ForestOptions {
    pub fn validate(&self) -> Result<(), String> {
        if self.n_trees == 0 {
            return Err("n_trees must be >= 1".to_string());
        }
        if self.min_samples_leaf == 0 {
            return Err("min_samples_leaf must be >= 1".to_string());
        }
        if self.max_features == Some(0) {
            return Err("max_features must be >= 1".to_string());
        }
        Ok(())
    }

    fn features_per_split(&self, n_features: usize) -> usize {
        let default = (n_features as f64).sqrt().ceil() as usize;
        self.max_features.unwrap_or(default).clamp(1, n_features.max(1))
    }
}

/// Fit a forest on a dense row-major matrix.
///
/// Callers validate shapes and labels; this only builds trees.
pub fn train_forest(x: &[Vec<f64>], y: &[bool], options: &ForestOptions) -> RandomForest {
    let n_features = x.first().map(Vec::len).unwrap_or(0);
    let mut importance = vec![0.0f64; n_features];
    let mut trees = Vec::with_capacity(options.n_trees);
    for tree_idx in 0..options.n_trees {
        let mut rng = StdRng::seed_from_u64(options.seed.wrapping_add(tree_idx as u64));
        let mut samples: Vec<usize> = if options.bootstrap {
            (0..x.len()).map(|_| rng.random_range(0..x.len())).collect()
        } else {
            (0..x.len()).collect()
        };
        let mut builder = TreeBuilder {
            x,
            y,
            options,
            n_features,
            mtry: options.features_per_split(n_features),
            nodes: Vec::new(),
            importance: vec![0.0; n_features],
        };
        builder.grow(&mut samples, 0, &mut rng);
        let tree = DecisionTree {
            nodes: builder.nodes,
        };
        debug!(
            "Tree {tree_idx}: depth {} with {} leaves",
            tree.depth(),
            tree.leaf_count()
        );
        let total: f64 = builder.importance.iter().sum();
        if total > 0.0 {
            for (acc, value) in importance.iter_mut().zip(&builder.importance) {
                *acc += value / total;
            }
        }
        trees.push(tree);
    }
    let sum: f64 = importance.iter().sum();
    if sum > 0.0 {
        for value in &mut importance {
            *value /= sum;
        }
    }
    RandomForest {
        n_features,
        trees,
        feature_importance: importance,
    }
}

struct TreeBuilder<'a> {
    x: &'a [Vec<f64>],
    y: &'a [bool],
    options: &'a ForestOptions,
    n_features: usize,
    mtry: usize,
    nodes: Vec<Node>,
    importance: Vec<f64>,
}

#[derive(Debug, Clone, Copy)]
struct BestSplit {
    feature: usize,
    threshold: f64,
    impurity: f64,
}

impl TreeBuilder<'_> {
    fn grow(&mut self, samples: &mut [usize], depth: usize, rng: &mut StdRng) -> usize {
        let n = samples.len();
        let positives = samples.iter().filter(|&&idx| self.y[idx]).count();
        let value = if n == 0 { 0.0 } else { positives as f64 / n as f64 };
        let node_idx = self.nodes.len();
        self.nodes.push(Node::Leaf { value, samples: n });

        let pure = positives == 0 || positives == n;
        if pure || depth >= self.options.max_depth || n < self.options.min_samples_split.max(2) {
            return node_idx;
        }
        let parent_impurity = gini(positives, n);
        let Some(best) = self.find_split(samples, rng) else {
            return node_idx;
        };
        if best.impurity >= parent_impurity - 1e-12 {
            return node_idx;
        }
        self.importance[best.feature] += n as f64 * (parent_impurity - best.impurity);

        let (mut left, mut right): (Vec<usize>, Vec<usize>) = samples
            .iter()
            .copied()
            .partition(|&idx| goes_left(self.x[idx][best.feature], best.threshold));
        let left_idx = self.grow(&mut left, depth + 1, rng);
        let right_idx = self.grow(&mut right, depth + 1, rng);
        self.nodes[node_idx] = Node::Split {
            feature: best.feature,
            threshold: best.threshold,
            left: left_idx,
            right: right_idx,
            samples: n,
        };
        node_idx
    }

    /// Search a random feature subset; fall back to the remaining features when
    /// none of the drawn ones admits a valid split.
    fn find_split(&self, samples: &mut [usize], rng: &mut StdRng) -> Option<BestSplit> {
        if self.n_features == 0 {
            return None;
        }
        let mut drawn = index::sample(rng, self.n_features, self.mtry).into_vec();
        drawn.sort_unstable();
        let mut best = self.best_over(samples, &drawn);
        if best.is_none() && drawn.len() < self.n_features {
            let rest: Vec<usize> = (0..self.n_features)
                .filter(|feature| drawn.binary_search(feature).is_err())
                .collect();
            best = self.best_over(samples, &rest);
        }
        best
    }

    fn best_over(&self, samples: &mut [usize], features: &[usize]) -> Option<BestSplit> {
        let mut best: Option<BestSplit> = None;
        for &feature in features {
            if let Some(candidate) = self.best_split_for_feature(samples, feature)
                && best.is_none_or(|current| candidate.impurity < current.impurity)
            {
                best = Some(candidate);
            }
        }
        best
    }

    fn best_split_for_feature(&self, samples: &mut [usize], feature: usize) -> Option<BestSplit> {
        let x = self.x;
        samples.sort_by(|&a, &b| x[a][feature].total_cmp(&x[b][feature]));
        let n = samples.len();
        let total_pos = samples.iter().filter(|&&idx| self.y[idx]).count();
        let min_leaf = self.options.min_samples_leaf;

        let mut best: Option<BestSplit> = None;
        let mut left_pos = 0usize;
        for i in 0..n - 1 {
            if self.y[samples[i]] {
                left_pos += 1;
            }
            let left_n = i + 1;
            let right_n = n - left_n;
            let lo = x[samples[i]][feature];
            let hi = x[samples[i + 1]][feature];
            if lo >= hi || left_n < min_leaf || right_n < min_leaf {
                continue;
            }
            let impurity = (left_n as f64 * gini(left_pos, left_n)
                + right_n as f64 * gini(total_pos - left_pos, right_n))
                / n as f64;
            if best.is_none_or(|current| impurity < current.impurity) {
                best = Some(BestSplit {
                    feature,
                    threshold: midpoint(lo, hi),
                    impurity,
                });
            }
        }
        best
    }
}

fn gini(positives: usize, n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let p = positives as f64 / n as f64;
    2.0 * p * (1.0 - p)
}

/// Midpoint that still separates `lo` from `hi` under `value <= threshold`.
fn midpoint(lo: f64, hi: f64) -> f64 {
    let mid = lo + (hi - lo) / 2.0;
    if mid >= hi { lo } else { mid }
}
