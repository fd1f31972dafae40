//! Random forest of Gini CART trees averaging per-tree churn probabilities.
//!
//! Each tree is grown on its own bootstrap draw with a per-split random feature
//! subset. The ensemble output is the plain mean of the trees' leaf
//! probabilities, which keeps Shapley attributions additive across trees.

mod train;
mod tree;

use serde::{Deserialize, Serialize};

pub use train::{ForestOptions, train_forest};
pub use tree::{DecisionTree, Node, goes_left};

/// Fitted ensemble of decision trees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    /// Number of features every row must have.
    pub n_features: usize,
    pub trees: Vec<DecisionTree>,
    /// Normalized mean decrease in impurity per feature.
    pub feature_importance: Vec<f64>,
}

impl RandomForest {
    /// Mean of the per-tree churn probabilities.
    pub fn predict_proba(&self, features: &[f64]) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.trees.iter().map(|tree| tree.predict(features)).sum();
        sum / self.trees.len() as f64
    }

    /// Validate structural invariants of the forest.
    pub fn validate(&self) -> Result<(), String> {
        if self.trees.is_empty() {
            return Err("Forest must contain at least one tree".to_string());
        }
        if self.feature_importance.len() != self.n_features {
            return Err(format!(
                "feature_importance has {} entries but the forest has {} features",
                self.feature_importance.len(),
                self.n_features
            ));
        }
        for (idx, tree) in self.trees.iter().enumerate() {
            tree.validate(self.n_features)
                .map_err(|err| format!("Tree {idx}: {err}"))?;
        }
        Ok(())
    }
}
