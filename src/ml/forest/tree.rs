use serde::{Deserialize, Serialize};

/// One node of a decision tree stored in pre-order inside [`DecisionTree::nodes`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    /// Internal node: rows with `features[feature] <= threshold` go left.
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
        /// Training rows (bootstrap draws) that reached this node.
        samples: usize,
    },
    /// Terminal node holding the churn probability of its training rows.
    Leaf { value: f64, samples: usize },
}

impl Node {
    pub fn samples(&self) -> usize {
        match self {
            Node::Split { samples, .. } | Node::Leaf { samples, .. } => *samples,
        }
    }
}

/// Binary classification tree predicting `P(churn)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    pub nodes: Vec<Node>,
}

impl DecisionTree {
    /// Single-leaf tree, used when a bootstrap sample has no usable split.
    pub fn constant(value: f64, samples: usize) -> Self {
        Self {
            nodes: vec![Node::Leaf { value, samples }],
        }
    }

    pub fn root(&self) -> &Node {
        &self.nodes[0]
    }

    /// Walk from the root to the leaf selected by `features`.
    pub fn predict(&self, features: &[f64]) -> f64 {
        let mut idx = 0usize;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { value, .. } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    let value = features.get(*feature).copied().unwrap_or(0.0);
                    idx = if goes_left(value, *threshold) { *left } else { *right };
                }
            }
        }
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize) -> usize {
            match &nodes[idx] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        walk(&self.nodes, 0)
    }

    pub fn leaf_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|node| matches!(node, Node::Leaf { .. }))
            .count()
    }

    /// Validate structural invariants of the tree.
    ///
    /// Children always sit after their parent, which also rules out cycles.
    pub fn validate(&self, n_features: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("Tree has no nodes".to_string());
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            match node {
                Node::Leaf { value, .. } => {
                    if !value.is_finite() || !(0.0..=1.0).contains(value) {
                        return Err(format!("Leaf {idx} value {value} is outside [0, 1]"));
                    }
                }
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    if *feature >= n_features {
                        return Err(format!(
                            "Node {idx} splits on feature {feature} but only {n_features} exist"
                        ));
                    }
                    if !threshold.is_finite() {
                        return Err(format!("Node {idx} has a non-finite threshold"));
                    }
                    for child in [*left, *right] {
                        if child <= idx || child >= self.nodes.len() {
                            return Err(format!("Node {idx} has invalid child index {child}"));
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

/// Shared routing rule so training, inference, and explanation agree.
#[inline]
pub fn goes_left(value: f64, threshold: f64) -> bool {
    value <= threshold
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stump() -> DecisionTree {
        DecisionTree {
            nodes: vec![
                Node::Split {
                    feature: 0,
                    threshold: 0.5,
                    left: 1,
                    right: 2,
                    samples: 4,
                },
                Node::Leaf {
                    value: 0.25,
                    samples: 2,
                },
                Node::Leaf {
                    value: 1.0,
                    samples: 2,
                },
            ],
        }
    }

    #[test]
    fn predict_routes_boundary_left() {
        let tree = stump();
        assert_eq!(tree.predict(&[0.0]), 0.25);
        assert_eq!(tree.predict(&[0.5]), 0.25);
        assert_eq!(tree.predict(&[0.6]), 1.0);
        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.leaf_count(), 2);
    }

    #[test]
    fn validate_rejects_backward_children_and_bad_features() {
        let tree = stump();
        tree.validate(1).unwrap();
        assert!(tree.validate(0).is_err());

        let mut looped = stump();
        if let Node::Split { right, .. } = &mut looped.nodes[0] {
            *right = 0;
        }
        assert!(looped.validate(1).is_err());
    }
}
