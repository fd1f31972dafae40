//! Per-prediction feature attributions.
//!
//! [`Explainer`] assigns each feature a signed share of the gap between the
//! model output for one customer and the baseline, the mean output over a
//! background set fixed at construction. Attributions are exact interventional
//! Shapley values, so no sampling is involved and repeated calls are
//! bit-identical. Every explanation is checked for additivity before it is
//! returned.

mod exact;
mod tree_shap;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::index;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::features::FeatureVector;
use crate::ml::{ChurnModel, SchemaMismatchError};

pub use exact::MAX_EXACT_FEATURES;

/// Allowed gap between `baseline + Σ contributions` and the model output,
/// relative to `max(1, |output|)`.
pub const ADDITIVITY_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExplainabilityError {
    #[error("background set is empty")]
    EmptyBackground,
    #[error(transparent)]
    SchemaMismatch(#[from] SchemaMismatchError),
    #[error("exact explanation supports at most {limit} features, model has {features}")]
    TooManyFeatures { features: usize, limit: usize },
    #[error(
        "attributions for `{customer_id}` are not additive: baseline + sum = {reconstructed}, model output = {output}"
    )]
    Additivity {
        customer_id: String,
        reconstructed: f64,
        output: f64,
    },
}

/// Algorithm used to compute attributions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExplainMethod {
    /// Walks tree structure; requires [`ChurnModel::trees`].
    Tree,
    /// Enumerates every feature coalition; works for any model.
    Exact,
}

/// One feature's signed contribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribution {
    pub feature: String,
    pub value: f64,
}

/// Attributions for one prediction, in model feature order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributionSet {
    pub customer_id: String,
    pub baseline: f64,
    pub raw_output: f64,
    pub contributions: Vec<Attribution>,
}

impl AttributionSet {
    pub fn get(&self, feature: &str) -> Option<f64> {
        self.contributions
            .iter()
            .find(|entry| entry.feature == feature)
            .map(|entry| entry.value)
    }

    pub fn sum(&self) -> f64 {
        self.contributions.iter().map(|entry| entry.value).sum()
    }

    /// `baseline + Σ contributions - raw_output`.
    pub fn additivity_gap(&self) -> f64 {
        self.baseline + self.sum() - self.raw_output
    }

    /// The `k` largest contributions by magnitude; ties keep feature order.
    pub fn top_k(&self, k: usize) -> Vec<&Attribution> {
        let mut ranked: Vec<&Attribution> = self.contributions.iter().collect();
        ranked.sort_by(|a, b| b.value.abs().total_cmp(&a.value.abs()));
        ranked.truncate(k);
        ranked
    }
}

/// Attribution engine bound to one model and background set.
pub struct Explainer<'m, M: ChurnModel + ?Sized> {
    model: &'m M,
    background: Vec<Vec<f64>>,
    baseline: f64,
    method: ExplainMethod,
    factorials: Vec<f64>,
}

impl<'m, M: ChurnModel + ?Sized> Explainer<'m, M> {
    /// Build an explainer, choosing the tree walk when the model exposes trees.
    pub fn new(model: &'m M, background: &[FeatureVector]) -> Result<Self, ExplainabilityError> {
        let method = if model.trees().is_some() {
            ExplainMethod::Tree
        } else {
            ExplainMethod::Exact
        };
        Self::with_method(model, background, method)
    }

    pub fn with_method(
        model: &'m M,
        background: &[FeatureVector],
        method: ExplainMethod,
    ) -> Result<Self, ExplainabilityError> {
        if background.is_empty() {
            return Err(ExplainabilityError::EmptyBackground);
        }
        let names = model.feature_names();
        let method = match method {
            ExplainMethod::Tree if model.trees().is_none() => ExplainMethod::Exact,
            other => other,
        };
        if method == ExplainMethod::Exact && names.len() > MAX_EXACT_FEATURES {
            return Err(ExplainabilityError::TooManyFeatures {
                features: names.len(),
                limit: MAX_EXACT_FEATURES,
            });
        }
        for row in background {
            check_schema(names, row)?;
        }
        let background: Vec<Vec<f64>> = background.iter().map(|v| v.values().to_vec()).collect();
        let baseline =
            background.iter().map(|z| model.predict_proba(z)).sum::<f64>() / background.len() as f64;
        debug!(
            "Explainer ready: {:?} over {} background rows, baseline {baseline:.6}",
            method,
            background.len()
        );
        Ok(Self {
            model,
            background,
            baseline,
            method,
            factorials: tree_shap::factorials(names.len()),
        })
    }

    /// Mean model output over the background set.
    pub fn baseline(&self) -> f64 {
        self.baseline
    }

    pub fn method(&self) -> ExplainMethod {
        self.method
    }

    pub fn explain(&self, vector: &FeatureVector) -> Result<AttributionSet, ExplainabilityError> {
        let names = self.model.feature_names();
        check_schema(names, vector)?;
        let x = vector.values();
        let raw_output = self.model.predict_proba(x);
        let phi = match (self.method, self.model.trees()) {
            (ExplainMethod::Tree, Some(trees)) => self.tree_values(trees, x),
            _ => exact::shapley_values(self.model, x, &self.background, &self.factorials),
        };
        let set = AttributionSet {
            customer_id: vector.customer_id().to_string(),
            baseline: self.baseline,
            raw_output,
            contributions: names
                .iter()
                .zip(phi)
                .map(|(feature, value)| Attribution {
                    feature: feature.clone(),
                    value,
                })
                .collect(),
        };
        verify_additivity(&set)?;
        Ok(set)
    }

    /// Explain a batch; the first failure aborts the batch.
    pub fn explain_all(
        &self,
        vectors: &[FeatureVector],
    ) -> Result<Vec<AttributionSet>, ExplainabilityError> {
        vectors.iter().map(|vector| self.explain(vector)).collect()
    }

    fn tree_values(&self, trees: &[crate::ml::DecisionTree], x: &[f64]) -> Vec<f64> {
        let mut phi = vec![0.0f64; x.len()];
        let scale = 1.0 / (trees.len() * self.background.len()) as f64;
        for tree in trees {
            for z in &self.background {
                tree_shap::accumulate_tree(tree, x, z, &self.factorials, scale, &mut phi);
            }
        }
        phi
    }
}

/// Fail when `baseline + Σ contributions` drifts from the model output.
pub fn verify_additivity(set: &AttributionSet) -> Result<(), ExplainabilityError> {
    let gap = set.additivity_gap();
    let tolerance = ADDITIVITY_TOLERANCE * set.raw_output.abs().max(1.0);
    if gap.is_finite() && gap.abs() <= tolerance {
        return Ok(());
    }
    Err(ExplainabilityError::Additivity {
        customer_id: set.customer_id.clone(),
        reconstructed: set.baseline + set.sum(),
        output: set.raw_output,
    })
}

/// Deterministically pick up to `size` background rows from `vectors`.
pub fn sample_background(vectors: &[FeatureVector], size: usize, seed: u64) -> Vec<FeatureVector> {
    if vectors.len() <= size {
        return vectors.to_vec();
    }
    let mut rng = StdRng::seed_from_u64(seed);
    let mut picked = index::sample(&mut rng, vectors.len(), size).into_vec();
    picked.sort_unstable();
    picked.into_iter().map(|idx| vectors[idx].clone()).collect()
}

fn check_schema(names: &[String], vector: &FeatureVector) -> Result<(), SchemaMismatchError> {
    if vector.names() == names && vector.values().len() == names.len() {
        return Ok(());
    }
    Err(SchemaMismatchError {
        customer_id: vector.customer_id().to_string(),
        detail: "vector schema differs from the model's feature order".to_string(),
    })
}
