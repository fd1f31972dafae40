use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use super::forest::{DecisionTree, ForestOptions, RandomForest, train_forest};
use crate::features::{EncodingTable, FEATURE_SCHEMA_VERSION, FeatureVector};

/// Serialized model format version.
pub const MODEL_VERSION: i64 = 1;

/// Default probability at or above which a customer is flagged as churning.
pub const DEFAULT_THRESHOLD: f64 = 0.5;

/// Scoring capability the explainer is written against.
pub trait ChurnModel: Send + Sync {
    /// Feature names in the order `predict_proba` expects.
    fn feature_names(&self) -> &[String];

    /// Raw model output: churn probability for one feature row.
    fn predict_proba(&self, features: &[f64]) -> f64;

    /// Trees whose plain average equals `predict_proba`, when the model is one.
    fn trees(&self) -> Option<&[DecisionTree]> {
        None
    }
}

/// A feature vector does not match the schema the model was trained on.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("feature schema mismatch for `{customer_id}`: {detail}")]
pub struct SchemaMismatchError {
    pub customer_id: String,
    pub detail: String,
}

#[derive(Debug, Error)]
pub enum TrainError {
    #[error("insufficient training data: {0}")]
    InsufficientData(String),
    #[error(transparent)]
    SchemaMismatch(#[from] SchemaMismatchError),
    #[error("invalid forest options: {0}")]
    InvalidOptions(String),
}

#[derive(Debug, Error)]
pub enum ModelIoError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
    #[error("invalid model JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid model: {0}")]
    Invalid(String),
}

/// Churn probability and thresholded decision for one customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub customer_id: String,
    pub probability: f64,
    pub churn: bool,
}

/// Fitted forest bound to the exact feature order it was trained on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel {
    pub model_version: i64,
    pub feature_schema_version: u32,
    pub feature_names: Vec<String>,
    /// Fingerprint of the encoding table used to build the training vectors.
    #[serde(default)]
    pub encoding_fingerprint: Option<String>,
    pub threshold: f64,
    pub options: ForestOptions,
    pub forest: RandomForest,
}

/// Fit a forest on transformed vectors and their churn labels.
pub fn fit(
    vectors: &[FeatureVector],
    labels: &[bool],
    options: &ForestOptions,
) -> Result<TrainedModel, TrainError> {
    if vectors.len() != labels.len() {
        return Err(TrainError::InsufficientData(format!(
            "{} feature vectors but {} labels",
            vectors.len(),
            labels.len()
        )));
    }
    let Some(first) = vectors.first() else {
        return Err(TrainError::InsufficientData("no training rows".to_string()));
    };
    let positives = labels.iter().filter(|&&label| label).count();
    if positives == 0 || positives == labels.len() {
        return Err(TrainError::InsufficientData(
            "both churned and retained customers are required".to_string(),
        ));
    }
    options.validate().map_err(TrainError::InvalidOptions)?;

    let feature_names = first.names().to_vec();
    if feature_names.is_empty() {
        return Err(TrainError::InsufficientData(
            "feature schema has no columns".to_string(),
        ));
    }
    for vector in vectors {
        check_names(&feature_names, vector)?;
    }
    let x: Vec<Vec<f64>> = vectors.iter().map(|v| v.values().to_vec()).collect();
    let forest = train_forest(&x, labels, options);
    info!(
        "Trained {} trees on {} rows ({} churned)",
        forest.trees.len(),
        x.len(),
        positives
    );
    Ok(TrainedModel {
        model_version: MODEL_VERSION,
        feature_schema_version: FEATURE_SCHEMA_VERSION,
        feature_names,
        encoding_fingerprint: None,
        threshold: DEFAULT_THRESHOLD,
        options: options.clone(),
        forest,
    })
}

fn check_names(expected: &[String], vector: &FeatureVector) -> Result<(), SchemaMismatchError> {
    let found = vector.names();
    if found.len() != expected.len() || vector.values().len() != expected.len() {
        return Err(SchemaMismatchError {
            customer_id: vector.customer_id().to_string(),
            detail: format!(
                "expected {} features, found {}",
                expected.len(),
                vector.values().len()
            ),
        });
    }
    if let Some(pos) = expected.iter().zip(found).position(|(a, b)| a != b) {
        return Err(SchemaMismatchError {
            customer_id: vector.customer_id().to_string(),
            detail: format!(
                "feature {pos} is `{}` but the model expects `{}`",
                found[pos], expected[pos]
            ),
        });
    }
    Ok(())
}

impl TrainedModel {
    /// Record the encoding table the training vectors were built with.
    pub fn with_encoding(mut self, encoding: &EncodingTable) -> Self {
        self.encoding_fingerprint = Some(encoding.fingerprint.clone());
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Reject vectors whose names or order differ from training.
    pub fn check_schema(&self, vector: &FeatureVector) -> Result<(), SchemaMismatchError> {
        check_names(&self.feature_names, vector)
    }

    /// Reject an encoding table other than the one used at training time.
    pub fn check_encoding(&self, encoding: &EncodingTable) -> Result<(), SchemaMismatchError> {
        match &self.encoding_fingerprint {
            Some(expected) if *expected != encoding.fingerprint => Err(SchemaMismatchError {
                customer_id: "*".to_string(),
                detail: format!(
                    "encoding table {} does not match the model's {}",
                    short(&encoding.fingerprint),
                    short(expected)
                ),
            }),
            _ => Ok(()),
        }
    }

    /// Raw model output for a schema-checked vector.
    pub fn raw_output(&self, vector: &FeatureVector) -> Result<f64, SchemaMismatchError> {
        self.check_schema(vector)?;
        Ok(self.forest.predict_proba(vector.values()))
    }

    pub fn predict(&self, vector: &FeatureVector) -> Result<PredictionResult, SchemaMismatchError> {
        let probability = self.raw_output(vector)?;
        Ok(PredictionResult {
            customer_id: vector.customer_id().to_string(),
            probability,
            churn: probability >= self.threshold,
        })
    }

    /// Score a batch; the first mismatching vector aborts the batch.
    pub fn predict_all(
        &self,
        vectors: &[FeatureVector],
    ) -> Result<Vec<PredictionResult>, SchemaMismatchError> {
        vectors.iter().map(|vector| self.predict(vector)).collect()
    }

    /// Feature importances paired with names, most important first.
    pub fn feature_importance(&self) -> Vec<(String, f64)> {
        let mut pairs: Vec<(String, f64)> = self
            .feature_names
            .iter()
            .cloned()
            .zip(self.forest.feature_importance.iter().copied())
            .collect();
        pairs.sort_by(|a, b| b.1.total_cmp(&a.1));
        pairs
    }

    /// Validate structural invariants of the model.
    pub fn validate(&self) -> Result<(), String> {
        if self.model_version != MODEL_VERSION {
            return Err(format!(
                "Unsupported model_version {} (expected {MODEL_VERSION})",
                self.model_version
            ));
        }
        if self.feature_schema_version != FEATURE_SCHEMA_VERSION {
            return Err(format!(
                "Unsupported feature_schema_version {} (expected {FEATURE_SCHEMA_VERSION})",
                self.feature_schema_version
            ));
        }
        if self.feature_names.len() != self.forest.n_features {
            return Err("feature_names length must match the forest".to_string());
        }
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(format!("threshold {} is outside [0, 1]", self.threshold));
        }
        self.forest.validate()
    }

    /// Load a model from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self, ModelIoError> {
        let bytes = std::fs::read(path).map_err(|source| ModelIoError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let model: Self = serde_json::from_slice(&bytes)?;
        model.validate().map_err(ModelIoError::Invalid)?;
        Ok(model)
    }

    pub fn save_json(&self, path: &Path) -> Result<(), ModelIoError> {
        let bytes = serde_json::to_vec_pretty(self)?;
        std::fs::write(path, bytes).map_err(|source| ModelIoError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl ChurnModel for TrainedModel {
    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn predict_proba(&self, features: &[f64]) -> f64 {
        self.forest.predict_proba(features)
    }

    fn trees(&self) -> Option<&[DecisionTree]> {
        Some(&self.forest.trees)
    }
}

fn short(fingerprint: &str) -> &str {
    fingerprint.get(..12).unwrap_or(fingerprint)
}
