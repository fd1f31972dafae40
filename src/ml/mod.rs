//! Model training, inference, and evaluation.
//!
//! The classifier is a deterministic random forest implemented in-crate so the
//! explainer can walk its trees directly.

pub mod forest;
pub mod metrics;
mod model;

pub use forest::{DecisionTree, ForestOptions, Node, RandomForest};
pub use model::{
    ChurnModel, DEFAULT_THRESHOLD, MODEL_VERSION, ModelIoError, PredictionResult,
    SchemaMismatchError, TrainError, TrainedModel, fit,
};
