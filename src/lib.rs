//! Churn prediction with per-customer explanations.
//!
//! Raw customer rows flow through [`features`] into a random forest in [`ml`];
//! [`explain`] attributes every prediction to its features and [`gold`] turns
//! the attributions into ranked, readable reasons for [`export`].

/// Application directory helpers.
pub mod app_dirs;
/// TOML pipeline settings.
pub mod config;
/// Customer records, loaders, and holdout splitting.
pub mod data;
/// Shapley attributions for predictions.
pub mod explain;
/// Gold and analytical writers.
pub mod export;
/// Feature engineering and categorical encoding.
pub mod features;
/// Gold dataset assembly.
pub mod gold;
/// Tracing subscriber setup.
pub mod logging;
/// Random forest training, inference, and evaluation.
pub mod ml;
/// End-to-end batch orchestration.
pub mod pipeline;
