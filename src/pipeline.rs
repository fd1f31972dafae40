//! Batch orchestration: train a model bundle, then score and explain a batch.
//!
//! Every stage aborts the whole batch on the first failing record. Failures are
//! logged before they are returned and nothing is written for a failed batch.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::{ConfigError, PipelineConfig};
use crate::data::{CustomerRecord, LoadError, SchemaError, load_records, require_labels, split};
use crate::explain::{AttributionSet, ExplainabilityError, Explainer, sample_background};
use crate::export::{self, Artifact, ExportError};
use crate::features::{EncodingTable, FeatureTransformer, FeatureVector};
use crate::gold::{GoldBuilder, GoldError, GoldRecord};
use crate::ml::metrics::{self, EvaluationReport};
use crate::ml::{ModelIoError, PredictionResult, SchemaMismatchError, TrainError, TrainedModel, fit};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Train(#[from] TrainError),
    #[error(transparent)]
    SchemaMismatch(#[from] SchemaMismatchError),
    #[error(transparent)]
    Explain(#[from] ExplainabilityError),
    #[error(transparent)]
    Gold(#[from] GoldError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error(transparent)]
    ModelIo(#[from] ModelIoError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Everything needed to score new data: model, encoding, and background rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelBundle {
    pub model: TrainedModel,
    pub encoding: EncodingTable,
    pub background: Vec<Vec<f64>>,
}

impl ModelBundle {
    pub fn validate(&self) -> Result<(), String> {
        self.model.validate()?;
        self.encoding.validate()?;
        self.model
            .check_encoding(&self.encoding)
            .map_err(|err| err.to_string())?;
        if self.background.is_empty() {
            return Err("bundle has no background rows".to_string());
        }
        let width = self.model.feature_names.len();
        if let Some(pos) = self.background.iter().position(|row| row.len() != width) {
            return Err(format!("background row {pos} does not have {width} values"));
        }
        Ok(())
    }

    pub fn transformer(&self) -> FeatureTransformer {
        FeatureTransformer::new(self.encoding.clone())
    }

    /// Background rows as vectors in the model's feature order.
    pub fn background_vectors(&self) -> Result<Vec<FeatureVector>, SchemaError> {
        let names: Arc<[String]> = Arc::from(self.model.feature_names.clone());
        self.background
            .iter()
            .enumerate()
            .map(|(idx, row)| {
                FeatureVector::new(format!("background-{idx}"), Arc::clone(&names), row.clone())
            })
            .collect()
    }

    pub fn load_json(path: &Path) -> Result<Self, ModelIoError> {
        let bytes = std::fs::read(path).map_err(|source| ModelIoError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let bundle: Self = serde_json::from_slice(&bytes)?;
        bundle.validate().map_err(ModelIoError::Invalid)?;
        Ok(bundle)
    }

    pub fn to_json_bytes(&self) -> Result<Vec<u8>, ModelIoError> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    pub fn save_json(&self, path: &Path) -> Result<(), ModelIoError> {
        let bytes = self.to_json_bytes()?;
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|source| ModelIoError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(path, bytes).map_err(|source| ModelIoError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[derive(Debug, Clone)]
pub struct TrainOutcome {
    pub bundle: ModelBundle,
    /// Holdout metrics; absent when the split left no test rows.
    pub evaluation: Option<EvaluationReport>,
    pub train_rows: usize,
    pub test_rows: usize,
}

#[derive(Debug, Clone)]
pub struct ScoreOutcome {
    pub predictions: Vec<PredictionResult>,
    pub attributions: Vec<AttributionSet>,
    pub gold: Vec<GoldRecord>,
}

/// Output locations for an end-to-end run.
#[derive(Debug, Clone)]
pub struct RunPaths {
    pub bundle: PathBuf,
    pub gold: PathBuf,
    pub analytical: Option<PathBuf>,
}

/// Fit encoding and forest on the training split of labeled `records`.
pub fn train(records: &[CustomerRecord], config: &PipelineConfig) -> Result<TrainOutcome, PipelineError> {
    train_batch(records, config).inspect_err(|err| error!("Training aborted: {err}"))
}

fn train_batch(records: &[CustomerRecord], config: &PipelineConfig) -> Result<TrainOutcome, PipelineError> {
    config.validate().map_err(PipelineError::InvalidConfig)?;
    let labels = require_labels(records)?;
    let (train_idx, test_idx) =
        split::train_test_indices(records, &config.split.seed, config.split.test_fraction);
    info!(
        "Split {} records into {} train / {} test",
        records.len(),
        train_idx.len(),
        test_idx.len()
    );
    let pick = |indices: &[usize]| -> (Vec<CustomerRecord>, Vec<bool>) {
        indices
            .iter()
            .map(|&idx| (records[idx].clone(), labels[idx]))
            .unzip()
    };
    let (train_records, train_labels) = pick(&train_idx);
    let (test_records, test_labels) = pick(&test_idx);

    let transformer = FeatureTransformer::fit(&train_records);
    let train_vectors = transformer.transform_all(&train_records)?;
    let model = fit(&train_vectors, &train_labels, &config.forest)?
        .with_encoding(transformer.encoding())
        .with_threshold(config.gold.decision_threshold);

    let evaluation = if test_records.is_empty() {
        warn!("Holdout split is empty; skipping evaluation");
        None
    } else {
        let test_vectors = transformer.transform_all(&test_records)?;
        let predictions = model.predict_all(&test_vectors)?;
        let report = metrics::evaluate(&predictions, &test_labels);
        info!(
            "Holdout accuracy {:.3} (churn precision {:.3}, recall {:.3})",
            report.accuracy, report.churned.precision, report.churned.recall
        );
        Some(report)
    };

    let background = sample_background(
        &train_vectors,
        config.explain.background_size,
        config.explain.seed,
    );
    let bundle = ModelBundle {
        model,
        encoding: transformer.encoding().clone(),
        background: background.iter().map(|v| v.values().to_vec()).collect(),
    };
    Ok(TrainOutcome {
        bundle,
        evaluation,
        train_rows: train_records.len(),
        test_rows: test_records.len(),
    })
}

/// Predict, explain, and build gold records for `records`.
pub fn score(
    records: &[CustomerRecord],
    bundle: &ModelBundle,
    config: &PipelineConfig,
) -> Result<ScoreOutcome, PipelineError> {
    score_batch(records, bundle, config).inspect_err(|err| error!("Scoring aborted: {err}"))
}

fn score_batch(
    records: &[CustomerRecord],
    bundle: &ModelBundle,
    config: &PipelineConfig,
) -> Result<ScoreOutcome, PipelineError> {
    let builder = GoldBuilder::new(config.gold.top_k, config.gold.tiers())?;
    builder
        .check_features(&bundle.model.feature_names)
        .map_err(GoldError::from)?;
    bundle.model.check_encoding(&bundle.encoding)?;
    let vectors = bundle.transformer().transform_all(records)?;
    let predictions = bundle.model.predict_all(&vectors)?;
    let background = bundle.background_vectors()?;
    let explainer = Explainer::new(&bundle.model, &background)?;
    let attributions = explainer.explain_all(&vectors)?;
    info!(
        "Explained {} predictions against baseline {:.4}",
        attributions.len(),
        explainer.baseline()
    );
    let gold = builder.build(records, &predictions, &attributions)?;
    Ok(ScoreOutcome {
        predictions,
        attributions,
        gold,
    })
}

fn render_outputs(
    records: &[CustomerRecord],
    outcome: &ScoreOutcome,
    gold_path: &Path,
    analytical_path: Option<&Path>,
    config: &PipelineConfig,
) -> Result<Vec<Artifact>, PipelineError> {
    let mut artifacts = vec![export::render_gold(gold_path, &outcome.gold, config.gold.top_k)?];
    if let Some(path) = analytical_path {
        artifacts.push(export::render_analytical(path, records)?);
    }
    Ok(artifacts)
}

/// Write gold records (and optionally the analytical extract) after a successful batch.
pub fn write_outputs(
    records: &[CustomerRecord],
    outcome: &ScoreOutcome,
    gold_path: &Path,
    analytical_path: Option<&Path>,
    config: &PipelineConfig,
) -> Result<(), PipelineError> {
    let artifacts = render_outputs(records, outcome, gold_path, analytical_path, config)?;
    export::commit(&artifacts).inspect_err(|err| error!("Writing outputs aborted: {err}"))?;
    info!("Wrote {} gold records to {}", outcome.gold.len(), gold_path.display());
    Ok(())
}

/// Train on a labeled file, score the same rows, and write every artifact.
///
/// The bundle and the data files are committed together, so a failure while
/// writing any of them leaves none in place.
pub fn run(data: &Path, paths: &RunPaths, config: &PipelineConfig) -> Result<TrainOutcome, PipelineError> {
    let records = load_records(data).inspect_err(|err| error!("Loading aborted: {err}"))?;
    let trained = train(&records, config)?;
    let scored = score(&records, &trained.bundle, config)?;
    let mut artifacts = vec![Artifact::new(&paths.bundle, trained.bundle.to_json_bytes()?)];
    artifacts.extend(render_outputs(
        &records,
        &scored,
        &paths.gold,
        paths.analytical.as_deref(),
        config,
    )?);
    export::commit(&artifacts).inspect_err(|err| error!("Writing outputs aborted: {err}"))?;
    info!(
        "Saved model bundle to {} and {} gold records to {}",
        paths.bundle.display(),
        scored.gold.len(),
        paths.gold.display()
    );
    Ok(trained)
}
