use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use super::reasons::{MagnitudeTier, NO_DRIVERS_REASON, ReasonCatalog, TierThresholds, UnmappedFeatureError};
use crate::data::CustomerRecord;
use crate::explain::{Attribution, AttributionSet};
use crate::features::FEATURE_NAMES;
use crate::ml::PredictionResult;

/// Number of ranked attributions kept per customer unless configured otherwise.
pub const DEFAULT_TOP_K: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AlignmentError {
    #[error("customer `{customer_id}` is missing from the {input}")]
    Missing {
        customer_id: String,
        input: &'static str,
    },
    #[error("customer `{customer_id}` appears more than once in the {input}")]
    Duplicate {
        customer_id: String,
        input: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GoldError {
    #[error(transparent)]
    Alignment(#[from] AlignmentError),
    #[error(transparent)]
    Unmapped(#[from] UnmappedFeatureError),
    #[error("invalid gold settings: {0}")]
    InvalidSettings(String),
}

/// Probability band used by dashboards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskSegment {
    #[serde(rename = "Low Risk")]
    Low,
    #[serde(rename = "Medium Risk")]
    Medium,
    #[serde(rename = "High Risk")]
    High,
}

impl RiskSegment {
    pub fn from_probability(probability: f64) -> Self {
        if probability <= 0.3 {
            RiskSegment::Low
        } else if probability <= 0.7 {
            RiskSegment::Medium
        } else {
            RiskSegment::High
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RiskSegment::Low => "Low Risk",
            RiskSegment::Medium => "Medium Risk",
            RiskSegment::High => "High Risk",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedAttribution {
    pub feature: String,
    pub contribution: f64,
    pub tier: MagnitudeTier,
    pub reason: String,
}

/// One customer's prediction joined with its explanation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoldRecord {
    pub customer_id: String,
    pub churn_probability: f64,
    pub churn_decision: bool,
    pub risk_segment: RiskSegment,
    pub main_reason: String,
    pub top_attributions: Vec<RankedAttribution>,
}

#[derive(Debug, Clone)]
pub struct GoldBuilder {
    top_k: usize,
    tiers: TierThresholds,
    catalog: ReasonCatalog,
}

impl Default for GoldBuilder {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            tiers: TierThresholds::default(),
            catalog: ReasonCatalog,
        }
    }
}

impl GoldBuilder {
    pub fn new(top_k: usize, tiers: TierThresholds) -> Result<Self, GoldError> {
        if top_k == 0 {
            return Err(GoldError::InvalidSettings("top_k must be at least 1".to_string()));
        }
        tiers.validate().map_err(GoldError::InvalidSettings)?;
        let catalog = ReasonCatalog;
        catalog.ensure_covers(FEATURE_NAMES)?;
        Ok(Self {
            top_k,
            tiers,
            catalog,
        })
    }

    /// Fail when any feature a model can emit has no reason phrase.
    pub fn check_features(&self, names: &[String]) -> Result<(), UnmappedFeatureError> {
        self.catalog.ensure_covers(names.iter().map(String::as_str))
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Join the three inputs by customer id, in `records` order.
    pub fn build(
        &self,
        records: &[CustomerRecord],
        predictions: &[PredictionResult],
        attributions: &[AttributionSet],
    ) -> Result<Vec<GoldRecord>, GoldError> {
        let features: BTreeSet<&str> = attributions
            .iter()
            .flat_map(|set| set.contributions.iter().map(|entry| entry.feature.as_str()))
            .collect();
        self.catalog.ensure_covers(features)?;

        let ids = index_unique(records.iter().map(|r| r.customer_id.as_str()), "records")?;
        let predictions = index_unique(
            predictions.iter().map(|p| p.customer_id.as_str()),
            "predictions",
        )
        .map(|index| remap(index, predictions))?;
        let attributions = index_unique(
            attributions.iter().map(|a| a.customer_id.as_str()),
            "attributions",
        )
        .map(|index| remap(index, attributions))?;
        check_no_extras(&ids, predictions.keys().copied(), "records")?;
        check_no_extras(&ids, attributions.keys().copied(), "records")?;

        let mut out = Vec::with_capacity(records.len());
        for record in records {
            let id = record.customer_id.as_str();
            let prediction = predictions
                .get(id)
                .ok_or_else(|| missing(id, "predictions"))?;
            let set = attributions
                .get(id)
                .ok_or_else(|| missing(id, "attributions"))?;
            out.push(self.build_one(record, prediction, set)?);
        }
        info!("Built {} gold records (top {})", out.len(), self.top_k);
        Ok(out)
    }

    fn build_one(
        &self,
        record: &CustomerRecord,
        prediction: &PredictionResult,
        set: &AttributionSet,
    ) -> Result<GoldRecord, UnmappedFeatureError> {
        let mut top = Vec::with_capacity(self.top_k);
        for entry in set.top_k(self.top_k) {
            let tier = self.tiers.tier(entry.value);
            top.push(RankedAttribution {
                feature: entry.feature.clone(),
                contribution: entry.value,
                tier,
                reason: self.catalog.reason(&entry.feature, entry.value, tier, record)?,
            });
        }
        let strongest = set
            .contributions
            .iter()
            .filter(|entry| entry.value > 0.0)
            .fold(None, |best: Option<&Attribution>, entry| match best {
                Some(current) if current.value >= entry.value => Some(current),
                _ => Some(entry),
            });
        let main_reason = match strongest {
            Some(entry) => self.catalog.reason(
                &entry.feature,
                entry.value,
                self.tiers.tier(entry.value),
                record,
            )?,
            None => NO_DRIVERS_REASON.to_string(),
        };
        debug!("{}: {}", prediction.customer_id, main_reason);
        Ok(GoldRecord {
            customer_id: prediction.customer_id.clone(),
            churn_probability: prediction.probability,
            churn_decision: prediction.churn,
            risk_segment: RiskSegment::from_probability(prediction.probability),
            main_reason,
            top_attributions: top,
        })
    }
}

fn missing(customer_id: &str, input: &'static str) -> AlignmentError {
    AlignmentError::Missing {
        customer_id: customer_id.to_string(),
        input,
    }
}

fn index_unique<'a>(
    ids: impl Iterator<Item = &'a str>,
    input: &'static str,
) -> Result<HashMap<&'a str, usize>, AlignmentError> {
    let mut index = HashMap::new();
    for (pos, id) in ids.enumerate() {
        if index.insert(id, pos).is_some() {
            return Err(AlignmentError::Duplicate {
                customer_id: id.to_string(),
                input,
            });
        }
    }
    Ok(index)
}

fn remap<'a, T>(index: HashMap<&'a str, usize>, items: &'a [T]) -> HashMap<&'a str, &'a T> {
    index.into_iter().map(|(id, pos)| (id, &items[pos])).collect()
}

fn check_no_extras<'a>(
    known: &HashMap<&str, usize>,
    ids: impl Iterator<Item = &'a str>,
    input: &'static str,
) -> Result<(), AlignmentError> {
    let mut extras: Vec<&str> = ids.filter(|id| !known.contains_key(id)).collect();
    extras.sort_unstable();
    match extras.first() {
        Some(id) => Err(missing(id, input)),
        None => Ok(()),
    }
}
