//! Holdout evaluation metrics for the churn classifier.

use serde::Serialize;

use super::model::PredictionResult;

/// Binary confusion matrix; index 0 is "retained", index 1 is "churned".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConfusionMatrix {
    /// `counts[truth][predicted]`.
    pub counts: [[u32; 2]; 2],
}

impl ConfusionMatrix {
    pub fn add(&mut self, truth: bool, predicted: bool) {
        let cell = &mut self.counts[truth as usize][predicted as usize];
        *cell = cell.saturating_add(1);
    }

    pub fn get(&self, truth: bool, predicted: bool) -> u32 {
        self.counts[truth as usize][predicted as usize]
    }

    pub fn total(&self) -> u32 {
        self.counts.iter().flatten().sum()
    }
}

/// Precision/recall statistics for one class.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassStats {
    /// `TP / (TP + FP)`.
    pub precision: f64,
    /// `TP / (TP + FN)`.
    pub recall: f64,
    pub f1: f64,
    /// Number of true examples of the class.
    pub support: u32,
}

/// Summary of a holdout evaluation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationReport {
    pub accuracy: f64,
    pub confusion: ConfusionMatrix,
    pub retained: ClassStats,
    pub churned: ClassStats,
}

/// Compare predictions against ground-truth labels (aligned by position).
pub fn evaluate(predictions: &[PredictionResult], labels: &[bool]) -> EvaluationReport {
    let mut confusion = ConfusionMatrix::default();
    for (prediction, &truth) in predictions.iter().zip(labels) {
        confusion.add(truth, prediction.churn);
    }
    EvaluationReport {
        accuracy: accuracy(&confusion),
        retained: class_stats(&confusion, false),
        churned: class_stats(&confusion, true),
        confusion,
    }
}

/// Overall accuracy from a confusion matrix.
pub fn accuracy(cm: &ConfusionMatrix) -> f64 {
    let total = cm.total();
    if total == 0 {
        return 0.0;
    }
    let correct = cm.get(false, false) + cm.get(true, true);
    correct as f64 / total as f64
}

fn class_stats(cm: &ConfusionMatrix, class: bool) -> ClassStats {
    let tp = cm.get(class, class) as f64;
    let fn_ = cm.get(class, !class) as f64;
    let fp = cm.get(!class, class) as f64;
    let precision = if tp + fp == 0.0 { 0.0 } else { tp / (tp + fp) };
    let recall = if tp + fn_ == 0.0 { 0.0 } else { tp / (tp + fn_) };
    let f1 = if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    };
    ClassStats {
        precision,
        recall,
        f1,
        support: cm.get(class, class) + cm.get(class, !class),
    }
}
