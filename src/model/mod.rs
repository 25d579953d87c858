//! Classifiers and the estimator plumbing shared by trainer and server.

pub mod artifact;
pub mod forest;
pub mod metrics;
pub mod tree;


pub use artifact::{
    rule_string, LoadedArtifact, ModelArtifact, NamedPathStep, Prediction, SCHEMA_VERSION,
};
pub use forest::{ForestParams, RandomForest};
pub use metrics::{evaluate, ClassMetrics, Metrics};
pub use tree::{DecisionTree, PathStep, TreeParams};

use crate::error::{PipelineError, PipelineResult};
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of the largest value, first one on ties.
pub(crate) fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    let mut best_value = f64::NEG_INFINITY;
    for (i, &value) in values.iter().enumerate() {
        if value > best_value {
            best = i;
            best_value = value;
        }
    }
    best
}

// ============================================================================
// Label encoding
// ============================================================================

/// Maps class labels to dense indices. Classes are sorted, so the
/// encoding is stable across runs on the same data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelEncoder {
    pub classes: Vec<String>,
}

impl LabelEncoder {
    pub fn fit(labels: &[String]) -> LabelEncoder {
        let mut classes: Vec<String> = labels.to_vec();
        classes.sort();
        classes.dedup();
        LabelEncoder { classes }
    }

    pub fn transform(&self, labels: &[String]) -> PipelineResult<Vec<usize>> {
        labels
            .iter()
            .map(|label| {
                self.classes
                    .iter()
                    .position(|class| class == label)
                    .ok_or_else(|| {
                        PipelineError::Training(format!("unknown class label: {}", label))
                    })
            })
            .collect()
    }

    pub fn inverse(&self, index: usize) -> Option<&str> {
        self.classes.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

// ============================================================================
// Feature scaling
// ============================================================================

/// Per-column standardization fitted on the training split only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub std: Vec<f64>,
}

impl StandardScaler {
    pub fn fit(x: &Array2<f64>) -> StandardScaler {
        let n = x.nrows().max(1) as f64;
        let mut mean = Vec::with_capacity(x.ncols());
        let mut std = Vec::with_capacity(x.ncols());
        for column in x.axis_iter(Axis(1)) {
            let m = column.sum() / n;
            let variance = column.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / n;
            mean.push(m);
            // Constant columns would divide by zero otherwise.
            std.push(variance.sqrt().max(1e-8));
        }
        StandardScaler { mean, std }
    }

    pub fn transform_row(&self, row: &mut [f64]) {
        for (j, value) in row.iter_mut().enumerate() {
            if j < self.mean.len() {
                *value = (*value - self.mean[j]) / self.std[j];
            }
        }
    }

    pub fn transform(&self, x: &mut Array2<f64>) {
        for mut row in x.axis_iter_mut(Axis(0)) {
            for (j, value) in row.iter_mut().enumerate() {
                *value = (*value - self.mean[j]) / self.std[j];
            }
        }
    }
}

// ============================================================================
// Classifier
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    DecisionTree,
    RandomForest,
}

impl ModelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::DecisionTree => "decision_tree",
            ModelKind::RandomForest => "random_forest",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A trained classifier of either family, as stored in artifacts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Classifier {
    DecisionTree(DecisionTree),
    RandomForest(RandomForest),
}

impl Classifier {
    pub fn kind(&self) -> ModelKind {
        match self {
            Classifier::DecisionTree(_) => ModelKind::DecisionTree,
            Classifier::RandomForest(_) => ModelKind::RandomForest,
        }
    }

    pub fn predict_proba(&self, row: &[f64]) -> Vec<f64> {
        match self {
            Classifier::DecisionTree(tree) => tree.predict_proba(row),
            Classifier::RandomForest(forest) => forest.predict_proba(row),
        }
    }

    pub fn predict(&self, row: &[f64]) -> usize {
        argmax(&self.predict_proba(row))
    }

    pub fn feature_importances(&self) -> Vec<f64> {
        match self {
            Classifier::DecisionTree(tree) => tree.feature_importances.clone(),
            Classifier::RandomForest(forest) => forest.feature_importances(),
        }
    }

    pub fn n_features(&self) -> usize {
        match self {
            Classifier::DecisionTree(tree) => tree.n_features,
            Classifier::RandomForest(forest) => forest.n_features,
        }
    }

    pub fn n_classes(&self) -> usize {
        match self {
            Classifier::DecisionTree(tree) => tree.n_classes,
            Classifier::RandomForest(forest) => forest.n_classes,
        }
    }

    pub fn as_tree(&self) -> Option<&DecisionTree> {
        match self {
            Classifier::DecisionTree(tree) => Some(tree),
            Classifier::RandomForest(_) => None,
        }
    }
}
