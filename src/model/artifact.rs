//! Model artifacts: the JSON file format exchanged between the
//! trainer and the serving registry.
//!
//! An artifact is self-contained: the classifier, the exact feature
//! order it was fitted with, the class labels, the optional scaler
//! and the evaluation metrics from training.

use super::{argmax, Classifier, Metrics, StandardScaler};
use crate::error::{PipelineError, PipelineResult};
use crate::features;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use uuid::Uuid;

/// Bumped on breaking changes to the artifact layout.
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub schema_version: u32,
    pub model_uid: Uuid,
    pub model: Classifier,
    /// Column order the model was fitted with. Inputs are resolved
    /// into exactly this order at serve time.
    pub feature_names: Vec<String>,
    pub classes: Vec<String>,
    pub scaler: Option<StandardScaler>,
    pub feature_version: u8,
    pub layout_hash: u32,
    /// 0 means a nowcast model.
    pub horizon_hours: u32,
    pub trained_at: DateTime<Utc>,
    pub metrics: Option<Metrics>,
}

/// An artifact plus the file facts recorded when it was read.
#[derive(Debug, Clone)]
pub struct LoadedArtifact {
    pub artifact: ModelArtifact,
    pub sha256: String,
    pub size_bytes: u64,
}

/// One predicted sample.
#[derive(Debug, Clone)]
pub struct Prediction {
    pub class_index: usize,
    pub label: String,
    pub confidence: f64,
    pub probabilities: Vec<f64>,
}

/// A decision-path step with its feature resolved to a name.
#[derive(Debug, Clone, Serialize)]
pub struct NamedPathStep {
    pub id: usize,
    pub feature: String,
    pub threshold: f64,
    pub direction: &'static str,
    pub samples: usize,
}

impl ModelArtifact {
    pub fn save(&self, path: &Path) -> PipelineResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let bytes = serde_json::to_vec_pretty(self)?;
        fs::write(path, bytes)?;
        Ok(())
    }

    pub fn load(path: &Path) -> PipelineResult<LoadedArtifact> {
        let bytes = fs::read(path)?;
        let artifact: ModelArtifact = serde_json::from_slice(&bytes)?;

        if artifact.schema_version > SCHEMA_VERSION {
            return Err(PipelineError::Artifact(format!(
                "artifact schema {} is newer than supported {}",
                artifact.schema_version, SCHEMA_VERSION
            )));
        }
        if artifact.classes.len() != artifact.model.n_classes() {
            return Err(PipelineError::Artifact(format!(
                "artifact lists {} classes but the model predicts {}",
                artifact.classes.len(),
                artifact.model.n_classes()
            )));
        }
        if artifact.feature_names.len() != artifact.model.n_features() {
            return Err(PipelineError::Artifact(format!(
                "artifact lists {} feature names but the model expects {}",
                artifact.feature_names.len(),
                artifact.model.n_features()
            )));
        }
        if artifact.layout_hash != features::layout_hash() {
            tracing::warn!(
                path = %path.display(),
                "artifact was trained against a different feature layout"
            );
        }

        Ok(LoadedArtifact {
            artifact,
            sha256: hex::encode(Sha256::digest(&bytes)),
            size_bytes: bytes.len() as u64,
        })
    }

    /// Resolve, scale and classify one sparse sample.
    pub fn predict_sample(&self, sample: &HashMap<String, f64>) -> PipelineResult<Prediction> {
        let row = self.input_row(sample);
        let probabilities = self.model.predict_proba(&row);
        if probabilities.is_empty() {
            return Err(PipelineError::Artifact(
                "model produced no class probabilities".into(),
            ));
        }
        let class_index = argmax(&probabilities);
        let label = self
            .classes
            .get(class_index)
            .cloned()
            .unwrap_or_else(|| class_index.to_string());
        Ok(Prediction {
            class_index,
            confidence: probabilities[class_index],
            label,
            probabilities,
        })
    }

    /// Splits crossed by a sample, with features named. Only plain
    /// trees expose their structure; under a scaler the thresholds
    /// are in model space and the raw-unit rule text would mislead.
    pub fn decision_path(&self, sample: &HashMap<String, f64>) -> Vec<NamedPathStep> {
        let tree = match (&self.scaler, self.model.as_tree()) {
            (None, Some(tree)) => tree,
            _ => return Vec::new(),
        };
        let row = features::resolve(&self.feature_names, sample);
        tree.decision_path(&row)
            .into_iter()
            .map(|step| NamedPathStep {
                id: step.id,
                feature: self.feature_name(step.feature),
                threshold: step.threshold,
                direction: step.direction,
                samples: step.samples,
            })
            .collect()
    }

    fn input_row(&self, sample: &HashMap<String, f64>) -> Vec<f64> {
        let mut row = features::resolve(&self.feature_names, sample);
        if let Some(scaler) = &self.scaler {
            scaler.transform_row(&mut row);
        }
        row
    }

    fn feature_name(&self, index: usize) -> String {
        self.feature_names
            .get(index)
            .cloned()
            .unwrap_or_else(|| format!("feature_{}", index))
    }
}

/// Human-readable rule for a decision path.
pub fn rule_string(path: &[NamedPathStep], label: &str) -> String {
    if path.is_empty() {
        return format!("prediction = {}", label);
    }
    let conditions: Vec<String> = path
        .iter()
        .map(|step| {
            let op = if step.direction == "left" { "≤" } else { ">" };
            format!("{} {} {:.2}", step.feature, op, step.threshold)
        })
        .collect();
    format!("IF {} THEN prediction = {}", conditions.join(" AND "), label)
}
