//! Prediction handlers.
//!
//! Both endpoints accept sparse feature maps; resolution to the
//! model's column order (defaults, derived columns, scaling) happens
//! inside the artifact.

use crate::aqi::AqiCategory;
use crate::error::{AppError, AppResult};
use crate::model::{rule_string, ModelArtifact, NamedPathStep, Prediction};
use crate::registry::DEFAULT_MODEL_ID;
use crate::AppState;
use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Badge color and level for a class label. Labels that are not AQI
/// categories keep a neutral badge.
fn badge(label: &str) -> (&'static str, u8) {
    match AqiCategory::parse(label) {
        Some(category) => (category.color(), category.level()),
        None => ("bg-gray-500", 0),
    }
}

#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    pub model_id: Option<String>,
    pub features: Option<HashMap<String, f64>>,
}

#[derive(Debug, Serialize)]
pub struct PredictionBody {
    pub category: String,
    pub confidence: f64,
    pub color: &'static str,
    pub level: u8,
    pub all_probabilities: HashMap<String, f64>,
}

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub success: bool,
    pub prediction: PredictionBody,
    pub decision_path: Vec<NamedPathStep>,
    pub rule: String,
    pub features_used: Vec<String>,
    pub model_id: String,
    pub model_type: String,
    pub timestamp: DateTime<Utc>,
}

pub async fn predict(
    State(state): State<AppState>,
    Json(request): Json<PredictRequest>,
) -> AppResult<Json<PredictResponse>> {
    let features = request
        .features
        .ok_or_else(|| AppError::ValidationError("Missing features".into()))?;
    let model_id = request
        .model_id
        .unwrap_or_else(|| DEFAULT_MODEL_ID.to_string());

    let entry = state.registry.get(&model_id)?;
    let artifact = &entry.artifact;

    let prediction = artifact
        .predict_sample(&features)
        .map_err(|err| AppError::PredictionFailed(err.to_string()))?;
    let decision_path = artifact.decision_path(&features);
    let rule = if decision_path.is_empty() {
        String::new()
    } else {
        rule_string(&decision_path, &prediction.label)
    };

    let (color, level) = badge(&prediction.label);
    Ok(Json(PredictResponse {
        success: true,
        prediction: PredictionBody {
            all_probabilities: probability_map(artifact, &prediction),
            category: prediction.label,
            confidence: prediction.confidence,
            color,
            level,
        },
        decision_path,
        rule,
        features_used: artifact.feature_names.clone(),
        model_id,
        model_type: entry.metadata.model_type.clone(),
        timestamp: Utc::now(),
    }))
}

fn probability_map(artifact: &ModelArtifact, prediction: &Prediction) -> HashMap<String, f64> {
    prediction
        .probabilities
        .iter()
        .enumerate()
        .map(|(i, &p)| {
            let label = artifact
                .classes
                .get(i)
                .cloned()
                .unwrap_or_else(|| i.to_string());
            (label, p)
        })
        .collect()
}

// ============================================================================
// Batch
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    pub model_id: Option<String>,
    pub samples: Option<Vec<HashMap<String, f64>>>,
}

#[derive(Debug, Serialize)]
pub struct BatchItem {
    pub index: usize,
    pub category: String,
    pub confidence: f64,
    pub color: &'static str,
    pub level: u8,
}

#[derive(Debug, Serialize)]
pub struct BatchResponse {
    pub success: bool,
    pub predictions: Vec<BatchItem>,
    pub count: usize,
    pub model_id: String,
    pub timestamp: DateTime<Utc>,
}

pub async fn predict_batch(
    State(state): State<AppState>,
    Json(request): Json<BatchRequest>,
) -> AppResult<Json<BatchResponse>> {
    let samples = request
        .samples
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::ValidationError("Missing samples".into()))?;
    let model_id = request
        .model_id
        .unwrap_or_else(|| DEFAULT_MODEL_ID.to_string());

    let entry = state.registry.get(&model_id)?;

    let mut predictions = Vec::with_capacity(samples.len());
    for (index, sample) in samples.iter().enumerate() {
        let prediction = entry
            .artifact
            .predict_sample(sample)
            .map_err(|err| AppError::PredictionFailed(err.to_string()))?;
        let (color, level) = badge(&prediction.label);
        predictions.push(BatchItem {
            index,
            category: prediction.label,
            confidence: prediction.confidence,
            color,
            level,
        });
    }

    Ok(Json(BatchResponse {
        count: predictions.len(),
        success: true,
        predictions,
        model_id,
        timestamp: Utc::now(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_support::{sample, state_with_models};

    #[tokio::test]
    async fn predict_defaults_to_default_model() {
        let (state, _dir) = state_with_models();
        let response = predict(
            State(state),
            Json(PredictRequest {
                model_id: None,
                features: Some(sample(&[("PM2.5", 250.0), ("PM10", 300.0)])),
            }),
        )
        .await
        .unwrap();

        assert!(response.0.success);
        assert_eq!(response.0.model_id, "default");
        assert_eq!(response.0.prediction.category, "Unhealthy");
        assert_eq!(response.0.prediction.level, 4);
        assert_eq!(response.0.prediction.color, "bg-red-500");
        assert!(response.0.prediction.confidence > 0.5);
        // Plain tree, no scaler: path and rule are populated.
        assert!(!response.0.decision_path.is_empty());
        assert!(response.0.rule.starts_with("IF "));
    }

    #[tokio::test]
    async fn predict_without_features_is_400() {
        let (state, _dir) = state_with_models();
        let result = predict(
            State(state),
            Json(PredictRequest {
                model_id: None,
                features: None,
            }),
        )
        .await;
        assert!(matches!(result, Err(AppError::ValidationError(_))));
    }

    #[tokio::test]
    async fn predict_unknown_model_is_404_with_ids() {
        let (state, _dir) = state_with_models();
        let result = predict(
            State(state),
            Json(PredictRequest {
                model_id: Some("nope".into()),
                features: Some(sample(&[("PM2.5", 10.0)])),
            }),
        )
        .await;
        match result {
            Err(AppError::ModelNotFound { available, .. }) => {
                assert!(available.contains(&"default".to_string()));
            }
            other => panic!("expected ModelNotFound, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn probabilities_are_labelled_and_sum_to_one() {
        let (state, _dir) = state_with_models();
        let response = predict(
            State(state),
            Json(PredictRequest {
                model_id: None,
                features: Some(sample(&[("PM2.5", 5.0), ("PM10", 10.0)])),
            }),
        )
        .await
        .unwrap();

        let probs = &response.0.prediction.all_probabilities;
        assert!(probs.contains_key("Good"));
        let total: f64 = probs.values().sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn batch_indexes_every_sample() {
        let (state, _dir) = state_with_models();
        let response = predict_batch(
            State(state),
            Json(BatchRequest {
                model_id: None,
                samples: Some(vec![
                    sample(&[("PM2.5", 5.0), ("PM10", 10.0)]),
                    sample(&[("PM2.5", 250.0), ("PM10", 300.0)]),
                ]),
            }),
        )
        .await
        .unwrap();

        assert_eq!(response.0.count, 2);
        assert_eq!(response.0.predictions[0].index, 0);
        assert_eq!(response.0.predictions[0].category, "Good");
        assert_eq!(response.0.predictions[1].index, 1);
        assert_eq!(response.0.predictions[1].category, "Unhealthy");
    }

    #[tokio::test]
    async fn batch_without_samples_is_400() {
        let (state, _dir) = state_with_models();
        let result = predict_batch(
            State(state),
            Json(BatchRequest {
                model_id: None,
                samples: Some(Vec::new()),
            }),
        )
        .await;
        assert!(matches!(result, Err(AppError::ValidationError(_))));
    }
}
