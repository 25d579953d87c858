//! Shared fixtures for handler tests: a registry backed by a temp
//! folder holding one tiny tree model and one forest model.

use crate::config::Config;
use crate::model::{
    Classifier, DecisionTree, ForestParams, RandomForest, TreeParams, SCHEMA_VERSION,
};
use crate::registry::ModelRegistry;
use crate::stations::FeedClient;
use crate::{features, model::ModelArtifact, AppState};
use chrono::Utc;
use ndarray::Array2;
use std::collections::HashMap;
use std::sync::Arc;
use tempfile::TempDir;
use uuid::Uuid;

fn training_table() -> (Array2<f64>, Vec<usize>) {
    // PM2.5, PM10: four clean rows, four unhealthy rows.
    let x = ndarray::array![
        [5.0, 10.0],
        [8.0, 15.0],
        [10.0, 20.0],
        [12.0, 22.0],
        [200.0, 250.0],
        [220.0, 280.0],
        [250.0, 300.0],
        [260.0, 320.0],
    ];
    let y = vec![0, 0, 0, 0, 1, 1, 1, 1];
    (x, y)
}

fn artifact_for(model: Classifier) -> ModelArtifact {
    ModelArtifact {
        schema_version: SCHEMA_VERSION,
        model_uid: Uuid::new_v4(),
        model,
        feature_names: vec!["PM2.5".into(), "PM10".into()],
        classes: vec!["Good".into(), "Unhealthy".into()],
        scaler: None,
        feature_version: features::FEATURE_VERSION,
        layout_hash: features::layout_hash(),
        horizon_hours: 0,
        trained_at: Utc::now(),
        metrics: None,
    }
}

/// State with two models registered: "default" (decision tree) and
/// "forest". The TempDir must outlive the state.
pub(crate) fn state_with_models() -> (AppState, TempDir) {
    let dir = TempDir::new().unwrap();
    let (x, y) = training_table();

    let tree = DecisionTree::fit(&x, &y, 2, TreeParams::default()).unwrap();
    artifact_for(Classifier::DecisionTree(tree))
        .save(&dir.path().join("default.json"))
        .unwrap();

    let forest = RandomForest::fit(
        &x,
        &y,
        2,
        ForestParams {
            n_trees: 5,
            ..ForestParams::default()
        },
    )
    .unwrap();
    artifact_for(Classifier::RandomForest(forest))
        .save(&dir.path().join("forest.json"))
        .unwrap();

    let config = Config {
        port: 0,
        models_dir: dir.path().display().to_string(),
        default_model_path: Some(dir.path().join("default.json").display().to_string()),
        waqi_base_url: "http://127.0.0.1:0".into(),
        waqi_token: String::new(),
        environment: "test".into(),
    };

    let registry = Arc::new(ModelRegistry::new(&config));
    registry.load_all();

    let state = AppState {
        registry,
        feed: Arc::new(FeedClient::new(&config)),
        config,
    };
    (state, dir)
}

pub(crate) fn sample(pairs: &[(&str, f64)]) -> HashMap<String, f64> {
    pairs
        .iter()
        .map(|&(name, value)| (name.to_string(), value))
        .collect()
}
