//! Model management handlers: listing, info, download, unload, reload.

use crate::error::{AppError, AppResult};
use crate::model::Classifier;
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// GET /api/models
pub async fn list(State(state): State<AppState>) -> Json<serde_json::Value> {
    let models = state.registry.list();
    Json(json!({
        "count": models.len(),
        "models": models,
    }))
}

/// GET /api/models/:id
pub async fn info(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let entry = state.registry.get(&id)?;
    let artifact = &entry.artifact;

    let mut body = json!({
        "model_id": id,
        "model_type": entry.metadata.model_type,
        "metadata": entry.metadata,
        "feature_names": artifact.feature_names,
        "classes": artifact.classes,
        "feature_importance": importance_map(artifact),
    });

    match &artifact.model {
        Classifier::DecisionTree(tree) => {
            body["tree_info"] = json!({
                "n_features": tree.n_features,
                "n_classes": tree.n_classes,
                "max_depth": tree.depth(),
                "n_leaves": tree.n_leaves(),
            });
        }
        Classifier::RandomForest(forest) => {
            body["forest_info"] = json!({
                "n_trees": forest.n_trees(),
                "n_features": forest.n_features,
                "n_classes": forest.n_classes,
            });
        }
    }

    Ok(Json(body))
}

fn importance_map(artifact: &crate::model::ModelArtifact) -> serde_json::Value {
    let importances = artifact.model.feature_importances();
    let map: serde_json::Map<String, serde_json::Value> = artifact
        .feature_names
        .iter()
        .zip(&importances)
        .map(|(name, &imp)| (name.clone(), json!(imp)))
        .collect();
    serde_json::Value::Object(map)
}

/// GET /api/models/:id/download — the artifact JSON as an attachment.
pub async fn download(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let entry = state.registry.get(&id)?;
    let bytes = serde_json::to_vec_pretty(&entry.artifact)
        .map_err(|err| AppError::InternalError(err.to_string()))?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}.json\"", id),
            ),
        ],
        bytes,
    )
        .into_response())
}

/// DELETE /api/models/:id — unload from the registry only; the file
/// stays on disk and comes back on the next reload.
pub async fn remove(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let metadata = state.registry.remove(&id)?;
    tracing::info!(id = %id, "model unloaded");
    Ok(Json(json!({
        "deleted": true,
        "id": id,
        "filename": metadata.filename,
    })))
}

/// POST /api/reload-models
pub async fn reload(State(state): State<AppState>) -> Json<serde_json::Value> {
    let count = state.registry.reload();
    Json(json!({
        "success": true,
        "message": format!("Reloaded {} models", count),
        "models": state.registry.ids(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_support::state_with_models;

    #[tokio::test]
    async fn list_counts_registered_models() {
        let (state, _dir) = state_with_models();
        let body = list(State(state)).await.0;
        assert_eq!(body["count"], 2);
        assert_eq!(body["models"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn info_exposes_tree_shape_and_importances() {
        let (state, _dir) = state_with_models();
        let body = info(State(state), Path("default".into())).await.unwrap().0;

        assert_eq!(body["model_type"], "decision_tree");
        assert!(body["tree_info"]["max_depth"].as_u64().unwrap() >= 1);
        assert!(body["tree_info"]["n_leaves"].as_u64().unwrap() >= 2);
        let importance = body["feature_importance"].as_object().unwrap();
        assert!(importance.contains_key("PM2.5"));
    }

    #[tokio::test]
    async fn info_unknown_model_is_404() {
        let (state, _dir) = state_with_models();
        let result = info(State(state), Path("nope".into())).await;
        assert!(matches!(result, Err(AppError::ModelNotFound { .. })));
    }

    #[tokio::test]
    async fn download_sets_attachment_disposition() {
        let (state, _dir) = state_with_models();
        let response = download(State(state), Path("default".into()))
            .await
            .unwrap();
        let disposition = response
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .unwrap()
            .to_str()
            .unwrap();
        assert!(disposition.contains("default.json"));
    }

    #[tokio::test]
    async fn remove_then_reload_restores_model() {
        let (state, _dir) = state_with_models();
        remove(State(state.clone()), Path("default".into()))
            .await
            .unwrap();
        assert_eq!(state.registry.len(), 1);

        let body = reload(State(state.clone())).await.0;
        assert_eq!(body["success"], true);
        assert_eq!(state.registry.len(), 2);
    }
}
