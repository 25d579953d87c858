//! Process-global model registry.
//!
//! Populated once at startup from the configured default path and the
//! artifact folder, rebuilt on demand by the reload endpoint. A model
//! that fails to load is logged and skipped; the rest keep serving.

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::model::{LoadedArtifact, ModelArtifact};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

/// Id every endpoint falls back to when the request names no model.
pub const DEFAULT_MODEL_ID: &str = "default";

/// File facts and artifact headline data, kept for the listing and
/// info endpoints so they never have to touch the artifact itself.
#[derive(Debug, Clone, Serialize)]
pub struct ModelMetadata {
    pub id: String,
    pub filename: String,
    pub path: String,
    pub loaded_at: DateTime<Utc>,
    pub model_type: String,
    pub model_uid: Uuid,
    pub n_features: usize,
    pub n_classes: usize,
    pub has_scaler: bool,
    pub horizon_hours: u32,
    pub trained_at: DateTime<Utc>,
    pub sha256: String,
    pub size_bytes: u64,
}

/// One registered model: the artifact plus its metadata.
#[derive(Debug)]
pub struct ModelEntry {
    pub artifact: ModelArtifact,
    pub metadata: ModelMetadata,
}

/// Thread-safe id -> model map. Read-locked per request, write-locked
/// only by reload and remove.
pub struct ModelRegistry {
    models: RwLock<HashMap<String, Arc<ModelEntry>>>,
    models_dir: PathBuf,
    default_model_path: Option<PathBuf>,
}

impl ModelRegistry {
    pub fn new(config: &Config) -> ModelRegistry {
        ModelRegistry {
            models: RwLock::new(HashMap::new()),
            models_dir: PathBuf::from(&config.models_dir),
            default_model_path: config.default_model_path.as_ref().map(PathBuf::from),
        }
    }

    /// Load the default artifact and everything in the models folder.
    /// Returns how many models ended up registered.
    pub fn load_all(&self) -> usize {
        if let Some(path) = self.default_model_path.clone() {
            if path.exists() {
                self.register(DEFAULT_MODEL_ID, &path);
            } else {
                tracing::warn!(
                    path = %path.display(),
                    "configured default model does not exist"
                );
            }
        }

        match std::fs::read_dir(&self.models_dir) {
            Ok(entries) => {
                let mut paths: Vec<PathBuf> = entries
                    .filter_map(|e| e.ok())
                    .map(|e| e.path())
                    .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
                    .collect();
                // Stable registration order makes reload logs diffable.
                paths.sort();
                for path in paths {
                    let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                        continue;
                    };
                    let id = stem.to_string();
                    if self.models.read().contains_key(&id) {
                        continue;
                    }
                    self.register(&id, &path);
                }
            }
            Err(err) => {
                tracing::warn!(
                    dir = %self.models_dir.display(),
                    "models folder not readable: {}",
                    err
                );
            }
        }

        let count = self.len();
        tracing::info!(models = count, "registry loaded");
        count
    }

    fn register(&self, id: &str, path: &Path) {
        match ModelArtifact::load(path) {
            Ok(loaded) => {
                let entry = ModelEntry {
                    metadata: metadata_for(id, path, &loaded),
                    artifact: loaded.artifact,
                };
                tracing::info!(
                    id = %id,
                    model_type = %entry.metadata.model_type,
                    features = entry.metadata.n_features,
                    "model registered"
                );
                self.models.write().insert(id.to_string(), Arc::new(entry));
            }
            Err(err) => {
                tracing::error!(id = %id, path = %path.display(), "model load failed: {}", err);
            }
        }
    }

    /// Drop every model and load from disk again.
    pub fn reload(&self) -> usize {
        self.models.write().clear();
        self.load_all()
    }

    pub fn get(&self, id: &str) -> AppResult<Arc<ModelEntry>> {
        // The guard must drop before ids() re-locks; parking_lot
        // locks are not reentrant.
        let entry = self.models.read().get(id).cloned();
        entry.ok_or_else(|| AppError::ModelNotFound {
            id: id.to_string(),
            available: self.ids(),
        })
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.models.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Metadata view for the listing endpoint, sorted by id.
    pub fn list(&self) -> Vec<ModelMetadata> {
        let mut list: Vec<ModelMetadata> = self
            .models
            .read()
            .values()
            .map(|entry| entry.metadata.clone())
            .collect();
        list.sort_by(|a, b| a.id.cmp(&b.id));
        list
    }

    /// Unload a model. The artifact file stays on disk; a reload
    /// brings the model back.
    pub fn remove(&self, id: &str) -> AppResult<ModelMetadata> {
        // Same shape as get: release the write guard before ids()
        // takes its read lock.
        let removed = self.models.write().remove(id);
        removed
            .map(|entry| entry.metadata.clone())
            .ok_or_else(|| AppError::ModelNotFound {
                id: id.to_string(),
                available: self.ids(),
            })
    }

    pub fn len(&self) -> usize {
        self.models.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.read().is_empty()
    }
}

fn metadata_for(id: &str, path: &Path, loaded: &LoadedArtifact) -> ModelMetadata {
    ModelMetadata {
        id: id.to_string(),
        filename: path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        path: path.display().to_string(),
        loaded_at: Utc::now(),
        model_type: loaded.artifact.model.kind().as_str().to_string(),
        model_uid: loaded.artifact.model_uid,
        n_features: loaded.artifact.feature_names.len(),
        n_classes: loaded.artifact.classes.len(),
        has_scaler: loaded.artifact.scaler.is_some(),
        horizon_hours: loaded.artifact.horizon_hours,
        trained_at: loaded.artifact.trained_at,
        sha256: loaded.sha256.clone(),
        size_bytes: loaded.size_bytes,
    }
}
