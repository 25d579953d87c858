//! Health check handler

use crate::AppState;
use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    timestamp: DateTime<Utc>,
    loaded_models: usize,
    models: Vec<String>,
}

pub async fn check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: Utc::now(),
        loaded_models: state.registry.len(),
        models: state.registry.ids(),
    })
}
