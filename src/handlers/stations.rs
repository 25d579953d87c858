//! Live station feed handlers.

use crate::error::AppResult;
use crate::stations::StationReading;
use crate::AppState;
use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;

#[derive(Serialize)]
pub struct StationsResponse {
    pub stations: Vec<StationReading>,
    pub count: usize,
}

/// GET /api/stations — every built-in station that answered.
pub async fn list(State(state): State<AppState>) -> Json<StationsResponse> {
    let stations = state.feed.all_stations().await;
    Json(StationsResponse {
        count: stations.len(),
        stations,
    })
}

/// GET /api/stations/:id — one station; upstream failure is a 502.
pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<StationReading>> {
    let reading = state.feed.one_station(&id).await?;
    Ok(Json(reading))
}
