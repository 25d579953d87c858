//! AirSense: air-quality classification backend.
//!
//! Two halves share this crate:
//! - `airsense-train` derives EPA AQI category labels from pollutant
//!   readings, fits a tree or forest classifier and writes a JSON
//!   model artifact.
//! - `airsense-server` loads the artifacts into a registry and serves
//!   predictions, model management and a live station feed proxy over
//!   a small JSON REST surface.

pub mod aqi;
pub mod config;
pub mod dataset;
pub mod error;
pub mod features;
pub mod handlers;
pub mod model;
pub mod registry;
pub mod stations;
pub mod training;

pub use error::{AppError, AppResult};

use axum::{
    routing::{get, post},
    Router,
};
use registry::ModelRegistry;
use stations::FeedClient;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ModelRegistry>,
    pub feed: Arc<FeedClient>,
    pub config: config::Config,
}

/// Create the main router with all routes
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(handlers::health::check))
        .route("/api/models", get(handlers::models::list))
        .route(
            "/api/models/:id",
            get(handlers::models::info).delete(handlers::models::remove),
        )
        .route("/api/models/:id/download", get(handlers::models::download))
        .route("/api/reload-models", post(handlers::models::reload))
        .route("/api/predict", post(handlers::predict::predict))
        .route("/api/predict-batch", post(handlers::predict::predict_batch))
        .route("/api/stations", get(handlers::stations::list))
        .route("/api/stations/:id", get(handlers::stations::get))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
        .with_state(state)
}
