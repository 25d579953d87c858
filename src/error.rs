//! Error handling for the API surface and the offline pipeline.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

/// Errors returned to HTTP clients.
#[derive(Error, Debug)]
pub enum AppError {
    /// Requested model id is not in the registry. Carries the loadable ids
    /// so clients can recover without a second round trip.
    #[error("Model \"{id}\" not found")]
    ModelNotFound {
        id: String,
        available: Vec<String>,
    },
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    ValidationError(String),
    #[error("prediction failed: {0}")]
    PredictionFailed(String),
    #[error("upstream feed error: {0}")]
    UpstreamError(String),
    #[error("internal error: {0}")]
    InternalError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::ModelNotFound { id, available } => (
                StatusCode::NOT_FOUND,
                json!({
                    "error": format!("Model \"{}\" not found", id),
                    "available_models": available,
                    "status": StatusCode::NOT_FOUND.as_u16(),
                }),
            ),
            AppError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                json!({ "error": msg, "status": StatusCode::NOT_FOUND.as_u16() }),
            ),
            AppError::ValidationError(msg) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": msg, "status": StatusCode::BAD_REQUEST.as_u16() }),
            ),
            AppError::PredictionFailed(msg) => {
                tracing::error!("Prediction failed: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({
                        "error": msg,
                        "status": StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
                    }),
                )
            }
            AppError::UpstreamError(msg) => {
                tracing::error!("Upstream feed error: {}", msg);
                (
                    StatusCode::BAD_GATEWAY,
                    json!({
                        "error": "Upstream feed error",
                        "status": StatusCode::BAD_GATEWAY.as_u16(),
                    }),
                )
            }
            AppError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({
                        "error": "Internal server error",
                        "status": StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
                    }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        AppError::InternalError(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::UpstreamError(err.to_string())
    }
}

/// Errors raised by the offline side: dataset ingest, training, artifacts.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("dataset schema error: {0}")]
    Schema(String),

    #[error("training error: {0}")]
    Training(String),

    #[error("model artifact error: {0}")]
    Artifact(String),
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
