use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::models::Snapshot;
use crate::services::analysis_service::AnalysisError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),
    /// No market data for the ticker; the error record is the response body.
    #[error("Not found: {}", .0.message().unwrap_or("no data"))]
    NotFound(Snapshot),
    #[error("External error: {0}")]
    External(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, Json(json!({ "error": msg }))).into_response(),
            AppError::NotFound(record) => (StatusCode::NOT_FOUND, Json(record)).into_response(),
            AppError::External(msg) => (StatusCode::BAD_GATEWAY, Json(json!({ "error": msg }))).into_response(),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Internal server error" })),
            )
                .into_response(),
        }
    }
}

impl From<AnalysisError> for AppError {
    fn from(value: AnalysisError) -> Self {
        match value {
            AnalysisError::MarketData(record) => AppError::NotFound(record),
            AnalysisError::Encoding(e) => AppError::Internal(e.to_string()),
        }
    }
}
