use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use tracing::{info, warn};

use crate::errors::AppError;
use crate::models::{normalize_ticker, Payload};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(analyze))
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub ticker: String,
    #[serde(rename = "apiKey", default)]
    pub api_key: Option<String>,
}

pub async fn analyze(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<Payload>, AppError> {
    let ticker = normalize_ticker(&request.ticker);
    info!("POST /api/analyze - Analyzing {}", ticker);

    if ticker.is_empty() {
        return Err(AppError::Validation("Ticker is required".to_string()));
    }

    let payload = state
        .analysis
        .analyze(&ticker, request.api_key.as_deref())
        .await
        .map_err(|e| {
            warn!("Analysis for {} failed: {}", ticker, e);
            e
        })?;

    Ok(Json(payload))
}
