use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use tracing::{info, warn};

use crate::errors::AppError;
use crate::models::{normalize_ticker, MarketHighlights, Snapshot};
use crate::services::highlights_service;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/snapshot/:ticker", get(get_snapshot))
        .route("/highlights", get(get_highlights))
}

pub async fn get_snapshot(
    Path(ticker): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Snapshot>, AppError> {
    info!("GET /api/market/snapshot/{} - Acquiring snapshot", ticker);

    if normalize_ticker(&ticker).is_empty() {
        return Err(AppError::Validation("Ticker is required".to_string()));
    }

    let snapshot = state.snapshots.acquire(&ticker).await;
    if snapshot.is_error() {
        return Err(AppError::NotFound(snapshot));
    }
    Ok(Json(snapshot))
}

pub async fn get_highlights(State(state): State<AppState>) -> Result<Json<MarketHighlights>, AppError> {
    info!("GET /api/market/highlights - Index overview");

    let highlights = highlights_service::highlights(&state.snapshots).await;
    if highlights.index.history.is_empty() {
        warn!("No source returned index history");
        return Err(AppError::External("Index data is unavailable right now".to_string()));
    }
    Ok(Json(highlights))
}
