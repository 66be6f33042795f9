use axum::Router;
use tower_http::cors::CorsLayer;

use crate::routes::{analyze, health, market};
use crate::state::AppState;

pub fn create_app(state: AppState) -> Router {
    Router::<AppState>::new()
        .nest("/health", health::router())
        .nest("/api/analyze", analyze::router())
        .nest("/api/market", market::router())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
