use serde::Serialize;

use crate::models::Series;

/// Latest level of the market index with its day-over-day move.
#[derive(Debug, Clone, Serialize)]
pub struct IndexSummary {
    pub code: String,
    pub price: f64,
    pub change: f64,
    pub change_percent: f64,
    pub history: Series,
}

#[derive(Debug, Clone, Serialize)]
pub struct MarketHighlights {
    pub index: IndexSummary,
}
