use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::models::{AnalysisReport, MarketSnapshot, Payload, Snapshot};
use crate::services::generation_service::GenerationService;
use crate::services::output_repair::{repair, sanitize, RepairOutcome};
use crate::services::snapshot_service::SnapshotService;

#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Acquisition produced an error record; it is returned as-is.
    #[error("{}", .0.message().unwrap_or("market data unavailable"))]
    MarketData(Snapshot),

    #[error("failed to encode analysis: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// acquire → generate → repair → merge → sanitize
pub struct AnalysisService {
    snapshots: Arc<SnapshotService>,
    generation: Arc<GenerationService>,
}

impl AnalysisService {
    pub fn new(snapshots: Arc<SnapshotService>, generation: Arc<GenerationService>) -> Self {
        Self { snapshots, generation }
    }

    /// Full analysis payload for `ticker`, ready to serialize.
    ///
    /// Only a failed acquisition is an error; a failed generation step
    /// degrades to the placeholder report.
    pub async fn analyze(&self, ticker: &str, api_key: Option<&str>) -> Result<Payload, AnalysisError> {
        let snapshot = self.snapshots.acquire(ticker).await;
        let market = match snapshot {
            Snapshot::Success(market) => market,
            error => return Err(AnalysisError::MarketData(error)),
        };

        let outcome = match self.generation.generate(&market.ticker, &market, api_key).await {
            Ok(text) => repair(&text, &market.ticker),
            Err(e) => {
                warn!("Generation failed for {}: {}", market.ticker, e);
                RepairOutcome::fallback(&market.ticker, e.to_string())
            }
        };

        info!(
            "Analysis for {} complete (generation {})",
            market.ticker,
            if outcome.is_degraded() { "degraded" } else { "ok" }
        );

        let degraded = outcome.is_degraded();
        Ok(sanitize(merge(outcome.into_report(), &market, degraded)?))
    }
}

/// Overlay the hard market data onto the generated report.
pub fn merge(report: AnalysisReport, market: &MarketSnapshot, degraded: bool) -> Result<Payload, AnalysisError> {
    let mut payload = Payload::from_serialize(&report)?;

    payload.insert("financials", Payload::from_serialize(&market.financials)?);
    payload.insert("technicals", Payload::from_serialize(&market.technicals)?);
    payload.insert("chart_data", Payload::from_serialize(&market.history)?);
    payload.insert("current_price", market.price);
    payload.insert("percent_change", format!("{:.2}%", market.change_percent));
    payload.insert("generation_status", if degraded { "degraded" } else { "ok" });

    Ok(payload)
}
