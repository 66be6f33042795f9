use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::response::Response;
use chrono::NaiveDate;

use crate::external::generation_provider::{GenerationError, GenerationProvider, Prompt};
use crate::external::history_provider::{ClientProfile, HistoryProvider, HttpContext, SourceError};
use crate::external::quote_page::{QuoteSource, SpotQuote};
use crate::models::Bar;
use crate::services::analysis_service::AnalysisService;
use crate::services::generation_service::{GenerationConfig, GenerationService};
use crate::services::snapshot_service::SnapshotService;
use crate::services::waterfall::SourceWaterfall;
use crate::state::AppState;

/// `bars` daily closes 100, 101, ... for any ticker.
struct StaticHistory(usize);

#[async_trait]
impl HistoryProvider for StaticHistory {
    fn name(&self) -> &str {
        "static"
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(1)
    }

    async fn fetch_daily_history(&self, _http: &HttpContext, _ticker: &str, _days: u32) -> Result<Vec<Bar>, SourceError> {
        let start = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();
        Ok((0..self.0)
            .map(|i| Bar {
                date: start + chrono::Duration::days(i as i64),
                open: 100.0,
                high: 101.0 + i as f64,
                low: 99.0,
                close: 100.0 + i as f64,
                volume: 10_000.0,
            })
            .collect())
    }
}

struct StaticQuote(f64);

#[async_trait]
impl QuoteSource for StaticQuote {
    fn name(&self) -> &str {
        "static"
    }

    async fn fetch_quote(&self, _http: &HttpContext, _ticker: &str) -> Result<SpotQuote, SourceError> {
        Ok(SpotQuote {
            price: self.0,
            ..SpotQuote::missing()
        })
    }
}

struct StaticReply(&'static str);

#[async_trait]
impl GenerationProvider for StaticReply {
    fn name(&self) -> &str {
        "static"
    }

    async fn complete(&self, _api_key: &str, _prompt: &Prompt) -> Result<String, GenerationError> {
        Ok(self.0.to_string())
    }
}

pub(crate) fn test_state(bars: usize, quote_price: f64, reply: &'static str) -> AppState {
    let snapshots = Arc::new(SnapshotService::new(
        HttpContext::new(&ClientProfile::default()).unwrap(),
        SourceWaterfall::new(vec![Box::new(StaticHistory(bars))]),
        Box::new(StaticQuote(quote_price)),
        90,
    ));
    let generation = Arc::new(GenerationService::new(
        GenerationConfig {
            api_key: Some("server-key".to_string()),
            ..GenerationConfig::default()
        },
        Arc::new(StaticReply(reply)),
    ));

    AppState {
        analysis: Arc::new(AnalysisService::new(snapshots.clone(), generation)),
        snapshots,
    }
}

pub(crate) async fn body_json(response: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
