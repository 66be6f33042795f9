use tracing::{info, warn};

use crate::external::history_provider::{HistoryProvider, HttpContext, SourceError};
use crate::models::Series;

/// What the waterfall settled on for one ticker.
#[derive(Debug, Clone)]
pub struct WaterfallOutcome {
    pub series: Series,
    /// Name of the source that produced `series`; `None` when every source failed.
    pub source: Option<String>,
}

impl WaterfallOutcome {
    fn exhausted() -> Self {
        Self {
            series: Series::empty(),
            source: None,
        }
    }
}

/// Ordered fallback chain over independent history sources.
///
/// Strategy:
/// 1. Try each source in order, skipping the ones that don't serve this ticker
/// 2. Each attempt is bounded by that source's own timeout
/// 3. The first non-empty, well-formed series wins; results are never merged
/// 4. If every source fails the result is an empty series, not an error
pub struct SourceWaterfall {
    sources: Vec<Box<dyn HistoryProvider>>,
}

impl SourceWaterfall {
    pub fn new(sources: Vec<Box<dyn HistoryProvider>>) -> Self {
        Self { sources }
    }

    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    pub async fn fetch_series(&self, http: &HttpContext, ticker: &str, days: u32) -> WaterfallOutcome {
        for source in self.sources.iter().filter(|s| s.supports(ticker)) {
            info!("Trying {} for {} history", source.name(), ticker);

            match Self::attempt(source.as_ref(), http, ticker, days).await {
                Ok(series) => {
                    info!("✓ {} returned {} bars for {}", source.name(), series.len(), ticker);
                    return WaterfallOutcome {
                        series,
                        source: Some(source.name().to_string()),
                    };
                }
                Err(e) => {
                    warn!("{} unavailable for {}: {}. Trying next source.", source.name(), ticker, e);
                }
            }
        }

        warn!("All history sources failed for {}", ticker);
        WaterfallOutcome::exhausted()
    }

    async fn attempt(
        source: &dyn HistoryProvider,
        http: &HttpContext,
        ticker: &str,
        days: u32,
    ) -> Result<Series, SourceError> {
        let timeout = source.timeout();
        let bars = tokio::time::timeout(timeout, source.fetch_daily_history(http, ticker, days))
            .await
            .map_err(|_| SourceError::Timeout(timeout))??;

        let series = Series::from_bars(bars);
        if series.is_empty() {
            return Err(SourceError::Empty);
        }
        Ok(series)
    }
}
