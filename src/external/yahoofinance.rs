use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::external::history_provider::{is_index, HistoryProvider, HttpContext, SourceError};
use crate::models::Bar;

/// Yahoo Finance chart API. No API key required; Vietnamese listings use the
/// `.VN` suffix and the index is `^VNI`.
pub struct YahooFinanceProvider {
    timeout: Duration,
}

impl YahooFinanceProvider {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn yahoo_symbol(ticker: &str) -> String {
        if is_index(ticker) {
            "^VNI".to_string()
        } else {
            format!("{}.VN", ticker)
        }
    }

    // Yahoo uses "1mo", "3mo", "6mo", "1y", ... rather than day counts
    fn range_for(days: u32) -> &'static str {
        if days <= 30 {
            "1mo"
        } else if days <= 90 {
            "3mo"
        } else if days <= 180 {
            "6mo"
        } else if days <= 365 {
            "1y"
        } else {
            "2y"
        }
    }
}

#[derive(Debug, Deserialize)]
struct YahooChartResponse {
    chart: YahooChart,
}

#[derive(Debug, Deserialize)]
struct YahooChart {
    result: Option<Vec<YahooResult>>,
    error: Option<YahooError>,
}

#[derive(Debug, Deserialize)]
struct YahooError {
    description: String,
}

#[derive(Debug, Deserialize)]
struct YahooResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: YahooIndicators,
}

#[derive(Debug, Deserialize)]
struct YahooIndicators {
    quote: Vec<YahooQuote>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct YahooQuote {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    volume: Vec<Option<f64>>,
}

impl YahooChartResponse {
    fn into_bars(self) -> Result<Vec<Bar>, SourceError> {
        if let Some(error) = self.chart.error {
            return Err(SourceError::BadResponse(error.description));
        }

        let result = self
            .chart
            .result
            .and_then(|results| results.into_iter().next())
            .ok_or_else(|| SourceError::BadResponse("No results in response".into()))?;

        let quote = result
            .indicators
            .quote
            .into_iter()
            .next()
            .ok_or_else(|| SourceError::BadResponse("No quote data in response".into()))?;

        let n = result.timestamp.len();
        if [quote.open.len(), quote.high.len(), quote.low.len(), quote.close.len(), quote.volume.len()]
            .iter()
            .any(|&len| len != n)
        {
            return Err(SourceError::Parse(
                "Timestamp and quote arrays have different lengths".into(),
            ));
        }

        let bars = (0..n)
            .filter_map(|i| {
                // Skip null rows (market holidays, halted sessions)
                let close = quote.close[i]?;
                let date = chrono::DateTime::from_timestamp(result.timestamp[i], 0)?.date_naive();

                Some(Bar {
                    date,
                    open: quote.open[i].unwrap_or(close),
                    high: quote.high[i].unwrap_or(close),
                    low: quote.low[i].unwrap_or(close),
                    close,
                    volume: quote.volume[i].unwrap_or(0.0),
                })
            })
            .collect();

        Ok(bars)
    }
}

#[async_trait]
impl HistoryProvider for YahooFinanceProvider {
    fn name(&self) -> &str {
        "Yahoo Finance"
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn fetch_daily_history(
        &self,
        http: &HttpContext,
        ticker: &str,
        days: u32,
    ) -> Result<Vec<Bar>, SourceError> {
        let url = format!(
            "https://query1.finance.yahoo.com/v8/finance/chart/{}",
            Self::yahoo_symbol(ticker)
        );

        let resp = http
            .client()
            .get(&url)
            .query(&[("interval", "1d"), ("range", Self::range_for(days))])
            .send()
            .await
            .map_err(SourceError::from_reqwest)?;

        if !resp.status().is_success() {
            return Err(SourceError::BadResponse(format!("HTTP {}", resp.status())));
        }

        let body: YahooChartResponse = resp.json().await.map_err(SourceError::from_reqwest)?;
        body.into_bars()
    }
}
