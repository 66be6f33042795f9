use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::debug;

use crate::external::history_provider::{HistoryProvider, HttpContext, SourceError};
use crate::models::Bar;

/// Upper bound on rows taken from one SSI response.
const MAX_ROWS: usize = 50;

/// SSI iBoard brokerage API, last resort.
pub struct SsiProvider {
    timeout: Duration,
}

impl SsiProvider {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[derive(Debug, Deserialize)]
struct SsiResponse {
    data: Option<Vec<SsiRow>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SsiRow {
    trading_date: Option<String>,
    open_price: Option<f64>,
    highest_price: Option<f64>,
    lowest_price: Option<f64>,
    close_price: Option<f64>,
    total_volume: Option<f64>,
}

impl SsiRow {
    fn into_bar(self) -> Option<Bar> {
        let date = NaiveDate::parse_from_str(self.trading_date.as_deref()?, "%Y-%m-%d").ok()?;
        let close = self.close_price.unwrap_or(0.0);

        Some(Bar {
            date,
            open: self.open_price.unwrap_or(close),
            high: self.highest_price.unwrap_or(close),
            low: self.lowest_price.unwrap_or(close),
            close,
            volume: self.total_volume.unwrap_or(0.0),
        })
    }
}

impl SsiResponse {
    fn into_bars(self) -> Result<Vec<Bar>, SourceError> {
        let rows = self
            .data
            .ok_or_else(|| SourceError::BadResponse("missing data in response".into()))?;

        let total = rows.len();
        let bars: Vec<Bar> = rows.into_iter().take(MAX_ROWS).filter_map(SsiRow::into_bar).collect();
        if bars.len() < total.min(MAX_ROWS) {
            debug!("SSI: skipped {} malformed rows", total.min(MAX_ROWS) - bars.len());
        }

        Ok(bars)
    }
}

#[async_trait]
impl HistoryProvider for SsiProvider {
    fn name(&self) -> &str {
        "SSI iBoard"
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn fetch_daily_history(
        &self,
        http: &HttpContext,
        ticker: &str,
        _days: u32,
    ) -> Result<Vec<Bar>, SourceError> {
        // SSI only exposes fixed windows; 1M is the one that answers reliably
        let url = format!("https://iboard-query.ssi.com.vn/stock/second/history/{}/1M", ticker);

        let resp = http
            .client()
            .get(&url)
            .send()
            .await
            .map_err(SourceError::from_reqwest)?;

        if !resp.status().is_success() {
            return Err(SourceError::BadResponse(format!("HTTP {}", resp.status())));
        }

        let body: SsiResponse = resp.json().await.map_err(SourceError::from_reqwest)?;
        body.into_bars()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_rows_are_skipped() {
        let body: SsiResponse = serde_json::from_str(
            r#"{"data":[
                {"tradingDate":"2026-02-06","openPrice":26500,"highestPrice":27000,
                 "lowestPrice":26400,"closePrice":26800,"totalVolume":67073000},
                {"tradingDate":"not a date","closePrice":26000},
                {"closePrice":25900}
            ]}"#,
        )
        .unwrap();

        let bars = body.into_bars().unwrap();
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].close, 26_800.0);
        assert_eq!(bars[0].volume, 67_073_000.0);
    }

    #[test]
    fn test_caps_rows() {
        let rows: Vec<String> = (0..80)
            .map(|i| {
                let date = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap() + chrono::Duration::days(i);
                format!(r#"{{"tradingDate":"{}","closePrice":10}}"#, date.format("%Y-%m-%d"))
            })
            .collect();
        let body: SsiResponse = serde_json::from_str(&format!(r#"{{"data":[{}]}}"#, rows.join(","))).unwrap();

        assert_eq!(body.into_bars().unwrap().len(), MAX_ROWS);
    }

    #[test]
    fn test_missing_data_is_bad_response() {
        let body: SsiResponse = serde_json::from_str(r#"{"code":"ERR"}"#).unwrap();
        assert!(matches!(body.into_bars(), Err(SourceError::BadResponse(_))));
    }
}
