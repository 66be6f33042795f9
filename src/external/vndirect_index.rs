use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;

use crate::external::history_provider::{is_index, HistoryProvider, HttpContext, SourceError};
use crate::models::Bar;

/// VNDirect finfo price endpoint. Only used for the market index, where it
/// answers faster than the general-purpose sources.
pub struct VnDirectIndexProvider {
    timeout: Duration,
}

impl VnDirectIndexProvider {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[derive(Debug, Deserialize)]
struct FinfoResponse {
    #[serde(default)]
    data: Vec<FinfoRow>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FinfoRow {
    date: String,
    ad_open: Option<f64>,
    ad_high: Option<f64>,
    ad_low: Option<f64>,
    ad_close: Option<f64>,
    nm_volume: Option<f64>,
}

impl FinfoRow {
    /// Missing open/high/low fall back to the close.
    fn into_bar(self) -> Result<Bar, SourceError> {
        let date = NaiveDate::parse_from_str(&self.date, "%Y-%m-%d")
            .map_err(|e| SourceError::Parse(e.to_string()))?;
        let close = self.ad_close.unwrap_or(0.0);

        Ok(Bar {
            date,
            open: self.ad_open.unwrap_or(close),
            high: self.ad_high.unwrap_or(close),
            low: self.ad_low.unwrap_or(close),
            close,
            volume: self.nm_volume.unwrap_or(0.0),
        })
    }
}

#[async_trait]
impl HistoryProvider for VnDirectIndexProvider {
    fn name(&self) -> &str {
        "VNDirect Finfo"
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn supports(&self, ticker: &str) -> bool {
        is_index(ticker)
    }

    async fn fetch_daily_history(
        &self,
        http: &HttpContext,
        ticker: &str,
        days: u32,
    ) -> Result<Vec<Bar>, SourceError> {
        // trading days are fewer than calendar days, so `days` rows is plenty
        let size = days.clamp(30, 500).to_string();
        let query = format!("code:{}", ticker);

        let resp = http
            .client()
            .get("https://finfo-api.vndirect.com.vn/v4/stock_prices")
            .query(&[("query", query.as_str()), ("size", size.as_str()), ("sort", "date:desc")])
            .send()
            .await
            .map_err(SourceError::from_reqwest)?;

        if !resp.status().is_success() {
            return Err(SourceError::BadResponse(format!("HTTP {}", resp.status())));
        }

        let body: FinfoResponse = resp.json().await.map_err(SourceError::from_reqwest)?;

        // newest first on the wire; Series::from_bars re-orders
        body.data.into_iter().map(FinfoRow::into_bar).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::history_provider::INDEX_SYMBOL;

    #[test]
    fn test_only_supports_index() {
        let provider = VnDirectIndexProvider::new(Duration::from_secs(5));
        assert!(provider.supports(INDEX_SYMBOL));
        assert!(!provider.supports("VNM"));
    }

    #[test]
    fn test_missing_ohl_default_to_close() {
        let body: FinfoResponse = serde_json::from_str(
            r#"{"data":[{"date":"2026-02-06","adClose":1250.5,"nmVolume":500000}]}"#,
        )
        .unwrap();

        let bar = body.data.into_iter().next().unwrap().into_bar().unwrap();
        assert_eq!(bar.open, 1250.5);
        assert_eq!(bar.high, 1250.5);
        assert_eq!(bar.low, 1250.5);
        assert_eq!(bar.volume, 500_000.0);
    }

    #[test]
    fn test_bad_date_is_parse_error() {
        let row = FinfoRow {
            date: "06/02/2026".to_string(),
            ad_open: None,
            ad_high: None,
            ad_low: None,
            ad_close: Some(1.0),
            nm_volume: None,
        };
        assert!(matches!(row.into_bar(), Err(SourceError::Parse(_))));
    }
}
