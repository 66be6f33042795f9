use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use http::header::REFERER;
use serde::Deserialize;

use crate::external::history_provider::{HistoryProvider, HttpContext, SourceError};
use crate::models::Bar;

const DCHART_URL: &str = "https://dchart-api.vndirect.com.vn/dchart/history";

/// VNDirect DChart (TradingView "udf" format). Lightweight and usually the
/// most stable source, so it goes first.
pub struct DChartProvider {
    timeout: Duration,
}

impl DChartProvider {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

/// Parallel arrays, one entry per bar, oldest first.
#[derive(Debug, Deserialize)]
struct DChartResponse {
    s: String,
    #[serde(default)]
    t: Vec<i64>,
    #[serde(default)]
    o: Vec<Option<f64>>,
    #[serde(default)]
    h: Vec<Option<f64>>,
    #[serde(default)]
    l: Vec<Option<f64>>,
    #[serde(default)]
    c: Vec<Option<f64>>,
    #[serde(default)]
    v: Vec<Option<f64>>,
}

impl DChartResponse {
    fn into_bars(self) -> Result<Vec<Bar>, SourceError> {
        if self.s != "ok" {
            return Err(SourceError::BadResponse(format!("status {}", self.s)));
        }

        let n = self.t.len();
        if [self.o.len(), self.h.len(), self.l.len(), self.c.len(), self.v.len()]
            .iter()
            .any(|&len| len != n)
        {
            return Err(SourceError::Parse("column lengths differ".into()));
        }

        let bars = (0..n)
            .filter_map(|i| {
                // A row without a close is dropped on its own
                let close = self.c[i]?;
                let date = DateTime::from_timestamp(self.t[i], 0)?.date_naive();
                Some(Bar {
                    date,
                    open: self.o[i].unwrap_or(close),
                    high: self.h[i].unwrap_or(close),
                    low: self.l[i].unwrap_or(close),
                    close,
                    volume: self.v[i].unwrap_or(0.0),
                })
            })
            .collect();

        Ok(bars)
    }
}

#[async_trait]
impl HistoryProvider for DChartProvider {
    fn name(&self) -> &str {
        "VNDirect DChart"
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
        let to = Utc::now();
        let from = to - chrono::Duration::days(days as i64);

        let resp = http
            .client()
            .get(DCHART_URL)
            .header(REFERER, "https://dchart.vndirect.com.vn/")
            .query(&[
                ("resolution", "D".to_string()),
                ("symbol", ticker.to_string()),
                ("from", from.timestamp().to_string()),
                ("to", to.timestamp().to_string()),
            ])
            .send()
            .await
            .map_err(SourceError::from_reqwest)?;

        if !resp.status().is_success() {
            return Err(SourceError::BadResponse(format!("HTTP {}", resp.status())));
        }

        let body: DChartResponse = resp.json().await.map_err(SourceError::from_reqwest)?;
        body.into_bars()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_parallel_arrays() {
        let body: DChartResponse = serde_json::from_str(
            r#"{"s":"ok","t":[1767657600,1767744000],"o":[26.5,26.8],"h":[27.0,27.1],
                "l":[26.1,26.6],"c":[26.8,27.0],"v":[1000,2000]}"#,
        )
        .unwrap();

        let bars = body.into_bars().unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[1].close, 27.0);
        assert!(bars[0].date < bars[1].date);
    }

    #[test]
    fn test_null_cells_only_affect_their_row() {
        let body: DChartResponse = serde_json::from_str(
            r#"{"s":"ok","t":[1767657600,1767744000,1767830400],"o":[26.5,null,27.2],
                "h":[27.0,27.1,27.4],"l":[26.1,26.6,27.0],"c":[26.8,27.0,null],"v":[1000,null,3000]}"#,
        )
        .unwrap();

        let bars = body.into_bars().unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].close, 26.8);
        // missing open and volume fall back to the close and zero
        assert_eq!(bars[1].open, 27.0);
        assert_eq!(bars[1].volume, 0.0);
    }

    #[test]
    fn test_no_data_status_is_bad_response() {
        let body: DChartResponse = serde_json::from_str(r#"{"s":"no_data"}"#).unwrap();
        assert!(matches!(body.into_bars(), Err(SourceError::BadResponse(_))));
    }

    #[test]
    fn test_ragged_columns_are_rejected() {
        let body: DChartResponse =
            serde_json::from_str(r#"{"s":"ok","t":[1,2],"o":[1],"h":[1],"l":[1],"c":[1],"v":[1]}"#).unwrap();
        assert!(matches!(body.into_bars(), Err(SourceError::Parse(_))));
    }
}
