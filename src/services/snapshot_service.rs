use thiserror::Error;
use tracing::{info, warn};

use crate::external::history_provider::HttpContext;
use crate::external::quote_page::{QuoteSource, SpotQuote};
use crate::models::{normalize_ticker, MarketSnapshot, Series, Snapshot};
use crate::services::indicators::compute_technicals;
use crate::services::reconciler::{reconcile, SpotReading, UnitMismatchRule};
use crate::services::waterfall::{SourceWaterfall, WaterfallOutcome};

#[derive(Debug, Error, PartialEq)]
pub enum AcquireError {
    #[error("Ticker is empty after normalization")]
    EmptyTicker,

    #[error("No price data found for {ticker}. Check the ticker symbol or try again later.")]
    NoPriceFound { ticker: String },
}

/// Assembles a `Snapshot` for one ticker from the spot quote page and the
/// history waterfall.
pub struct SnapshotService {
    http: HttpContext,
    waterfall: SourceWaterfall,
    quote_source: Box<dyn QuoteSource>,
    rule: UnitMismatchRule,
    lookback_days: u32,
}

impl SnapshotService {
    pub fn new(
        http: HttpContext,
        waterfall: SourceWaterfall,
        quote_source: Box<dyn QuoteSource>,
        lookback_days: u32,
    ) -> Self {
        Self {
            http,
            waterfall,
            quote_source,
            rule: UnitMismatchRule::default(),
            lookback_days,
        }
    }

    /// Build the snapshot for `raw_ticker`.
    ///
    /// Never fails: an unrecoverable problem becomes `Snapshot::Error`
    /// carrying a message that names the ticker.
    pub async fn acquire(&self, raw_ticker: &str) -> Snapshot {
        let ticker = normalize_ticker(raw_ticker);

        match self.assemble(&ticker).await {
            Ok(snapshot) => Snapshot::Success(snapshot),
            Err(e) => {
                warn!("Snapshot for {:?} failed: {}", raw_ticker, e);
                Snapshot::Error { message: e.to_string() }
            }
        }
    }

    /// Waterfall lookup only, without quote page or reconciliation.
    pub async fn history(&self, ticker: &str) -> WaterfallOutcome {
        self.waterfall
            .fetch_series(&self.http, &normalize_ticker(ticker), self.lookback_days)
            .await
    }

    async fn assemble(&self, ticker: &str) -> Result<MarketSnapshot, AcquireError> {
        if ticker.is_empty() {
            return Err(AcquireError::EmptyTicker);
        }

        let quote = self.fetch_quote(ticker).await;
        let history = self.waterfall.fetch_series(&self.http, ticker, self.lookback_days).await;

        let reconciled = reconcile(
            SpotReading {
                price: quote.price,
                volume: quote.volume,
            },
            history.series,
            &self.rule,
        );

        if reconciled.price == 0.0 {
            return Err(AcquireError::NoPriceFound {
                ticker: ticker.to_string(),
            });
        }

        let technicals = compute_technicals(&reconciled.series);
        let (change, change_percent) = day_change(&reconciled.series);
        let source = format!(
            "{}/{}",
            self.quote_source.name(),
            history.source.as_deref().unwrap_or("none")
        );

        info!(
            rescaled = reconciled.rescaled,
            price_from_history = reconciled.price_from_history,
            "Snapshot for {}: price {} from {} ({} bars)",
            ticker,
            reconciled.price,
            source,
            reconciled.series.len()
        );

        Ok(MarketSnapshot {
            ticker: ticker.to_string(),
            source,
            price: reconciled.price,
            volume: reconciled.volume,
            change,
            change_percent,
            url: quote.url,
            technicals,
            financials: quote.financials,
            history: reconciled.series,
        })
    }

    async fn fetch_quote(&self, ticker: &str) -> SpotQuote {
        match self.quote_source.fetch_quote(&self.http, ticker).await {
            Ok(quote) => quote,
            Err(e) => {
                warn!("{} quote unavailable for {}: {}", self.quote_source.name(), ticker, e);
                SpotQuote::missing()
            }
        }
    }
}

/// Latest close minus the previous close, and that move as a percentage
/// of the previous close rounded to 2 decimals. Zero with fewer than 2 bars.
pub fn day_change(series: &Series) -> (f64, f64) {
    let bars = series.bars();
    if bars.len() < 2 {
        return (0.0, 0.0);
    }

    let latest = bars[bars.len() - 1].close;
    let previous = bars[bars.len() - 2].close;
    let change = latest - previous;
    let percent = if previous > 0.0 { change / previous * 100.0 } else { 0.0 };

    (change, (percent * 100.0).round() / 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::history_provider::{ClientProfile, HistoryProvider, SourceError};
    use crate::models::{default_financials, Bar, SnapshotStatus};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::time::Duration;

    struct FixedHistory(Vec<f64>);

    #[async_trait]
    impl HistoryProvider for FixedHistory {
        fn name(&self) -> &str {
            "fixed"
        }

        fn timeout(&self) -> Duration {
            Duration::from_secs(1)
        }

        async fn fetch_daily_history(&self, _http: &HttpContext, _ticker: &str, _days: u32) -> Result<Vec<Bar>, SourceError> {
            let start = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
            Ok(self
                .0
                .iter()
                .enumerate()
                .map(|(i, &close)| Bar {
                    date: start + chrono::Duration::days(i as i64),
                    open: close,
                    high: close,
                    low: close,
                    close,
                    volume: 500.0,
                })
                .collect())
        }
    }

    struct FailingHistory;

    #[async_trait]
    impl HistoryProvider for FailingHistory {
        fn name(&self) -> &str {
            "failing"
        }

        fn timeout(&self) -> Duration {
            Duration::from_secs(1)
        }

        async fn fetch_daily_history(&self, _http: &HttpContext, _ticker: &str, _days: u32) -> Result<Vec<Bar>, SourceError> {
            Err(SourceError::Network("connection refused".into()))
        }
    }

    struct FixedQuote(Option<f64>);

    #[async_trait]
    impl QuoteSource for FixedQuote {
        fn name(&self) -> &str {
            "quote"
        }

        async fn fetch_quote(&self, _http: &HttpContext, _ticker: &str) -> Result<SpotQuote, SourceError> {
            match self.0 {
                Some(price) => Ok(SpotQuote {
                    price,
                    volume: 1_234.0,
                    financials: default_financials(),
                    url: Some("https://example.invalid/quote".to_string()),
                }),
                None => Err(SourceError::BadResponse("HTTP 403".into())),
            }
        }
    }

    fn service(history: Box<dyn HistoryProvider>, quote: Option<f64>) -> SnapshotService {
        SnapshotService::new(
            HttpContext::new(&ClientProfile::default()).unwrap(),
            SourceWaterfall::new(vec![history]),
            Box::new(FixedQuote(quote)),
            90,
        )
    }

    #[tokio::test]
    async fn test_spot_price_with_rescaled_history() {
        let closes: Vec<f64> = (0..35).map(|i| 26.0 + i as f64 * 0.02).collect();
        let svc = service(Box::new(FixedHistory(closes)), Some(26_680.0));

        let snapshot = svc.acquire("vnm").await;
        let market = snapshot.market().expect("success snapshot");

        assert_eq!(market.ticker, "VNM");
        assert_eq!(market.price, 26_680.0);
        assert_eq!(market.volume, 1_234.0);
        assert_eq!(market.source, "quote/fixed");
        assert!(market.history.latest().unwrap().close > 26_000.0);
        assert!(market.technicals.indicators().is_some());
        assert!(market.change > 0.0);
    }

    #[tokio::test]
    async fn test_quote_failure_adopts_latest_close() {
        let svc = service(Box::new(FixedHistory(vec![61.0, 62.0])), None);

        let snapshot = svc.acquire(" fpt ").await;
        let market = snapshot.market().unwrap();

        assert_eq!(market.price, 62.0);
        assert_eq!(market.volume, 500.0);
        assert_eq!(market.change, 1.0);
        assert_eq!(market.change_percent, 1.64);
        assert_eq!(market.financials["PE"], "N/A");
        assert!(market.technicals.indicators().is_none());
    }

    #[tokio::test]
    async fn test_no_price_anywhere_is_error_naming_ticker() {
        let svc = service(Box::new(FailingHistory), Some(0.0));

        let snapshot = svc.acquire("vnm ").await;

        assert_eq!(snapshot.status(), SnapshotStatus::Error);
        assert!(snapshot.message().unwrap().contains("VNM"));
    }

    #[tokio::test]
    async fn test_spot_price_without_history_is_still_valid() {
        let svc = service(Box::new(FailingHistory), Some(45_000.0));

        let snapshot = svc.acquire("HPG").await;
        let market = snapshot.market().unwrap();

        assert_eq!(market.price, 45_000.0);
        assert!(market.history.is_empty());
        assert_eq!(market.source, "quote/none");
        assert_eq!(market.change, 0.0);
    }

    #[tokio::test]
    async fn test_empty_ticker_is_error() {
        let svc = service(Box::new(FailingHistory), Some(1.0));
        assert!(svc.acquire("  ..").await.is_error());
    }

    #[test]
    fn test_day_change_uses_last_two_closes() {
        assert_eq!(day_change(&Series::empty()), (0.0, 0.0));
    }
}
