use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::external::history_provider::{HttpContext, SourceError};
use crate::models::{default_financials, Financials};

/// Spot reading scraped from a quote page. Zero means "not found".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpotQuote {
    pub price: f64,
    pub volume: f64,
    pub financials: Financials,
    pub url: Option<String>,
}

impl SpotQuote {
    pub fn missing() -> Self {
        Self {
            financials: default_financials(),
            ..Self::default()
        }
    }
}

/// Where the spot price comes from, independent of the historical series.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch_quote(&self, http: &HttpContext, ticker: &str) -> Result<SpotQuote, SourceError>;
}

/// CafeF ticker overview page. The Open Graph description is pre-rendered
/// and carries the live price, volume and market cap.
pub struct CafefQuoteSource {
    timeout: Duration,
}

impl CafefQuoteSource {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn page_url(ticker: &str) -> String {
        format!("https://s.cafef.vn/hose/{}-1.chn", ticker)
    }
}

static OG_DESCRIPTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<meta[^>]*property=["']og:description["'][^>]*content=["']([^"']*)["']"#)
        .expect("valid og:description regex")
});
static OG_DESCRIPTION_REVERSED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<meta[^>]*content=["']([^"']*)["'][^>]*property=["']og:description["']"#)
        .expect("valid og:description regex")
});
// "Giá cổ phiếu ( chiều 06/02/2026): 26,800 VNĐ. Khối lượng 67,073,000"
static PRICE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Giá cổ phiếu[^(]*\([^)]*\):\s*([\d.,]+)").expect("valid price regex"));
static VOLUME: Lazy<Regex> = Lazy::new(|| Regex::new(r"Khối lượng\s*([\d.,]+)").expect("valid volume regex"));
static MARKET_CAP: Lazy<Regex> = Lazy::new(|| Regex::new(r"Vốn hóa tt:\s*([\d.,]+)").expect("valid market cap regex"));
static PRICE_ELEMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"id=["'][^"']*(?:lblCurrentPrice|lblPrice)[^"']*["'][^>]*>\s*([\d.,]+)"#)
        .expect("valid price element regex")
});

/// "26,800" → 26800. The page uses ',' as the thousands separator.
fn parse_number(raw: &str) -> Option<f64> {
    raw.replace(',', "").trim_end_matches('.').parse::<f64>().ok()
}

/// Extract the spot reading from an overview page body.
pub fn parse_quote_page(html: &str) -> SpotQuote {
    let mut quote = SpotQuote::missing();

    let og = OG_DESCRIPTION
        .captures(html)
        .or_else(|| OG_DESCRIPTION_REVERSED.captures(html))
        .map(|c| c[1].to_string());

    if let Some(content) = og {
        if let Some(price) = PRICE.captures(&content).and_then(|c| parse_number(&c[1])) {
            quote.price = price;
        }
        if let Some(volume) = VOLUME.captures(&content).and_then(|c| parse_number(&c[1])) {
            quote.volume = volume;
        }
        if let Some(cap) = MARKET_CAP.captures(&content) {
            quote.financials.insert("MarketCap".to_string(), cap[1].to_string());
        }
    }

    if quote.price == 0.0 {
        if let Some(price) = PRICE_ELEMENT.captures(html).and_then(|c| parse_number(&c[1])) {
            quote.price = price;
        }
    }

    quote
}

#[async_trait]
impl QuoteSource for CafefQuoteSource {
    fn name(&self) -> &str {
        "CafeF"
    }

    async fn fetch_quote(&self, http: &HttpContext, ticker: &str) -> Result<SpotQuote, SourceError> {
        let url = Self::page_url(ticker);

        let resp = http
            .client()
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(SourceError::from_reqwest)?;

        if !resp.status().is_success() {
            return Err(SourceError::BadResponse(format!("HTTP {}", resp.status())));
        }

        let body = resp.text().await.map_err(SourceError::from_reqwest)?;
        let mut quote = parse_quote_page(&body);
        quote.url = Some(url);
        Ok(quote)
    }
}
