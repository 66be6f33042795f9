use std::time::Duration;

use async_trait::async_trait;
use http::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, PRAGMA, REFERER, USER_AGENT};
use thiserror::Error;

use crate::models::Bar;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("network error: {0}")]
    Network(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("bad response: {0}")]
    BadResponse(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("no usable rows in response")]
    Empty,
}

impl SourceError {
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_decode() {
            SourceError::Parse(err.to_string())
        } else {
            SourceError::Network(err.to_string())
        }
    }
}

/// Static request headers sent to every upstream. Built once at startup.
#[derive(Debug, Clone)]
pub struct ClientProfile {
    pub user_agent: String,
    pub accept: String,
    pub accept_language: String,
    pub referer: String,
}

impl Default for ClientProfile {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36".to_string(),
            accept: "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8".to_string(),
            accept_language: "vi-VN,vi;q=0.9,en-US;q=0.8,en;q=0.7".to_string(),
            referer: "https://cafef.vn/".to_string(),
        }
    }
}

impl ClientProfile {
    fn headers(&self) -> Result<HeaderMap, SourceError> {
        let value = |raw: &str| {
            HeaderValue::from_str(raw).map_err(|e| SourceError::BadResponse(format!("invalid header value: {e}")))
        };

        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, value(&self.user_agent)?);
        headers.insert(ACCEPT, value(&self.accept)?);
        headers.insert(ACCEPT_LANGUAGE, value(&self.accept_language)?);
        headers.insert(REFERER, value(&self.referer)?);
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
        Ok(headers)
    }
}

/// Reusable HTTP client carrying the static headers.
///
/// Never mutated after construction; it is handed by reference to every
/// source call, so concurrent requests share it without locking.
#[derive(Debug, Clone)]
pub struct HttpContext {
    client: reqwest::Client,
}

impl HttpContext {
    pub fn new(profile: &ClientProfile) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .default_headers(profile.headers()?)
            .build()
            .map_err(SourceError::from_reqwest)?;

        Ok(Self { client })
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }
}

/// One upstream able to return daily bars for a ticker.
#[async_trait]
pub trait HistoryProvider: Send + Sync {
    /// Short name used in logs and in the snapshot's source tag.
    fn name(&self) -> &str;

    /// Upper bound for a single `fetch_daily_history` call.
    fn timeout(&self) -> Duration;

    /// Whether this source should be tried for `ticker` at all.
    fn supports(&self, _ticker: &str) -> bool {
        true
    }

    /// Raw bars covering roughly the last `days` calendar days, in any order.
    async fn fetch_daily_history(
        &self,
        http: &HttpContext,
        ticker: &str,
        days: u32,
    ) -> Result<Vec<Bar>, SourceError>;
}

/// Designated market index with its own fast-path source.
pub const INDEX_SYMBOL: &str = "VNINDEX";

pub fn is_index(ticker: &str) -> bool {
    ticker == INDEX_SYMBOL
}

/// Source timeouts are kept inside this window whatever the configuration says.
pub const MIN_SOURCE_TIMEOUT: Duration = Duration::from_secs(3);
pub const MAX_SOURCE_TIMEOUT: Duration = Duration::from_secs(10);

pub fn clamp_source_timeout(timeout: Duration) -> Duration {
    timeout.clamp(MIN_SOURCE_TIMEOUT, MAX_SOURCE_TIMEOUT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_profile_builds_headers() {
        let headers = ClientProfile::default().headers().unwrap();
        assert!(headers.get(USER_AGENT).is_some());
        assert_eq!(headers.get(PRAGMA).unwrap(), "no-cache");
    }

    #[test]
    fn test_invalid_header_value_is_rejected() {
        let profile = ClientProfile {
            user_agent: "bad\nvalue".to_string(),
            ..ClientProfile::default()
        };
        assert!(profile.headers().is_err());
    }

    #[test]
    fn test_timeouts_are_clamped() {
        assert_eq!(clamp_source_timeout(Duration::from_secs(1)), MIN_SOURCE_TIMEOUT);
        assert_eq!(clamp_source_timeout(Duration::from_secs(60)), MAX_SOURCE_TIMEOUT);
        assert_eq!(clamp_source_timeout(Duration::from_secs(5)), Duration::from_secs(5));
    }
}
