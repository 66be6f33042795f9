use std::collections::BTreeMap;

use serde::Serialize;

use crate::models::{Series, Technicals};

/// Label → display string, e.g. `"PE" => "12.4"`.
pub type Financials = BTreeMap<String, String>;

pub const NOT_AVAILABLE: &str = "N/A";

/// Hard market data for one ticker, assembled once per request.
#[derive(Debug, Clone, Serialize)]
pub struct MarketSnapshot {
    pub ticker: String,
    pub source: String,
    pub price: f64,
    pub volume: f64,
    pub change: f64,
    pub change_percent: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub technicals: Technicals,
    pub financials: Financials,
    pub history: Series,
}

/// Result of `acquire`: a complete snapshot or an error record, never a
/// partially filled snapshot.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Snapshot {
    Success(MarketSnapshot),
    Error { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotStatus {
    Success,
    Error,
}

impl Snapshot {
    pub fn status(&self) -> SnapshotStatus {
        match self {
            Snapshot::Success(_) => SnapshotStatus::Success,
            Snapshot::Error { .. } => SnapshotStatus::Error,
        }
    }

    pub fn is_error(&self) -> bool {
        self.status() == SnapshotStatus::Error
    }

    pub fn market(&self) -> Option<&MarketSnapshot> {
        match self {
            Snapshot::Success(snapshot) => Some(snapshot),
            Snapshot::Error { .. } => None,
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Snapshot::Success(_) => None,
            Snapshot::Error { message } => Some(message),
        }
    }
}

/// Strip everything but ASCII letters and digits, then upper-case.
///
/// An empty result is the caller's validation problem.
pub fn normalize_ticker(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Financials with every expected label present.
pub fn default_financials() -> Financials {
    ["EPS", "PE", "MarketCap"]
        .iter()
        .map(|label| (label.to_string(), NOT_AVAILABLE.to_string()))
        .collect()
}
