use std::fmt;

use serde::{Deserialize, Serialize};

/// Direction of the price relative to its moving averages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trend {
    #[serde(rename = "strong up")]
    StrongUp,
    #[serde(rename = "up")]
    Up,
    #[serde(rename = "strong down")]
    StrongDown,
    #[serde(rename = "down")]
    Down,
    #[serde(rename = "sideways")]
    Sideways,
}

impl Trend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::StrongUp => "strong up",
            Trend::Up => "up",
            Trend::StrongDown => "strong down",
            Trend::Down => "down",
            Trend::Sideways => "sideways",
        }
    }
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trading signal derived from RSI, Bollinger Bands and trend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Signal {
    #[serde(rename = "buy (oversold/support)")]
    BuyOversold,
    #[serde(rename = "sell (overbought/resistance)")]
    SellOverbought,
    #[serde(rename = "buy (trend-following)")]
    BuyTrendFollowing,
    #[serde(rename = "wait")]
    Wait,
}

impl Signal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::BuyOversold => "buy (oversold/support)",
            Signal::SellOverbought => "sell (overbought/resistance)",
            Signal::BuyTrendFollowing => "buy (trend-following)",
            Signal::Wait => "wait",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Technical indicators computed from the closing prices of a series.
/// Indicator values are rounded to 2 decimals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSet {
    /// Latest close as received, not rounded.
    pub current_price: f64,
    pub sma20: f64,
    pub ema20: f64,
    pub ema50: f64,
    pub bb_upper: f64,
    pub bb_lower: f64,
    pub rsi_14: f64,
    pub macd_line: f64,
    pub trend: Trend,
    pub signal: Signal,
}

pub const INSUFFICIENT_DATA_STATUS: &str = "insufficient data, minimum 30 days recommended";

/// Either a computed indicator set or the sentinel explaining why nothing
/// was computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Technicals {
    Computed(IndicatorSet),
    Unavailable { status: String },
}

impl Technicals {
    pub fn insufficient() -> Self {
        Technicals::Unavailable {
            status: INSUFFICIENT_DATA_STATUS.to_string(),
        }
    }

    pub fn indicators(&self) -> Option<&IndicatorSet> {
        match self {
            Technicals::Computed(set) => Some(set),
            Technicals::Unavailable { .. } => None,
        }
    }
}
