use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One trading day of open/high/low/close/volume for a ticker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    #[serde(with = "day_month_year")]
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// A bar is accepted into a series only when every price and the volume
    /// are finite and non-negative.
    pub fn is_well_formed(&self) -> bool {
        [self.open, self.high, self.low, self.close, self.volume]
            .iter()
            .all(|v| v.is_finite() && *v >= 0.0)
    }
}

/// Chronologically ordered bars for one ticker, oldest first.
///
/// Invariants (enforced by `from_bars`): strictly increasing dates, no
/// duplicate dates, every bar well formed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Series(Vec<Bar>);

impl Series {
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// Build a series from raw provider rows in any order.
    ///
    /// Malformed bars are dropped and for a repeated date the last row wins.
    pub fn from_bars(bars: Vec<Bar>) -> Self {
        let mut bars: Vec<Bar> = bars.into_iter().filter(Bar::is_well_formed).collect();

        // stable sort keeps provider order within one date, so the later row survives dedup
        bars.sort_by_key(|b| b.date);
        let mut deduped: Vec<Bar> = Vec::with_capacity(bars.len());
        for bar in bars {
            match deduped.last_mut() {
                Some(last) if last.date == bar.date => *last = bar,
                _ => deduped.push(bar),
            }
        }

        Self(deduped)
    }

    pub fn bars(&self) -> &[Bar] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn latest(&self) -> Option<&Bar> {
        self.0.last()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.0.iter().map(|b| b.close).collect()
    }

    /// Multiply open/high/low/close of every bar; volume is left alone.
    pub(crate) fn scale_prices(&mut self, factor: f64) {
        for bar in &mut self.0 {
            bar.open *= factor;
            bar.high *= factor;
            bar.low *= factor;
            bar.close *= factor;
        }
    }

    pub(crate) fn latest_mut(&mut self) -> Option<&mut Bar> {
        self.0.last_mut()
    }
}

/// Wire format for bar dates, matching what the chart frontend parses.
mod day_month_year {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%d/%m/%Y";

    pub fn serialize<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&date.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveDate::parse_from_str(&raw, FORMAT).map_err(serde::de::Error::custom)
    }
}
