use tracing::info;

use crate::external::history_provider::INDEX_SYMBOL;
use crate::models::{IndexSummary, MarketHighlights, Series};
use crate::services::snapshot_service::{day_change, SnapshotService};

/// Latest index level and its move from the previous close.
pub fn summarize_index(code: &str, series: Series) -> IndexSummary {
    let (change, change_percent) = day_change(&series);
    let price = series.latest().map_or(0.0, |bar| bar.close);

    IndexSummary {
        code: code.to_string(),
        price,
        change,
        change_percent,
        history: series,
    }
}

pub async fn highlights(snapshots: &SnapshotService) -> MarketHighlights {
    let outcome = snapshots.history(INDEX_SYMBOL).await;
    info!(
        "Index highlights from {} ({} bars)",
        outcome.source.as_deref().unwrap_or("no source"),
        outcome.series.len()
    );

    MarketHighlights {
        index: summarize_index(INDEX_SYMBOL, outcome.series),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Bar;
    use chrono::NaiveDate;

    fn series(closes: &[f64]) -> Series {
        let start = NaiveDate::from_ymd_opt(2026, 2, 2).unwrap();
        Series::from_bars(
            closes
                .iter()
                .enumerate()
                .map(|(i, &close)| Bar {
                    date: start + chrono::Duration::days(i as i64),
                    open: close,
                    high: close,
                    low: close,
                    close,
                    volume: 0.0,
                })
                .collect(),
        )
    }

    #[test]
    fn test_summary_from_last_two_closes() {
        let summary = summarize_index("VNINDEX", series(&[1_250.0, 1_262.5]));

        assert_eq!(summary.price, 1_262.5);
        assert_eq!(summary.change, 12.5);
        assert_eq!(summary.change_percent, 1.0);
        assert_eq!(summary.history.len(), 2);
    }

    #[test]
    fn test_single_bar_has_no_change() {
        let summary = summarize_index("VNINDEX", series(&[1_250.0]));
        assert_eq!(summary.price, 1_250.0);
        assert_eq!(summary.change, 0.0);
    }

    #[test]
    fn test_empty_series_is_zero() {
        let summary = summarize_index("VNINDEX", Series::empty());
        assert_eq!(summary.price, 0.0);

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["code"], "VNINDEX");
        assert!(json["history"].as_array().unwrap().is_empty());
    }
}
