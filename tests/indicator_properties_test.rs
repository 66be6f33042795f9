/// Indicator invariants checked over generated series.

use chrono::NaiveDate;
use proptest::prelude::*;

use nukida_backend::models::{Bar, Series, Technicals};
use nukida_backend::services::indicators::{compute_technicals, rsi, sma, RSI_PERIOD};

fn series_from(closes: &[f64]) -> Series {
    let start = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
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
                volume: 1_000.0,
            })
            .collect(),
    )
}

proptest! {
    #[test]
    fn sma20_is_mean_of_last_20_closes(closes in prop::collection::vec(1.0f64..100_000.0, 30..120)) {
        let expected = closes[closes.len() - 20..].iter().sum::<f64>() / 20.0;
        let value = sma(&closes, 20).unwrap();
        prop_assert!((value - expected).abs() <= 1e-9 * expected.max(1.0));

        let technicals = compute_technicals(&series_from(&closes));
        let set = technicals.indicators().unwrap();
        prop_assert!((set.sma20 - expected).abs() <= 0.005 + 1e-9 * expected);
    }

    #[test]
    fn rsi_stays_in_range(closes in prop::collection::vec(0.5f64..5_000.0, 15..120)) {
        let value = rsi(&closes, RSI_PERIOD).unwrap();
        prop_assert!((0.0..=100.0).contains(&value));
    }

    #[test]
    fn rsi_is_100_without_losses(start in 1.0f64..1_000.0, steps in prop::collection::vec(0.0f64..10.0, 14..60)) {
        let mut closes = vec![start];
        for step in steps {
            let last = *closes.last().unwrap();
            closes.push(last + step);
        }
        prop_assert_eq!(rsi(&closes, RSI_PERIOD), Some(100.0));
    }

    #[test]
    fn fewer_than_30_bars_is_sentinel(closes in prop::collection::vec(1.0f64..1_000.0, 0..30)) {
        prop_assert_eq!(compute_technicals(&series_from(&closes)), Technicals::insufficient());
    }
}
