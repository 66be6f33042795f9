use std::ops::RangeInclusive;

use tracing::info;

use crate::models::Series;

/// Spot prices above this are in full currency units.
pub const UNIT_MISMATCH_SPOT_FLOOR: f64 = 1000.0;
/// Historical closes below this are suspected to be quoted in thousands.
pub const UNIT_MISMATCH_CLOSE_CEILING: f64 = 500.0;
/// spot / latest close must land here to count as a ~1000x unit mismatch.
pub const UNIT_MISMATCH_RATIO_BAND: RangeInclusive<f64> = 800.0..=1200.0;
pub const UNIT_SCALE_FACTOR: f64 = 1000.0;
/// Bars averaged when the latest bar reports zero volume.
pub const VOLUME_FILL_WINDOW: usize = 5;

/// Thresholds for detecting a series quoted in a different denomination
/// than the spot price.
#[derive(Debug, Clone)]
pub struct UnitMismatchRule {
    pub spot_floor: f64,
    pub close_ceiling: f64,
    pub ratio_band: RangeInclusive<f64>,
    pub scale: f64,
}

impl Default for UnitMismatchRule {
    fn default() -> Self {
        Self {
            spot_floor: UNIT_MISMATCH_SPOT_FLOOR,
            close_ceiling: UNIT_MISMATCH_CLOSE_CEILING,
            ratio_band: UNIT_MISMATCH_RATIO_BAND,
            scale: UNIT_SCALE_FACTOR,
        }
    }
}

impl UnitMismatchRule {
    /// Factor to apply to the series, if the two readings disagree by the
    /// configured order of magnitude.
    pub fn scale_for(&self, spot_price: f64, latest_close: f64) -> Option<f64> {
        if spot_price <= self.spot_floor || latest_close >= self.close_ceiling || latest_close <= 0.0 {
            return None;
        }

        let ratio = spot_price / latest_close;
        self.ratio_band.contains(&ratio).then_some(self.scale)
    }
}

/// Spot price/volume as observed on a quote page; zero means unknown.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SpotReading {
    pub price: f64,
    pub volume: f64,
}

#[derive(Debug, Clone)]
pub struct Reconciled {
    pub price: f64,
    pub volume: f64,
    pub series: Series,
    /// True when the series was rescaled to match the spot price.
    pub rescaled: bool,
    /// True when price/volume were adopted from the latest bar.
    pub price_from_history: bool,
}

/// Reconcile a scraped spot reading with a historical series.
///
/// Steps, in order:
/// 1. Unit-mismatch repair: rescale every bar's prices when spot and latest
///    close are ~1000x apart
/// 2. Volume gap-fill: a zero latest volume becomes the mean of the
///    preceding 5 bars (0 with fewer than 5)
/// 3. A zero spot price adopts the latest close and its volume
///
/// The caller decides what a zero price after all of this means.
pub fn reconcile(spot: SpotReading, mut series: Series, rule: &UnitMismatchRule) -> Reconciled {
    let mut rescaled = false;

    if spot.price > 0.0 {
        if let Some(factor) = series.latest().and_then(|bar| rule.scale_for(spot.price, bar.close)) {
            info!("Rescaling history x{} to match spot price {}", factor, spot.price);
            series.scale_prices(factor);
            rescaled = true;
        }
    }

    fill_latest_volume(&mut series);

    let mut price = spot.price;
    let mut volume = spot.volume;
    let mut price_from_history = false;
    if price == 0.0 {
        if let Some(latest) = series.latest() {
            price = latest.close;
            volume = latest.volume;
            price_from_history = true;
        }
    }

    Reconciled {
        price,
        volume,
        series,
        rescaled,
        price_from_history,
    }
}

/// Replace a zero volume on the latest bar with the mean of the bars before it.
pub fn fill_latest_volume(series: &mut Series) {
    let len = series.len();
    if series.latest().map_or(true, |bar| bar.volume != 0.0) {
        return;
    }

    let fill = if len > VOLUME_FILL_WINDOW {
        let preceding = &series.bars()[len - 1 - VOLUME_FILL_WINDOW..len - 1];
        preceding.iter().map(|b| b.volume).sum::<f64>() / VOLUME_FILL_WINDOW as f64
    } else {
        0.0
    };

    if let Some(latest) = series.latest_mut() {
        info!("Filling zero volume on {} with {}", latest.date, fill);
        latest.volume = fill;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Bar;
    use chrono::NaiveDate;

    fn series_with(closes: &[f64], volumes: &[f64]) -> Series {
        let start = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        Series::from_bars(
            closes
                .iter()
                .zip(volumes)
                .enumerate()
                .map(|(i, (&close, &volume))| Bar {
                    date: start + chrono::Duration::days(i as i64),
                    open: close,
                    high: close,
                    low: close,
                    close,
                    volume,
                })
                .collect(),
        )
    }

    #[test]
    fn test_thousandfold_mismatch_rescales_every_bar() {
        let series = series_with(&[26.0, 26.5, 26.8], &[10.0, 20.0, 30.0]);
        let out = reconcile(SpotReading { price: 26_800.0, volume: 5.0 }, series, &UnitMismatchRule::default());

        assert!(out.rescaled);
        let closes = out.series.closes();
        assert!((closes[0] - 26_000.0).abs() < 1e-6);
        assert!((closes[2] - 26_800.0).abs() < 1e-6);
        assert_eq!(out.series.latest().unwrap().volume, 30.0);
        assert_eq!(out.price, 26_800.0);
        assert_eq!(out.volume, 5.0);
    }

    #[test]
    fn test_small_ratio_is_left_alone() {
        let series = series_with(&[100.0], &[10.0]);
        let out = reconcile(SpotReading { price: 500.0, volume: 0.0 }, series, &UnitMismatchRule::default());

        assert!(!out.rescaled);
        assert_eq!(out.series.closes(), vec![100.0]);
    }

    #[test]
    fn test_ratio_outside_band_is_left_alone() {
        // spot > 1000 and close < 500 but ratio 5000
        let series = series_with(&[2.0], &[10.0]);
        let out = reconcile(SpotReading { price: 10_000.0, volume: 0.0 }, series, &UnitMismatchRule::default());
        assert!(!out.rescaled);
    }

    #[test]
    fn test_band_edges_are_inclusive() {
        let rule = UnitMismatchRule::default();
        assert_eq!(rule.scale_for(80_000.0, 100.0), Some(1000.0));
        assert_eq!(rule.scale_for(120_000.0, 100.0), Some(1000.0));
        assert_eq!(rule.scale_for(120_100.0, 100.0), None);
    }

    #[test]
    fn test_zero_latest_volume_uses_mean_of_preceding_five() {
        let mut series = series_with(
            &[1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0],
            &[999.0, 100.0, 200.0, 150.0, 50.0, 0.0, 0.0],
        );
        fill_latest_volume(&mut series);
        assert_eq!(series.latest().unwrap().volume, 100.0);
    }

    #[test]
    fn test_zero_latest_volume_with_short_history_becomes_zero() {
        let mut series = series_with(&[1.0, 1.0, 1.0], &[100.0, 200.0, 0.0]);
        fill_latest_volume(&mut series);
        assert_eq!(series.latest().unwrap().volume, 0.0);
    }

    #[test]
    fn test_zero_spot_adopts_latest_bar() {
        let series = series_with(&[61.0, 62.5], &[1_000.0, 2_000.0]);
        let out = reconcile(SpotReading::default(), series, &UnitMismatchRule::default());

        assert!(out.price_from_history);
        assert_eq!(out.price, 62.5);
        assert_eq!(out.volume, 2_000.0);
    }

    #[test]
    fn test_zero_spot_and_empty_series_stays_zero() {
        let out = reconcile(SpotReading::default(), Series::empty(), &UnitMismatchRule::default());
        assert_eq!(out.price, 0.0);
        assert!(!out.price_from_history);
    }
}
