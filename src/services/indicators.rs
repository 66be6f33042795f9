use crate::models::{IndicatorSet, Series, Signal, Technicals, Trend};

/// Fewer bars than this and no indicator is computed.
pub const MIN_BARS: usize = 30;

pub const SMA_PERIOD: usize = 20;
pub const EMA_SHORT_PERIOD: usize = 20;
pub const EMA_LONG_PERIOD: usize = 50;
pub const BOLLINGER_STD_DEVS: f64 = 2.0;
pub const RSI_PERIOD: usize = 14;
pub const MACD_FAST_PERIOD: usize = 12;
pub const MACD_SLOW_PERIOD: usize = 26;
/// Tail lengths the MACD EMAs are computed over.
pub const MACD_FAST_WINDOW: usize = MACD_SLOW_PERIOD + MACD_FAST_PERIOD;
pub const MACD_SLOW_WINDOW: usize = MACD_SLOW_PERIOD;

/// Simple Moving Average of the last `window` values.
///
/// Returns `None` when fewer than `window` values exist.
pub fn sma(values: &[f64], window: usize) -> Option<f64> {
    if window == 0 || values.len() < window {
        return None;
    }
    let tail = &values[values.len() - window..];
    Some(tail.iter().sum::<f64>() / window as f64)
}

/// Exponential Moving Average seeded with the first value of `window`.
///
/// k = 2 / (period + 1); for every later price: ema = price*k + ema*(1-k)
pub fn ema(window: &[f64], period: usize) -> Option<f64> {
    let (&seed, rest) = window.split_first()?;
    let k = 2.0 / (period as f64 + 1.0);

    Some(rest.iter().fold(seed, |ema, &price| price * k + ema * (1.0 - k)))
}

/// EMA over a tail of `values` twice as long as the period, so the
/// recursive smoothing has time to settle. Uses everything when shorter.
pub fn ema_settled(values: &[f64], period: usize) -> Option<f64> {
    ema_tail(values, period, 2 * period)
}

/// EMA over the last `window` values (all of them when shorter).
pub fn ema_tail(values: &[f64], period: usize, window: usize) -> Option<f64> {
    let span = window.min(values.len());
    ema(&values[values.len() - span..], period)
}

/// Bollinger Bands over the last `period` values.
///
/// Components:
/// - Middle Band: SMA of the window
/// - Upper/Lower Band: middle ± num_std_dev * population std deviation
///
/// Returns `(middle, upper, lower)`.
pub fn bollinger_bands(values: &[f64], period: usize, num_std_dev: f64) -> Option<(f64, f64, f64)> {
    let mean = sma(values, period)?;
    let window = &values[values.len() - period..];

    let variance = window
        .iter()
        .map(|&x| {
            let diff = x - mean;
            diff * diff
        })
        .sum::<f64>()
        / period as f64;
    let std_dev = variance.sqrt();

    Some((mean, mean + num_std_dev * std_dev, mean - num_std_dev * std_dev))
}

/// Relative Strength Index over the last `period` single-step changes.
///
/// Uses plain averages (sum / period), not Wilder smoothing:
/// 1. Take the last `period` deltas
/// 2. avg_gain = sum of positive deltas / period, avg_loss = sum of |negative deltas| / period
/// 3. avg_loss == 0 saturates at 100
/// 4. RSI = 100 - 100 / (1 + avg_gain / avg_loss)
pub fn rsi(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period + 1 {
        return None;
    }

    let tail = &values[values.len() - period - 1..];
    let (gains, losses) = tail.windows(2).map(|w| w[1] - w[0]).fold((0.0, 0.0), |(g, l), delta| {
        if delta > 0.0 {
            (g + delta, l)
        } else if delta < 0.0 {
            (g, l - delta)
        } else {
            (g, l)
        }
    });

    let avg_gain = gains / period as f64;
    let avg_loss = losses / period as f64;

    if avg_loss == 0.0 {
        return Some(100.0);
    }
    Some(100.0 - 100.0 / (1.0 + avg_gain / avg_loss))
}

/// MACD line only: EMA12 minus EMA26. No signal line or histogram.
///
/// EMA12 runs over the last `MACD_FAST_WINDOW` values and EMA26 over the
/// last `MACD_SLOW_WINDOW`.
pub fn macd_line(values: &[f64]) -> Option<f64> {
    let fast = ema_tail(values, MACD_FAST_PERIOD, MACD_FAST_WINDOW)?;
    let slow = ema_tail(values, MACD_SLOW_PERIOD, MACD_SLOW_WINDOW)?;
    Some(fast - slow)
}

/// First matching rule wins.
pub fn classify_trend(price: f64, ema20: f64, ema50: f64) -> Trend {
    if price > ema20 && ema20 > ema50 {
        Trend::StrongUp
    } else if price > ema20 {
        Trend::Up
    } else if price < ema20 && ema20 < ema50 {
        Trend::StrongDown
    } else if price < ema20 {
        Trend::Down
    } else {
        Trend::Sideways
    }
}

/// First matching rule wins.
pub fn classify_signal(price: f64, rsi: f64, bb_upper: f64, bb_lower: f64, trend: Trend) -> Signal {
    if rsi < 35.0 && price <= bb_lower {
        Signal::BuyOversold
    } else if rsi > 65.0 && price >= bb_upper {
        Signal::SellOverbought
    } else if trend == Trend::Up && rsi < 50.0 {
        Signal::BuyTrendFollowing
    } else {
        Signal::Wait
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Compute the indicator set for a series, or the insufficient-data
/// sentinel when it has fewer than `MIN_BARS` bars.
///
/// Comparisons use full precision; only the reported values are rounded.
pub fn compute_technicals(series: &Series) -> Technicals {
    if series.len() < MIN_BARS {
        return Technicals::insufficient();
    }

    match compute_indicator_set(&series.closes()) {
        Some(set) => Technicals::Computed(set),
        None => Technicals::insufficient(),
    }
}

fn compute_indicator_set(closes: &[f64]) -> Option<IndicatorSet> {
    let price = *closes.last()?;

    let sma20 = sma(closes, SMA_PERIOD)?;
    let ema20 = ema_settled(closes, EMA_SHORT_PERIOD)?;
    let ema50 = if closes.len() >= EMA_LONG_PERIOD {
        ema_settled(closes, EMA_LONG_PERIOD)?
    } else {
        sma20
    };
    let (_, bb_upper, bb_lower) = bollinger_bands(closes, SMA_PERIOD, BOLLINGER_STD_DEVS)?;
    let rsi_14 = rsi(closes, RSI_PERIOD)?;
    let macd = macd_line(closes)?;

    let trend = classify_trend(price, ema20, ema50);
    let signal = classify_signal(price, rsi_14, bb_upper, bb_lower, trend);

    Some(IndicatorSet {
        current_price: price,
        sma20: round2(sma20),
        ema20: round2(ema20),
        ema50: round2(ema50),
        bb_upper: round2(bb_upper),
        bb_lower: round2(bb_lower),
        rsi_14: round2(rsi_14),
        macd_line: round2(macd),
        trend,
        signal,
    })
}
