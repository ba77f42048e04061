/// Average True Range (ATR) indicator
///
/// True Range is the greatest of:
/// - Current High - Current Low
/// - Abs(Current High - Previous Close)
/// - Abs(Current Low - Previous Close)
///
/// The first bar has no previous close, its true range is its high-low span.
/// ATR is the simple rolling mean of true ranges.

use crate::indicators::moving_average::rolling_mean;
use crate::models::Candle;

/// True range of every candle, aligned with `candles`
pub fn true_ranges(candles: &[Candle]) -> Vec<f64> {
    candles
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let span = c.high - c.low;
            match i.checked_sub(1).map(|p| candles[p].close) {
                Some(prev_close) => span
                    .max((c.high - prev_close).abs())
                    .max((c.low - prev_close).abs()),
                None => span,
            }
        })
        .collect()
}

/// ATR series aligned with `candles`; `None` until `period` bars are seen
pub fn calculate_atr_series(candles: &[Candle], period: usize) -> Vec<Option<f64>> {
    rolling_mean(&true_ranges(candles), period)
}

/// Current ATR value, or None if insufficient data
pub fn calculate_atr(candles: &[Candle], period: usize) -> Option<f64> {
    calculate_atr_series(candles, period).last().copied().flatten()
}

/// True when the latest ATR is at or above the mean of all defined ATR values
pub fn is_atr_expanding(candles: &[Candle], period: usize) -> Option<bool> {
    let series: Vec<f64> = calculate_atr_series(candles, period)
        .into_iter()
        .flatten()
        .collect();
    let current = *series.last()?;
    let mean = series.iter().sum::<f64>() / series.len() as f64;
    Some(current >= mean)
}
