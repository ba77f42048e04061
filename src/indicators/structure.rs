/// Market structure analysis
///
/// Swing (pivot) detection on highs and lows, and classification of the two
/// most recent swings into break-of-structure / change-of-character labels.

use crate::models::{Bias, Candle, Direction};

/// Indices of swing highs: bars strictly higher than `strength` bars on each side
///
/// Bars without a full neighbourhood on both sides are never pivots.
pub fn swing_highs(candles: &[Candle], strength: usize) -> Vec<usize> {
    let highs: Vec<f64> = candles.iter().map(|c| c.high).collect();
    pivots(&highs, strength, |center, other| center > other)
}

/// Indices of swing lows: bars strictly lower than `strength` bars on each side
pub fn swing_lows(candles: &[Candle], strength: usize) -> Vec<usize> {
    let lows: Vec<f64> = candles.iter().map(|c| c.low).collect();
    pivots(&lows, strength, |center, other| center < other)
}

fn pivots(values: &[f64], strength: usize, beats: impl Fn(f64, f64) -> bool) -> Vec<usize> {
    let strength = strength.max(1);
    if values.len() < 2 * strength + 1 {
        return Vec::new();
    }

    (strength..values.len() - strength)
        .filter(|&i| {
            let center = values[i];
            values[i - strength..i]
                .iter()
                .chain(&values[i + 1..=i + strength])
                .all(|&other| beats(center, other))
        })
        .collect()
}

/// Classify the last two swing highs and lows (oldest first in each slice)
///
/// | highs | lows  | bias          |
/// |-------|-------|---------------|
/// | up    | up    | BULLISH_BOS   |
/// | down  | down  | BEARISH_BOS   |
/// | down  | up    | BEARISH_CHOCH |
/// | up    | down  | BULLISH_CHOCH |
///
/// Ties, or fewer than two swings of either kind, give no bias.
pub fn classify_bias(highs: &[f64], lows: &[f64]) -> Option<Bias> {
    if highs.len() < 2 || lows.len() < 2 {
        return None;
    }

    let (h1, h2) = (highs[highs.len() - 2], highs[highs.len() - 1]);
    let (l1, l2) = (lows[lows.len() - 2], lows[lows.len() - 1]);

    if h2 > h1 && l2 > l1 {
        Some(Bias::BullishBos)
    } else if l2 < l1 && h2 < h1 {
        Some(Bias::BearishBos)
    } else if h2 < h1 && l2 > l1 {
        Some(Bias::BearishChoch)
    } else if h2 > h1 && l2 < l1 {
        Some(Bias::BullishChoch)
    } else {
        None
    }
}

/// Detect the structure bias of a candle series from its pivots
pub fn market_structure(candles: &[Candle], strength: usize) -> Option<Bias> {
    let highs: Vec<f64> = swing_highs(candles, strength)
        .into_iter()
        .map(|i| candles[i].high)
        .collect();
    let lows: Vec<f64> = swing_lows(candles, strength)
        .into_iter()
        .map(|i| candles[i].low)
        .collect();

    classify_bias(&highs, &lows)
}

/// Direction from the 4th and 3rd most recent bars
///
/// Higher high with higher low is bullish, lower low with lower high is
/// bearish, anything else has no direction.
pub fn bar_structure(candles: &[Candle]) -> Option<Direction> {
    if candles.len() < 4 {
        return None;
    }

    let older = &candles[candles.len() - 4];
    let newer = &candles[candles.len() - 3];

    let higher_high = newer.high > older.high;
    let higher_low = newer.low > older.low;
    let lower_low = newer.low < older.low;
    let lower_high = newer.high < older.high;

    if higher_high && higher_low {
        Some(Direction::Buy)
    } else if lower_low && lower_high {
        Some(Direction::Sell)
    } else {
        None
    }
}
