use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::models::{Candle, KeyLevels};

/// High/low of the prior completed daily (UTC) session
///
/// Candles are grouped by calendar day; the second-to-last day is the prior
/// session. With a single day of data the whole window's extremes are used.
pub fn session_key_levels(candles: &[Candle]) -> Option<KeyLevels> {
    let mut sessions: BTreeMap<NaiveDate, KeyLevels> = BTreeMap::new();
    for candle in candles {
        sessions
            .entry(candle.time.date_naive())
            .and_modify(|levels| {
                levels.high = levels.high.max(candle.high);
                levels.low = levels.low.min(candle.low);
            })
            .or_insert(KeyLevels {
                high: candle.high,
                low: candle.low,
            });
    }

    match sessions.len() {
        0 => None,
        1 => sessions.into_values().next(),
        n => sessions.into_values().nth(n - 2),
    }
}

/// True if `price` lies within `tolerance` × range of either key level
pub fn near_key_level(price: f64, levels: &KeyLevels, tolerance: f64) -> bool {
    let band = levels.range() * tolerance;
    (price - levels.high).abs() < band || (price - levels.low).abs() < band
}
