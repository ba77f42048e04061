/// Entry zones: fair-value gaps and order blocks

use crate::indicators::displacement::strong_bodies;
use crate::models::{Candle, Direction, Zone, ZoneKind};

/// Gap between the first and third of the last three candles
///
/// Bullish gap: third low above first high, zone (first.high, third.low).
/// Bearish gap: third high below first low, zone (third.high, first.low).
pub fn fair_value_gap(candles: &[Candle], direction: Direction) -> Option<Zone> {
    if candles.len() < 3 {
        return None;
    }

    let first = &candles[candles.len() - 3];
    let third = &candles[candles.len() - 1];

    match direction {
        Direction::Buy if third.low > first.high => {
            Some(Zone::new(ZoneKind::FairValueGap, first.high, third.low))
        }
        Direction::Sell if third.high < first.low => {
            Some(Zone::new(ZoneKind::FairValueGap, third.high, first.low))
        }
        _ => None,
    }
}

/// Full range of the most recent strong-bodied candle closing in `direction`
pub fn order_block(
    candles: &[Candle],
    direction: Direction,
    period: usize,
    multiplier: f64,
) -> Option<Zone> {
    let strong = strong_bodies(candles, period, multiplier);

    candles
        .iter()
        .zip(strong)
        .rev()
        .find(|(candle, is_strong)| *is_strong && candle.closes_toward(direction))
        .map(|(candle, _)| Zone::new(ZoneKind::OrderBlock, candle.low, candle.high))
}
