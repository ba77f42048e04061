use crate::indicators::moving_average::rolling_mean;
use crate::models::Candle;

/// Mean body size of the last `period` candles, including the latest
pub fn average_body(candles: &[Candle], period: usize) -> Option<f64> {
    if period == 0 || candles.len() < period {
        return None;
    }
    let total: f64 = candles[candles.len() - period..].iter().map(Candle::body).sum();
    Some(total / period as f64)
}

/// True if the latest candle's body exceeds `multiplier` times the average body
///
/// The average covers the last `period` candles and includes the latest one.
/// Short history never counts as displacement.
pub fn is_displacement(candles: &[Candle], period: usize, multiplier: f64) -> bool {
    match (candles.last(), average_body(candles, period)) {
        (Some(last), Some(avg)) => last.body() > avg * multiplier,
        _ => false,
    }
}

/// Per-candle flag: body exceeds `multiplier` times its trailing `period` mean
pub fn strong_bodies(candles: &[Candle], period: usize, multiplier: f64) -> Vec<bool> {
    let bodies: Vec<f64> = candles.iter().map(Candle::body).collect();
    rolling_mean(&bodies, period)
        .into_iter()
        .zip(&bodies)
        .map(|(mean, body)| mean.map_or(false, |m| *body > m * multiplier))
        .collect()
}
