/// Calculate Relative Strength Index (RSI)
///
/// Simple-average form: mean gain and mean loss over the last `period`
/// price changes.
///
/// Values:
/// - RSI > 55 with price above its EMA: bullish momentum
/// - RSI < 45 with price below its EMA: bearish momentum
///
pub fn calculate_rsi(prices: &[f64], period: usize) -> Option<f64> {
    if period == 0 || prices.len() < period + 1 {
        return None;
    }

    let changes: Vec<f64> = prices.windows(2).map(|w| w[1] - w[0]).collect();

    let recent = &changes[changes.len() - period..];
    let avg_gain: f64 = recent.iter().map(|c| c.max(0.0)).sum::<f64>() / period as f64;
    let avg_loss: f64 = recent.iter().map(|c| (-c).max(0.0)).sum::<f64>() / period as f64;

    if avg_loss == 0.0 {
        if avg_gain == 0.0 {
            return None; // flat window, RSI undefined
        }
        return Some(100.0);
    }

    let rs = avg_gain / avg_loss;
    Some(100.0 - (100.0 / (1.0 + rs)))
}
