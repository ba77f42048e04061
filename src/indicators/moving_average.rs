/// Calculate Simple Moving Average (SMA) of the last `period` values
pub fn calculate_sma(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }

    let sum: f64 = values.iter().rev().take(period).sum();
    Some(sum / period as f64)
}

/// Trailing rolling mean aligned with `values`
///
/// Index `i` holds the mean of `values[i + 1 - period..=i]`, or `None` while
/// fewer than `period` values are available.
pub fn rolling_mean(values: &[f64], period: usize) -> Vec<Option<f64>> {
    if period == 0 {
        return vec![None; values.len()];
    }

    let mut out = Vec::with_capacity(values.len());
    let mut sum = 0.0;
    for (i, value) in values.iter().enumerate() {
        sum += value;
        if i >= period {
            sum -= values[i - period];
        }
        if i + 1 >= period {
            out.push(Some(sum / period as f64));
        } else {
            out.push(None);
        }
    }
    out
}

/// Calculate Exponential Moving Average (EMA) series
///
/// Recursive form seeded with the first value:
/// `ema[0] = x[0]`, `ema[t] = a * x[t] + (1 - a) * ema[t-1]`, `a = 2 / (period + 1)`.
pub fn calculate_ema_series(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.is_empty() {
        return Vec::new();
    }

    let alpha = 2.0 / (period as f64 + 1.0);
    let mut series = Vec::with_capacity(values.len());
    let mut ema = values[0];
    series.push(ema);
    for value in &values[1..] {
        ema = alpha * value + (1.0 - alpha) * ema;
        series.push(ema);
    }
    series
}

/// Latest EMA value, `None` when fewer than `period` values are available
pub fn calculate_ema(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }
    calculate_ema_series(values, period).last().copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sma() {
        let prices = vec![100.0, 102.0, 104.0, 106.0, 108.0];
        let sma = calculate_sma(&prices, 5);
        assert_eq!(sma, Some(104.0));
    }

    #[test]
    fn test_sma_insufficient_data() {
        let prices = vec![100.0, 102.0];
        let sma = calculate_sma(&prices, 5);
        assert!(sma.is_none());
    }

    #[test]
    fn test_rolling_mean_alignment() {
        let values = vec![1.0, 2.0, 3.0, 4.0];
        let means = rolling_mean(&values, 2);
        assert_eq!(means, vec![None, Some(1.5), Some(2.5), Some(3.5)]);
    }

    #[test]
    fn test_ema_tracks_rising_prices() {
        let prices = vec![100.0, 102.0, 104.0, 106.0, 108.0, 110.0];
        let ema = calculate_ema(&prices, 5).unwrap();
        assert!(ema > 100.0 && ema < 110.0);
    }

    #[test]
    fn test_ema_constant_series() {
        let prices = vec![50.0; 10];
        assert_eq!(calculate_ema(&prices, 3), Some(50.0));
        assert_eq!(calculate_ema_series(&prices, 3).len(), 10);
    }
}
