use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};

use crate::models::{InstrumentSpec, TradeDecision};
use crate::settings::SizingBasis;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SizingError {
    #[error("non-finite or non-positive sizing input: {0}")]
    InvalidInput(&'static str),
    #[error("computed volume {0} is not tradable")]
    NonPositive(f64),
}

/// Lots risking `risk_percent` of `balance` over `stop_distance`
///
/// `volume = round(balance × risk% / 100 ÷ (stop_distance × tick_value), 2)`,
/// rounded half away from zero on the decimal value rather than the binary float.
pub fn position_size(
    balance: f64,
    risk_percent: f64,
    stop_distance: f64,
    tick_value: f64,
) -> Result<f64, SizingError> {
    let valid = |x: f64| x.is_finite() && x > 0.0;
    if !valid(balance) {
        return Err(SizingError::InvalidInput("balance"));
    }
    if !valid(risk_percent) {
        return Err(SizingError::InvalidInput("risk_percent"));
    }
    if !valid(stop_distance) {
        return Err(SizingError::InvalidInput("stop_distance"));
    }
    if !valid(tick_value) {
        return Err(SizingError::InvalidInput("tick_value"));
    }

    let raw = (balance * risk_percent / 100.0) / (stop_distance * tick_value);
    let volume = Decimal::from_f64(raw)
        .map(|d| d.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
        .and_then(|d| d.to_f64())
        .ok_or(SizingError::NonPositive(raw))?;

    if volume <= 0.0 {
        return Err(SizingError::NonPositive(volume));
    }
    Ok(volume)
}

/// Largest multiple of the broker's `step` not above `volume`
///
/// A step that is not positive leaves the volume untouched.
pub fn snap_to_step(volume: f64, step: f64) -> f64 {
    if !(step.is_finite() && step > 0.0) {
        return volume;
    }
    match (Decimal::from_f64(volume), Decimal::from_f64(step)) {
        (Some(v), Some(s)) => ((v / s).floor() * s).to_f64().unwrap_or(volume),
        _ => volume,
    }
}

/// Stop distance in the unit the sizing formula expects
pub fn stop_distance(decision: &TradeDecision, basis: SizingBasis, spec: &InstrumentSpec) -> f64 {
    match basis {
        SizingBasis::Price => decision.risk(),
        SizingBasis::Points => decision.risk() / spec.point,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Direction;

    #[test]
    fn test_position_size_basic() {
        assert_eq!(position_size(10_000.0, 1.0, 2.0, 1.0), Ok(50.0));
    }

    #[test]
    fn test_position_size_rounds_to_two_decimals() {
        // 100 / 0.85 = 117.647...
        assert_eq!(position_size(10_000.0, 1.0, 0.85, 1.0), Ok(117.65));
        assert_eq!(position_size(1_000.0, 0.5, 300.0, 1.0), Ok(0.02));
    }

    #[test]
    fn test_position_size_rejects_bad_inputs() {
        assert_eq!(
            position_size(10_000.0, 1.0, 0.0, 1.0),
            Err(SizingError::InvalidInput("stop_distance"))
        );
        assert_eq!(
            position_size(0.0, 1.0, 2.0, 1.0),
            Err(SizingError::InvalidInput("balance"))
        );
        assert!(position_size(10_000.0, 1.0, f64::NAN, 1.0).is_err());
    }

    #[test]
    fn test_tiny_position_rounds_to_zero() {
        assert_eq!(
            position_size(100.0, 0.1, 500.0, 1.0),
            Err(SizingError::NonPositive(0.0))
        );
    }

    #[test]
    fn test_snap_to_step_rounds_down() {
        assert!((snap_to_step(117.65, 0.1) - 117.6).abs() < 1e-9);
        assert!((snap_to_step(117.65, 0.01) - 117.65).abs() < 1e-9);
        assert_eq!(snap_to_step(3.0, 1.0), 3.0);
        assert_eq!(snap_to_step(0.75, 1.0), 0.0);
        assert_eq!(snap_to_step(0.37, 0.0), 0.37);
    }

    #[test]
    fn test_stop_distance_in_points() {
        let decision = TradeDecision {
            direction: Direction::Sell,
            entry: 2000.0,
            stop: 2002.5,
            target: 1996.25,
        };
        let spec = InstrumentSpec {
            symbol: "XAUUSD".to_string(),
            tick_value: 1.0,
            point: 0.01,
            volume_min: 0.01,
            volume_step: 0.01,
        };
        assert_eq!(stop_distance(&decision, SizingBasis::Price, &spec), 2.5);
        assert!((stop_distance(&decision, SizingBasis::Points, &spec) - 250.0).abs() < 1e-9);
    }
}
