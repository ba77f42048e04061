use chrono::{DateTime, Utc};

use super::{GateContext, GateKind, MarketSnapshot, Rejection};
use crate::models::TradeDecision;
use crate::settings::{ConfigError, EntryRule, StopRule, StrategyConfig};

/// Which feeds the engine must fetch before evaluating
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedRequirements {
    pub htf: bool,
    pub itf: bool,
    pub ltf: bool,
    pub correlated: bool,
    pub tick: bool,
    pub instrument: bool,
}

/// Validated configuration plus the ordered gate chain it describes
///
/// Evaluation is a pure function of the snapshot: no I/O, no state carried
/// between calls.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: StrategyConfig,
}

impl Pipeline {
    pub fn new(config: StrategyConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    pub fn requirements(&self) -> FeedRequirements {
        let mut req = FeedRequirements::default();
        for gate in &self.config.gates {
            match gate {
                GateKind::Session => {}
                GateKind::Spread => {
                    req.tick = true;
                    req.instrument = true;
                }
                GateKind::Structure | GateKind::BarStructure | GateKind::EmaTrend => req.htf = true,
                GateKind::KeyLevel => req.itf = true,
                GateKind::Divergence => {
                    req.ltf = true;
                    req.correlated = true;
                }
                GateKind::CandleColor
                | GateKind::LiquiditySweep
                | GateKind::Displacement
                | GateKind::EntryZone
                | GateKind::Retracement
                | GateKind::Momentum => req.ltf = true,
                GateKind::RewardRisk => {
                    if self.config.plan.entry == EntryRule::Market {
                        req.tick = true;
                    }
                    if matches!(
                        self.config.plan.stop,
                        StopRule::PreviousBar | StopRule::Atr { .. }
                    ) {
                        req.ltf = true;
                    }
                }
            }
        }
        req
    }

    /// Run the leading gates that need no market data
    ///
    /// Lets the caller skip every fetch while, for example, the session is
    /// closed. The same gates run again inside [`Pipeline::evaluate`].
    pub fn precheck(&self, now: DateTime<Utc>) -> Result<(), Rejection> {
        let snapshot = MarketSnapshot::new(now);
        let mut ctx = GateContext::default();
        for gate in self
            .config
            .gates
            .iter()
            .take_while(|gate| !gate.needs_market_data())
        {
            self.run_gate(*gate, &snapshot, &mut ctx)?;
        }
        Ok(())
    }

    /// Run every gate in order, stopping at the first rejection
    pub fn evaluate(&self, snapshot: &MarketSnapshot) -> Result<TradeDecision, Rejection> {
        let mut ctx = GateContext::default();
        for gate in &self.config.gates {
            self.run_gate(*gate, snapshot, &mut ctx)?;
        }

        ctx.decision.ok_or_else(|| Rejection {
            gate: GateKind::RewardRisk,
            reason: "no trade plan produced".to_string(),
        })
    }

    fn run_gate(
        &self,
        gate: GateKind,
        snapshot: &MarketSnapshot,
        ctx: &mut GateContext,
    ) -> Result<(), Rejection> {
        match gate.check(&self.config, snapshot, ctx) {
            Ok(()) => {
                tracing::debug!(%gate, "gate passed");
                Ok(())
            }
            Err(reason) => {
                tracing::debug!(%gate, %reason, "gate rejected");
                Err(Rejection { gate, reason })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Candle, CandleSeries, Direction, Tick, Timeframe};
    use crate::settings::Variant;
    use chrono::{Duration, TimeZone};

    fn series(tf: Timeframe, ohlc: &[(f64, f64, f64, f64)]) -> CandleSeries {
        let start = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let candles = ohlc
            .iter()
            .enumerate()
            .map(|(i, &(open, high, low, close))| Candle {
                time: start + Duration::minutes(tf.minutes() * i as i64),
                open,
                high,
                low,
                close,
                volume: 1.0,
            })
            .collect();
        CandleSeries::new("XAUUSD", tf, candles, 1).unwrap()
    }

    fn scalper_snapshot(now: DateTime<Utc>) -> MarketSnapshot {
        let mut ohlc = vec![(100.0, 100.3, 99.8, 100.1); 10];
        ohlc.push((100.1, 101.6, 100.0, 101.5));
        let mut snapshot = MarketSnapshot::new(now);
        snapshot.ltf = Some(series(Timeframe::M1, &ohlc));
        snapshot.tick = Some(Tick {
            bid: 101.5,
            ask: 101.6,
            time: now,
        });
        snapshot.instrument = Some(instrument());
        snapshot
    }

    fn walk(open: f64, moves: &[(f64, f64)]) -> Vec<(f64, f64, f64, f64)> {
        let mut open = open;
        moves
            .iter()
            .map(|&(close, wick)| {
                let bar = (open, open.max(close) + wick, open.min(close) - wick, close);
                open = close;
                bar
            })
            .collect()
    }

    fn instrument() -> crate::models::InstrumentSpec {
        crate::models::InstrumentSpec {
            symbol: "XAUUSD".to_string(),
            tick_value: 1.0,
            point: 0.01,
            volume_min: 0.01,
            volume_step: 0.01,
        }
    }

    #[test]
    fn test_invalid_config_refused() {
        let mut config = StrategyConfig::preset(Variant::Scalper);
        config.gates.retain(|g| *g != GateKind::RewardRisk);
        assert!(Pipeline::new(config).is_err());
    }

    #[test]
    fn test_session_closed_aborts_before_data() {
        let pipeline = Pipeline::new(StrategyConfig::preset(Variant::Structure)).unwrap();
        let night = Utc.with_ymd_and_hms(2024, 1, 2, 3, 0, 0).unwrap();

        let rejection = pipeline.precheck(night).unwrap_err();
        assert_eq!(rejection.gate, GateKind::Session);

        // Empty snapshot: session is still the first reason, not missing data
        let rejection = pipeline.evaluate(&MarketSnapshot::new(night)).unwrap_err();
        assert_eq!(rejection.gate, GateKind::Session);
    }

    #[test]
    fn test_precheck_passes_without_data_gates() {
        let pipeline = Pipeline::new(StrategyConfig::preset(Variant::Structure)).unwrap();
        let morning = Utc.with_ymd_and_hms(2024, 1, 2, 9, 0, 0).unwrap();
        assert!(pipeline.precheck(morning).is_ok());
    }

    #[test]
    fn test_scalper_evaluates_to_buy() {
        let pipeline = Pipeline::new(StrategyConfig::preset(Variant::Scalper)).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 1, 2, 12, 0, 0).unwrap();

        let decision = pipeline.evaluate(&scalper_snapshot(now)).unwrap();
        assert_eq!(decision.direction, Direction::Buy);
        assert_eq!(decision.entry, 101.6);
        assert_eq!(decision.stop, 99.8);
    }

    #[test]
    fn test_evaluation_is_idempotent() {
        let pipeline = Pipeline::new(StrategyConfig::preset(Variant::Scalper)).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 1, 2, 12, 0, 0).unwrap();
        let snapshot = scalper_snapshot(now);

        assert_eq!(pipeline.evaluate(&snapshot), pipeline.evaluate(&snapshot));

        let mut quiet = snapshot.clone();
        quiet.ltf = Some(series(Timeframe::M1, &[(100.0, 100.3, 99.8, 100.1); 11]));
        let first = pipeline.evaluate(&quiet).unwrap_err();
        assert_eq!(first, pipeline.evaluate(&quiet).unwrap_err());
        assert_eq!(first.gate, GateKind::Displacement);
    }

    #[test]
    fn test_trend_session_follows_london_clock() {
        let pipeline = Pipeline::new(StrategyConfig::preset(Variant::Trend)).unwrap();
        let summer = |h, m| Utc.with_ymd_and_hms(2024, 7, 1, h, m, 0).unwrap();

        assert!(pipeline.precheck(summer(6, 30)).is_ok());
        assert!(pipeline.precheck(summer(19, 59)).is_ok());
        let rejection = pipeline.precheck(summer(20, 30)).unwrap_err();
        assert_eq!(rejection.gate, GateKind::Session);
    }

    #[test]
    fn test_trend_evaluates_to_buy_with_atr_stop() {
        let mut config = StrategyConfig::preset(Variant::Trend);
        config.trend.fast_ema = 3;
        config.trend.slow_ema = 7;
        config.momentum.ema_period = 5;
        config.momentum.rsi_period = 5;
        config.momentum.atr_period = 3;
        config.plan.stop = StopRule::Atr {
            period: 3,
            multiplier: 1.2,
        };
        let pipeline = Pipeline::new(config).unwrap();

        // 11:00 in London during BST
        let now = Utc.with_ymd_and_hms(2024, 7, 1, 10, 0, 0).unwrap();
        let rising: Vec<(f64, f64)> = (0..10).map(|i| (100.0 + i as f64, 0.5)).collect();
        let mut momentum = vec![(100.0, 0.5); 8];
        momentum.extend([(101.0, 1.0), (102.0, 1.0), (103.0, 1.0), (104.0, 1.0)]);

        let mut snapshot = MarketSnapshot::new(now);
        snapshot.htf = Some(series(Timeframe::M15, &walk(100.0, &rising)));
        snapshot.ltf = Some(series(Timeframe::M5, &walk(100.0, &momentum)));
        snapshot.tick = Some(Tick {
            bid: 104.0,
            ask: 104.1,
            time: now,
        });
        snapshot.instrument = Some(instrument());

        let decision = pipeline.evaluate(&snapshot).unwrap();
        assert_eq!(decision.direction, Direction::Buy);
        assert_eq!(decision.entry, 104.1);
        // ATR(3) of the last three 3.0-range bars
        assert!((decision.stop - 100.5).abs() < 1e-9);
        assert!((decision.target - 109.5).abs() < 1e-9);

        let mut wide = snapshot.clone();
        wide.tick = Some(Tick {
            bid: 104.0,
            ask: 104.5,
            time: now,
        });
        assert_eq!(pipeline.evaluate(&wide).unwrap_err().gate, GateKind::Spread);
    }

    /// Lower-low/lower-high HTF bars, then a bearish sweep of the previous
    /// high that leaves a gap below the bar before it
    fn swing_snapshot() -> MarketSnapshot {
        let now = Utc.with_ymd_and_hms(2024, 1, 2, 9, 0, 0).unwrap();
        let mut ltf = vec![(101.0, 101.2, 100.9, 101.1); 20];
        ltf.push((100.5, 100.5, 99.0, 99.1));
        ltf.push((100.6, 100.7, 98.0, 98.2));

        let mut snapshot = MarketSnapshot::new(now);
        snapshot.htf = Some(series(
            Timeframe::M15,
            &[
                (101.0, 102.0, 100.0, 101.0),
                (100.0, 101.0, 99.0, 100.0),
                (100.0, 100.5, 99.5, 100.0),
                (100.0, 100.5, 99.5, 100.0),
            ],
        ));
        snapshot.ltf = Some(series(Timeframe::M5, &ltf));
        snapshot
    }

    #[test]
    fn test_swing_previous_bar_stop_sits_on_profit_side() {
        let pipeline = Pipeline::new(StrategyConfig::preset(Variant::Swing)).unwrap();

        // Every gate up to the plan passes; the swept bar's high is below the
        // gap midpoint, so the stop cannot protect a sell
        let rejection = pipeline.evaluate(&swing_snapshot()).unwrap_err();
        assert_eq!(rejection.gate, GateKind::RewardRisk);
        assert!(rejection.reason.contains("wrong side"));
    }

    #[test]
    fn test_swing_with_zone_stop_evaluates_to_sell() {
        let mut config = StrategyConfig::preset(Variant::Swing);
        config.plan.stop = StopRule::ZoneEdge;
        let pipeline = Pipeline::new(config).unwrap();

        let decision = pipeline.evaluate(&swing_snapshot()).unwrap();
        assert_eq!(decision.direction, Direction::Sell);
        // Gap between the swept bar's high 100.7 and the low 100.9 two bars back
        assert!((decision.entry - 100.8).abs() < 1e-9);
        assert!((decision.stop - 100.9).abs() < 1e-9);
        assert!((decision.target - 100.6).abs() < 1e-9);
    }

    #[test]
    fn test_requirements_follow_gates_and_plan() {
        let structure = Pipeline::new(StrategyConfig::preset(Variant::Structure)).unwrap();
        let req = structure.requirements();
        assert!(req.htf && req.itf && req.ltf && req.correlated);
        assert!(!req.tick);

        let trend = Pipeline::new(StrategyConfig::preset(Variant::Trend)).unwrap();
        let req = trend.requirements();
        assert!(req.htf && req.ltf && req.tick && req.instrument);
        assert!(!req.itf && !req.correlated);
    }
}
