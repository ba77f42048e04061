use std::fmt;

use serde::{Deserialize, Serialize};

use super::MarketSnapshot;
use crate::indicators::{
    bar_structure, calculate_atr, calculate_ema, calculate_rsi, fair_value_gap,
    is_atr_expanding, is_displacement, market_structure, near_key_level, order_block,
    session_key_levels,
};
use crate::models::{Bias, CandleSeries, Direction, KeyLevels, TradeDecision, Zone};
use crate::settings::{EntryRule, StopRule, StrategyConfig, TargetRule};

/// Slack when comparing reward:risk so exact multiples are not lost to rounding
const RATIO_EPSILON: f64 = 1e-9;

/// One named stage of the signal pipeline
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum GateKind {
    /// Wall-clock time in the session timezone inside a configured window
    Session,
    /// Bid/ask spread within the configured number of points
    Spread,
    /// HTF pivot structure: BOS / CHoCH bias
    Structure,
    /// HTF 4th-vs-3rd-last bar higher-high/higher-low direction
    BarStructure,
    /// Direction from the colour of the latest LTF candle
    CandleColor,
    /// HTF fast EMA above/below slow EMA
    EmaTrend,
    /// ITF close near the prior session high or low
    KeyLevel,
    /// Primary displaces in the trade direction, correlated instrument does not
    Divergence,
    /// Latest LTF bar pierced the key level (or the previous bar)
    LiquiditySweep,
    /// Latest LTF body well above its rolling average
    Displacement,
    /// Fair-value gap or order block available as entry zone
    EntryZone,
    /// Latest LTF close back inside the entry zone
    Retracement,
    /// LTF ATR expansion with EMA/RSI confirmation
    Momentum,
    /// Build entry/stop/target and enforce minimum reward:risk
    RewardRisk,
}

impl GateKind {
    /// Gates that can be decided from the clock alone
    pub fn needs_market_data(&self) -> bool {
        !matches!(self, GateKind::Session)
    }

    pub fn name(&self) -> &'static str {
        match self {
            GateKind::Session => "session",
            GateKind::Spread => "spread",
            GateKind::Structure => "structure",
            GateKind::BarStructure => "bar_structure",
            GateKind::CandleColor => "candle_color",
            GateKind::EmaTrend => "ema_trend",
            GateKind::KeyLevel => "key_level",
            GateKind::Divergence => "divergence",
            GateKind::LiquiditySweep => "liquidity_sweep",
            GateKind::Displacement => "displacement",
            GateKind::EntryZone => "entry_zone",
            GateKind::Retracement => "retracement",
            GateKind::Momentum => "momentum",
            GateKind::RewardRisk => "reward_risk",
        }
    }
}

impl fmt::Display for GateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Facts established by earlier gates within one evaluation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GateContext {
    pub direction: Option<Direction>,
    pub bias: Option<Bias>,
    pub key_levels: Option<KeyLevels>,
    pub zone: Option<Zone>,
    pub decision: Option<TradeDecision>,
}

impl GateContext {
    fn direction(&self) -> Result<Direction, String> {
        self.direction
            .ok_or_else(|| "no trade direction established by an earlier gate".to_string())
    }
}

fn feed<'a>(series: &'a Option<CandleSeries>, name: &str) -> Result<&'a CandleSeries, String> {
    series
        .as_ref()
        .ok_or_else(|| format!("{} candles missing from snapshot", name))
}

impl GateKind {
    /// Run this gate, recording anything it establishes into `ctx`
    ///
    /// Returns the abort reason when the gate fails.
    pub fn check(
        &self,
        config: &StrategyConfig,
        snapshot: &MarketSnapshot,
        ctx: &mut GateContext,
    ) -> Result<(), String> {
        match self {
            GateKind::Session => check_session(config, snapshot),
            GateKind::Spread => check_spread(config, snapshot),
            GateKind::Structure => check_structure(config, snapshot, ctx),
            GateKind::BarStructure => {
                let htf = feed(&snapshot.htf, "HTF")?;
                let direction = bar_structure(htf.candles())
                    .ok_or_else(|| "no higher-high/higher-low or lower-low/lower-high on HTF".to_string())?;
                ctx.direction = Some(direction);
                Ok(())
            }
            GateKind::CandleColor => {
                let last = feed(&snapshot.ltf, "LTF")?.last();
                ctx.direction = Some(if last.is_bullish() {
                    Direction::Buy
                } else if last.is_bearish() {
                    Direction::Sell
                } else {
                    return Err("latest candle is a doji".to_string());
                });
                Ok(())
            }
            GateKind::EmaTrend => check_ema_trend(config, snapshot, ctx),
            GateKind::KeyLevel => check_key_level(config, snapshot, ctx),
            GateKind::Divergence => check_divergence(config, snapshot, ctx),
            GateKind::LiquiditySweep => check_sweep(snapshot, ctx),
            GateKind::Displacement => {
                let ltf = feed(&snapshot.ltf, "LTF")?;
                let filter = config.displacement;
                if is_displacement(ltf.candles(), filter.period, filter.multiplier) {
                    Ok(())
                } else {
                    Err(format!(
                        "latest {} {} body {:.5} not above {}x its {}-bar average",
                        ltf.symbol(),
                        ltf.timeframe(),
                        ltf.last().body(),
                        filter.multiplier,
                        filter.period
                    ))
                }
            }
            GateKind::EntryZone => check_entry_zone(config, snapshot, ctx),
            GateKind::Retracement => {
                let close = feed(&snapshot.ltf, "LTF")?.last().close;
                let zone = ctx
                    .zone
                    .ok_or_else(|| "no entry zone established by an earlier gate".to_string())?;
                if zone.contains(close) {
                    Ok(())
                } else {
                    Err(format!(
                        "close {:.5} outside zone [{:.5}, {:.5}]",
                        close, zone.low, zone.high
                    ))
                }
            }
            GateKind::Momentum => check_momentum(config, snapshot, ctx),
            GateKind::RewardRisk => check_reward_risk(config, snapshot, ctx),
        }
    }
}

fn check_session(config: &StrategyConfig, snapshot: &MarketSnapshot) -> Result<(), String> {
    let time = snapshot.now.with_timezone(&config.session_timezone).time();
    if config.sessions.iter().any(|window| window.contains(time)) {
        Ok(())
    } else {
        Err(format!(
            "{} {} outside session windows",
            time.format("%H:%M:%S"),
            config.session_timezone.name()
        ))
    }
}

fn check_spread(config: &StrategyConfig, snapshot: &MarketSnapshot) -> Result<(), String> {
    let tick = snapshot.tick.ok_or_else(|| "tick missing from snapshot".to_string())?;
    let spec = snapshot
        .instrument
        .as_ref()
        .ok_or_else(|| "instrument spec missing from snapshot".to_string())?;

    if tick.spread() <= config.max_spread_points * spec.point {
        Ok(())
    } else {
        Err(format!(
            "spread {:.1} points above max {:.1}",
            tick.spread() / spec.point,
            config.max_spread_points
        ))
    }
}

fn check_structure(
    config: &StrategyConfig,
    snapshot: &MarketSnapshot,
    ctx: &mut GateContext,
) -> Result<(), String> {
    let htf = feed(&snapshot.htf, "HTF")?;
    let bias = market_structure(htf.candles(), config.pivot_strength)
        .ok_or_else(|| "no structure bias from the last two swings".to_string())?;

    tracing::debug!(%bias, "HTF structure");
    ctx.bias = Some(bias);
    ctx.direction = Some(bias.direction());
    Ok(())
}

fn check_ema_trend(
    config: &StrategyConfig,
    snapshot: &MarketSnapshot,
    ctx: &mut GateContext,
) -> Result<(), String> {
    let closes = feed(&snapshot.htf, "HTF")?.closes();
    let fast = calculate_ema(&closes, config.trend.fast_ema)
        .ok_or_else(|| "not enough bars for fast EMA".to_string())?;
    let slow = calculate_ema(&closes, config.trend.slow_ema)
        .ok_or_else(|| "not enough bars for slow EMA".to_string())?;

    ctx.direction = Some(if fast > slow {
        Direction::Buy
    } else if fast < slow {
        Direction::Sell
    } else {
        return Err("fast and slow EMA are equal".to_string());
    });
    Ok(())
}

fn check_key_level(
    config: &StrategyConfig,
    snapshot: &MarketSnapshot,
    ctx: &mut GateContext,
) -> Result<(), String> {
    let itf = feed(&snapshot.itf, "ITF")?;
    let levels = session_key_levels(itf.candles())
        .ok_or_else(|| "no sessions in ITF window".to_string())?;
    if levels.range() <= 0.0 {
        return Err("prior session range is flat".to_string());
    }

    let close = itf.last().close;
    if !near_key_level(close, &levels, config.key_level_tolerance) {
        return Err(format!(
            "close {:.5} not near key levels {:.5}/{:.5}",
            close, levels.high, levels.low
        ));
    }

    ctx.key_levels = Some(levels);
    Ok(())
}

fn check_divergence(
    config: &StrategyConfig,
    snapshot: &MarketSnapshot,
    ctx: &mut GateContext,
) -> Result<(), String> {
    let direction = ctx.direction()?;
    let primary = feed(&snapshot.ltf, "LTF")?;
    let correlated = feed(&snapshot.correlated, "correlated LTF")?;
    let filter = config.displacement;

    let primary_moves = is_displacement(primary.candles(), filter.period, filter.multiplier)
        && primary.last().closes_toward(direction);
    let correlated_moves =
        is_displacement(correlated.candles(), filter.period, filter.multiplier);

    match (primary_moves, correlated_moves) {
        (true, false) => Ok(()),
        (false, _) => Err(format!(
            "{} {} shows no {} displacement",
            primary.symbol(),
            primary.timeframe(),
            direction
        )),
        (true, true) => Err(format!(
            "{} {} displaced as well",
            correlated.symbol(),
            correlated.timeframe()
        )),
    }
}

fn check_sweep(snapshot: &MarketSnapshot, ctx: &mut GateContext) -> Result<(), String> {
    let direction = ctx.direction()?;
    let ltf = feed(&snapshot.ltf, "LTF")?;
    let last = ltf.last();

    // Without session levels the previous bar is the liquidity reference
    let (ref_high, ref_low) = match ctx.key_levels {
        Some(levels) => (levels.high, levels.low),
        None => {
            let prev = ltf
                .back(1)
                .ok_or_else(|| "need two LTF bars for sweep".to_string())?;
            (prev.high, prev.low)
        }
    };

    let swept = match direction {
        Direction::Buy => last.low < ref_low,
        Direction::Sell => last.high > ref_high,
    };

    if swept {
        Ok(())
    } else {
        Err(match direction {
            Direction::Buy => format!("low {:.5} did not sweep {:.5}", last.low, ref_low),
            Direction::Sell => format!("high {:.5} did not sweep {:.5}", last.high, ref_high),
        })
    }
}

fn check_entry_zone(
    config: &StrategyConfig,
    snapshot: &MarketSnapshot,
    ctx: &mut GateContext,
) -> Result<(), String> {
    let direction = ctx.direction()?;
    let candles = feed(&snapshot.ltf, "LTF")?.candles();

    let fvg = if config.zone_sources.fair_value_gap {
        fair_value_gap(candles, direction)
    } else {
        None
    };
    let ob = if config.zone_sources.order_block {
        order_block(
            candles,
            direction,
            config.order_block.period,
            config.order_block.multiplier,
        )
    } else {
        None
    };

    // Order block wins when both exist
    let zone = ob
        .or(fvg)
        .ok_or_else(|| "no fair-value gap or order block".to_string())?;
    ctx.zone = Some(zone);
    Ok(())
}

fn check_momentum(
    config: &StrategyConfig,
    snapshot: &MarketSnapshot,
    ctx: &mut GateContext,
) -> Result<(), String> {
    let direction = ctx.direction()?;
    let ltf = feed(&snapshot.ltf, "LTF")?;
    let settings = config.momentum;

    match is_atr_expanding(ltf.candles(), settings.atr_period) {
        Some(true) => {}
        Some(false) => return Err("ATR below its average".to_string()),
        None => return Err("not enough bars for ATR".to_string()),
    }

    let closes = ltf.closes();
    let close = ltf.last().close;
    let ema = calculate_ema(&closes, settings.ema_period)
        .ok_or_else(|| "not enough bars for EMA".to_string())?;
    let rsi = calculate_rsi(&closes, settings.rsi_period)
        .ok_or_else(|| "RSI undefined".to_string())?;

    let confirmed = match direction {
        Direction::Buy => close > ema && rsi > settings.rsi_buy_above,
        Direction::Sell => close < ema && rsi < settings.rsi_sell_below,
    };

    if confirmed {
        Ok(())
    } else {
        Err(format!(
            "{} not confirmed (close {:.5}, EMA {:.5}, RSI {:.1})",
            direction, close, ema, rsi
        ))
    }
}

fn check_reward_risk(
    config: &StrategyConfig,
    snapshot: &MarketSnapshot,
    ctx: &mut GateContext,
) -> Result<(), String> {
    let direction = ctx.direction()?;
    let decision = build_plan(config, snapshot, ctx, direction)?;

    let risk = decision.risk();
    if !risk.is_finite() || risk <= 0.0 {
        return Err("zero risk distance".to_string());
    }

    let stop_on_loss_side = match direction {
        Direction::Buy => decision.stop < decision.entry,
        Direction::Sell => decision.stop > decision.entry,
    };
    if !stop_on_loss_side {
        return Err(format!(
            "stop {:.5} on the wrong side of {} entry {:.5}",
            decision.stop, direction, decision.entry
        ));
    }

    if decision.reward() <= 0.0 {
        return Err(format!(
            "target {:.5} not beyond {} entry {:.5}",
            decision.target, direction, decision.entry
        ));
    }

    let ratio = decision.reward_risk();
    if ratio + RATIO_EPSILON < config.min_reward_risk {
        return Err(format!(
            "RR too low: {:.2} < {:.2}",
            ratio, config.min_reward_risk
        ));
    }

    ctx.decision = Some(decision);
    Ok(())
}

/// Entry, stop and target from the configured plan rules
fn build_plan(
    config: &StrategyConfig,
    snapshot: &MarketSnapshot,
    ctx: &GateContext,
    direction: Direction,
) -> Result<TradeDecision, String> {
    let zone = || {
        ctx.zone
            .ok_or_else(|| "no entry zone established by an earlier gate".to_string())
    };

    let entry = match config.plan.entry {
        EntryRule::ZoneMidpoint => zone()?.midpoint(),
        EntryRule::Market => snapshot
            .tick
            .ok_or_else(|| "tick missing from snapshot".to_string())?
            .entry_price(direction),
    };

    let stop = match config.plan.stop {
        StopRule::ZoneEdge => {
            let zone = zone()?;
            match direction {
                Direction::Buy => zone.low,
                Direction::Sell => zone.high,
            }
        }
        StopRule::PreviousBar => {
            let prev = feed(&snapshot.ltf, "LTF")?
                .back(1)
                .ok_or_else(|| "need two LTF bars for previous-bar stop".to_string())?;
            match direction {
                Direction::Buy => prev.low,
                Direction::Sell => prev.high,
            }
        }
        StopRule::Atr { period, multiplier } => {
            let atr = calculate_atr(feed(&snapshot.ltf, "LTF")?.candles(), period)
                .ok_or_else(|| "not enough bars for ATR stop".to_string())?;
            match direction {
                Direction::Buy => entry - atr * multiplier,
                Direction::Sell => entry + atr * multiplier,
            }
        }
    };

    let target = match config.plan.target {
        TargetRule::OpposingKeyLevel => {
            let levels = ctx
                .key_levels
                .ok_or_else(|| "no key levels established by an earlier gate".to_string())?;
            match direction {
                Direction::Buy => levels.high,
                Direction::Sell => levels.low,
            }
        }
        TargetRule::RewardMultiple { multiple } => {
            let risk = (entry - stop).abs();
            match direction {
                Direction::Buy => entry + risk * multiple,
                Direction::Sell => entry - risk * multiple,
            }
        }
    };

    Ok(TradeDecision {
        direction,
        entry,
        stop,
        target,
    })
}
