use chrono::NaiveTime;
use chrono_tz::Tz;

use super::{
    BodyFilter, BridgeConfig, EntryRule, MomentumConfig, PlanRules, SessionWindow, SizingBasis,
    SleepConfig, StopRule, StrategyConfig, TargetRule, Timeframes, TrendConfig, Variant,
    ZoneSources,
};
use crate::models::Timeframe;
use crate::strategy::GateKind;

fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN)
}

/// London and New York killzones, read in UTC
fn killzones() -> Vec<SessionWindow> {
    vec![
        SessionWindow::new(hm(8, 0), hm(11, 0)),
        SessionWindow::new(hm(13, 30), hm(16, 30)),
    ]
}

fn base() -> StrategyConfig {
    StrategyConfig {
        variant: Variant::Structure,
        symbol: "XAUUSD".to_string(),
        correlated_symbol: None,
        timeframes: Timeframes {
            htf: Timeframe::H4,
            itf: Timeframe::H1,
            ltf: Timeframe::M5,
        },
        lookback: 500,
        magic: 55101,
        comment: "smcbot".to_string(),
        risk_percent: 1.0,
        min_reward_risk: 2.0,
        sizing_basis: SizingBasis::Price,
        sessions: killzones(),
        session_timezone: Tz::UTC,
        pivot_strength: 1,
        key_level_tolerance: 0.03,
        displacement: BodyFilter {
            period: 20,
            multiplier: 1.5,
        },
        order_block: BodyFilter {
            period: 10,
            multiplier: 1.5,
        },
        zone_sources: ZoneSources {
            fair_value_gap: true,
            order_block: true,
        },
        trend: TrendConfig {
            fast_ema: 50,
            slow_ema: 200,
        },
        momentum: MomentumConfig {
            ema_period: 50,
            rsi_period: 14,
            rsi_buy_above: 55.0,
            rsi_sell_below: 45.0,
            atr_period: 14,
        },
        max_spread_points: 60.0,
        plan: PlanRules {
            entry: EntryRule::ZoneMidpoint,
            stop: StopRule::ZoneEdge,
            target: TargetRule::OpposingKeyLevel,
        },
        breakeven_trigger: Some(1.0),
        cooldown_secs: 0,
        sleep: SleepConfig {
            session_closed_secs: 60,
            filtered_secs: 60,
            data_unavailable_secs: 60,
            position_open_secs: 60,
            after_trade_secs: 300,
        },
        gates: Vec::new(),
        bridge: BridgeConfig::default(),
    }
}

/// H4 structure bias, H1 session levels, M5 sweep/displacement/zone entry
pub fn structure() -> StrategyConfig {
    StrategyConfig {
        variant: Variant::Structure,
        correlated_symbol: Some("XAGUSD".to_string()),
        gates: vec![
            GateKind::Session,
            GateKind::Structure,
            GateKind::KeyLevel,
            GateKind::Divergence,
            GateKind::LiquiditySweep,
            GateKind::Displacement,
            GateKind::EntryZone,
            GateKind::Retracement,
            GateKind::RewardRisk,
        ],
        ..base()
    }
}

/// M15 bar structure, M5 previous-bar sweep and FVG entry, fixed 2R target
pub fn swing() -> StrategyConfig {
    StrategyConfig {
        variant: Variant::Swing,
        symbol: "US30".to_string(),
        timeframes: Timeframes {
            htf: Timeframe::M15,
            itf: Timeframe::M15,
            ltf: Timeframe::M5,
        },
        lookback: 200,
        zone_sources: ZoneSources {
            fair_value_gap: true,
            order_block: false,
        },
        plan: PlanRules {
            entry: EntryRule::ZoneMidpoint,
            stop: StopRule::PreviousBar,
            target: TargetRule::RewardMultiple { multiple: 2.0 },
        },
        sleep: SleepConfig {
            session_closed_secs: 10,
            filtered_secs: 10,
            data_unavailable_secs: 10,
            position_open_secs: 10,
            after_trade_secs: 30,
        },
        gates: vec![
            GateKind::Session,
            GateKind::BarStructure,
            GateKind::LiquiditySweep,
            GateKind::Displacement,
            GateKind::EntryZone,
            GateKind::RewardRisk,
        ],
        ..base()
    }
}

/// M1 candle-colour scalp at market, 0.8R target, fast breakeven at 0.3R
pub fn scalper() -> StrategyConfig {
    StrategyConfig {
        variant: Variant::Scalper,
        timeframes: Timeframes {
            htf: Timeframe::M1,
            itf: Timeframe::M1,
            ltf: Timeframe::M1,
        },
        lookback: 100,
        magic: 55999,
        risk_percent: 0.7,
        min_reward_risk: 0.8,
        sessions: Vec::new(),
        displacement: BodyFilter {
            period: 10,
            multiplier: 1.1,
        },
        max_spread_points: 60.0,
        plan: PlanRules {
            entry: EntryRule::Market,
            stop: StopRule::PreviousBar,
            target: TargetRule::RewardMultiple { multiple: 0.8 },
        },
        breakeven_trigger: Some(0.3),
        cooldown_secs: 20,
        sleep: SleepConfig {
            session_closed_secs: 1,
            filtered_secs: 1,
            data_unavailable_secs: 1,
            position_open_secs: 3,
            after_trade_secs: 2,
        },
        gates: vec![
            GateKind::Spread,
            GateKind::CandleColor,
            GateKind::Displacement,
            GateKind::RewardRisk,
        ],
        ..base()
    }
}

/// M15 EMA 50/200 trend, M5 RSI/ATR momentum, ATR stop, 1.5R target
///
/// Trades 07:00 to 20:59:59 London time, following BST/GMT.
pub fn trend() -> StrategyConfig {
    StrategyConfig {
        variant: Variant::Trend,
        timeframes: Timeframes {
            htf: Timeframe::M15,
            itf: Timeframe::M15,
            ltf: Timeframe::M5,
        },
        lookback: 200,
        magic: 777,
        comment: "HTF-LTF Scalper".to_string(),
        risk_percent: 0.5,
        min_reward_risk: 1.5,
        sizing_basis: SizingBasis::Points,
        sessions: vec![SessionWindow::new(
            hm(7, 0),
            NaiveTime::from_hms_opt(20, 59, 59).unwrap_or(NaiveTime::MIN),
        )],
        session_timezone: chrono_tz::Europe::London,
        max_spread_points: 30.0,
        plan: PlanRules {
            entry: EntryRule::Market,
            stop: StopRule::Atr {
                period: 14,
                multiplier: 1.2,
            },
            target: TargetRule::RewardMultiple { multiple: 1.5 },
        },
        breakeven_trigger: None,
        sleep: SleepConfig {
            session_closed_secs: 30,
            filtered_secs: 5,
            data_unavailable_secs: 5,
            position_open_secs: 10,
            after_trade_secs: 65,
        },
        gates: vec![
            GateKind::Session,
            GateKind::Spread,
            GateKind::EmaTrend,
            GateKind::Momentum,
            GateKind::RewardRisk,
        ],
        ..base()
    }
}
