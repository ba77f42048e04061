// Strategy configuration: one immutable object handed to the pipeline and engine
pub mod presets;

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use chrono::NaiveTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::models::Timeframe;
use crate::strategy::GateKind;

const ENV_PREFIX: &str = "SMCBOT";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Behavioural variant; selects the preset used as configuration defaults
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    /// HTF structure, key levels, divergence, sweep, FVG/order-block entry
    Structure,
    /// Bar-to-bar structure with previous-bar sweep and FVG entry
    Swing,
    /// M1 candle-colour scalper with spread filter and cooldown
    Scalper,
    /// EMA trend with RSI/ATR momentum confirmation
    Trend,
}

impl FromStr for Variant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "structure" => Ok(Variant::Structure),
            "swing" => Ok(Variant::Swing),
            "scalper" => Ok(Variant::Scalper),
            "trend" => Ok(Variant::Trend),
            other => Err(format!(
                "unknown variant '{}' (expected structure, swing, scalper or trend)",
                other
            )),
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Variant::Structure => "structure",
            Variant::Swing => "swing",
            Variant::Scalper => "scalper",
            Variant::Trend => "trend",
        };
        f.write_str(name)
    }
}

/// Higher, intermediate and execution timeframes
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Timeframes {
    pub htf: Timeframe,
    pub itf: Timeframe,
    pub ltf: Timeframe,
}

/// Wall-clock window in the session timezone, inclusive on both ends; may wrap midnight
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SessionWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl SessionWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, time: NaiveTime) -> bool {
        if self.start <= self.end {
            self.start <= time && time <= self.end
        } else {
            time >= self.start || time <= self.end
        }
    }
}

/// Body-size filter: body > multiplier × mean body over `period` bars
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct BodyFilter {
    pub period: usize,
    pub multiplier: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ZoneSources {
    pub fair_value_gap: bool,
    pub order_block: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TrendConfig {
    pub fast_ema: usize,
    pub slow_ema: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct MomentumConfig {
    pub ema_period: usize,
    pub rsi_period: usize,
    pub rsi_buy_above: f64,
    pub rsi_sell_below: f64,
    pub atr_period: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum SizingBasis {
    /// Stop distance in raw price units
    Price,
    /// Stop distance divided by the instrument point
    Points,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum EntryRule {
    /// Midpoint of the active entry zone
    ZoneMidpoint,
    /// Current ask (buy) or bid (sell)
    Market,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum StopRule {
    /// Zone low for buys, zone high for sells
    ZoneEdge,
    /// Low (buy) or high (sell) of the bar before the latest
    PreviousBar,
    /// Entry ∓ ATR × multiplier
    Atr { period: usize, multiplier: f64 },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum TargetRule {
    /// Key high for buys, key low for sells
    OpposingKeyLevel,
    /// Entry ± risk × multiple
    RewardMultiple { multiple: f64 },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PlanRules {
    pub entry: EntryRule,
    pub stop: StopRule,
    pub target: TargetRule,
}

/// Seconds to sleep after each kind of cycle outcome
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SleepConfig {
    pub session_closed_secs: u64,
    pub filtered_secs: u64,
    pub data_unavailable_secs: u64,
    pub position_open_secs: u64,
    pub after_trade_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BridgeConfig {
    pub url: String,
    pub requests_per_second: u32,
    pub timeout_secs: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8787".to_string(),
            requests_per_second: 10,
            timeout_secs: 10,
        }
    }
}

/// Every tunable of the bot
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StrategyConfig {
    pub variant: Variant,
    pub symbol: String,
    /// Instrument compared against for divergence
    pub correlated_symbol: Option<String>,
    pub timeframes: Timeframes,
    /// Bars fetched per timeframe; shorter fetches abort the cycle
    pub lookback: usize,
    /// Tag identifying this strategy's orders and positions
    pub magic: u64,
    pub comment: String,
    pub risk_percent: f64,
    pub min_reward_risk: f64,
    pub sizing_basis: SizingBasis,
    #[serde(default)]
    pub sessions: Vec<SessionWindow>,
    /// Zone the session windows are read in (IANA name, e.g. `Europe/London`)
    #[serde(default = "default_session_timezone")]
    pub session_timezone: Tz,
    /// Bars on each side a pivot must beat (1 = three-bar pivot)
    pub pivot_strength: usize,
    /// Fraction of the key-level range counted as "near"
    pub key_level_tolerance: f64,
    pub displacement: BodyFilter,
    pub order_block: BodyFilter,
    pub zone_sources: ZoneSources,
    pub trend: TrendConfig,
    pub momentum: MomentumConfig,
    pub max_spread_points: f64,
    pub plan: PlanRules,
    /// Fraction of initial risk price must travel before the stop moves to entry
    pub breakeven_trigger: Option<f64>,
    /// Minimum seconds between placed trades
    pub cooldown_secs: u64,
    pub sleep: SleepConfig,
    /// Ordered gate chain
    pub gates: Vec<GateKind>,
    pub bridge: BridgeConfig,
}

fn default_session_timezone() -> Tz {
    Tz::UTC
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self::preset(Variant::Structure)
    }
}

impl StrategyConfig {
    /// Full configuration of a variant
    pub fn preset(variant: Variant) -> Self {
        match variant {
            Variant::Structure => presets::structure(),
            Variant::Swing => presets::swing(),
            Variant::Scalper => presets::scalper(),
            Variant::Trend => presets::trend(),
        }
    }

    /// Layer the variant preset, an optional TOML file and `SMCBOT__*` env vars
    ///
    /// Nested keys use a double underscore, e.g. `SMCBOT__RISK_PERCENT=0.5` or
    /// `SMCBOT__BRIDGE__URL=http://10.0.0.2:8787`.
    pub fn load(variant: Variant, path: Option<&Path>) -> Result<Self, ConfigError> {
        let defaults = Self::preset(variant);

        let mut builder =
            ::config::Config::builder().add_source(::config::Config::try_from(&defaults)?);

        if let Some(path) = path {
            builder = builder.add_source(::config::File::from(path).required(false));
        }

        let settings = builder
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: StrategyConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the pipeline cannot evaluate
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if self.symbol.trim().is_empty() {
            return invalid("symbol must not be empty".to_string());
        }
        if !(self.risk_percent > 0.0 && self.risk_percent <= 100.0) {
            return invalid(format!("risk_percent {} outside (0, 100]", self.risk_percent));
        }
        if self.min_reward_risk < 0.0 {
            return invalid("min_reward_risk must not be negative".to_string());
        }
        if self.lookback < 3 {
            return invalid(format!("lookback {} too short (need at least 3)", self.lookback));
        }
        if let Some(trigger) = self.breakeven_trigger {
            if trigger <= 0.0 {
                return invalid("breakeven_trigger must be positive".to_string());
            }
        }
        if !self.gates.contains(&GateKind::RewardRisk) {
            return invalid("gate list must include reward_risk to produce a trade plan".to_string());
        }
        if self.gates.contains(&GateKind::Session) && self.sessions.is_empty() {
            return invalid("session gate configured without session windows".to_string());
        }
        if self.gates.contains(&GateKind::Divergence) && self.correlated_symbol.is_none() {
            return invalid("divergence gate requires correlated_symbol".to_string());
        }
        if self.gates.contains(&GateKind::EntryZone)
            && !self.zone_sources.fair_value_gap
            && !self.zone_sources.order_block
        {
            return invalid("entry_zone gate needs at least one zone source".to_string());
        }
        if self.plan.entry == EntryRule::ZoneMidpoint && !self.gates.contains(&GateKind::EntryZone)
        {
            return invalid("zone_midpoint entry requires the entry_zone gate".to_string());
        }
        if self.plan.stop == StopRule::ZoneEdge && !self.gates.contains(&GateKind::EntryZone) {
            return invalid("zone_edge stop requires the entry_zone gate".to_string());
        }
        if self.plan.target == TargetRule::OpposingKeyLevel
            && !self.gates.contains(&GateKind::KeyLevel)
        {
            return invalid("opposing_key_level target requires the key_level gate".to_string());
        }

        let mut periods = Vec::new();
        if self.gates.contains(&GateKind::Displacement) || self.gates.contains(&GateKind::Divergence)
        {
            periods.push(("displacement.period", self.displacement.period));
        }
        if self.gates.contains(&GateKind::EntryZone) && self.zone_sources.order_block {
            periods.push(("order_block.period", self.order_block.period));
        }
        if self.gates.contains(&GateKind::EmaTrend) {
            periods.push(("trend.fast_ema", self.trend.fast_ema));
            periods.push(("trend.slow_ema", self.trend.slow_ema));
        }
        if self.gates.contains(&GateKind::Momentum) {
            periods.push(("momentum.ema_period", self.momentum.ema_period));
            periods.push(("momentum.rsi_period", self.momentum.rsi_period + 1));
            periods.push(("momentum.atr_period", self.momentum.atr_period));
        }
        if let StopRule::Atr { period, .. } = self.plan.stop {
            periods.push(("plan.stop.period", period));
        }
        for (name, period) in periods {
            if period == 0 {
                return invalid(format!("{} must be positive", name));
            }
            if period > self.lookback {
                return invalid(format!(
                    "{} ({}) exceeds lookback ({})",
                    name, period, self.lookback
                ));
            }
        }

        Ok(())
    }
}
